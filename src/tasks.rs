// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stock tasks.
//!
//! - [`DutyCycle`] switches radio advertising on and off, spending
//!   [`AdvertisingConfig::on`] with it on and [`AdvertisingConfig::off`] with
//!   it off. It does this by changing its own period each time it runs.
//!
//! - [`Periodic`] adapts a plain `FnMut()` closure that doesn't care about
//!   its context, such as a housekeeping job.
//!
//! - [`Marked`] wraps another task and drives a GPIO low while it runs, so
//!   that task timing can be watched on a logic analyzer.

use embedded_hal::digital::v2::OutputPin;

use crate::config::AdvertisingConfig;
use crate::task::{Task, TaskContext};
use crate::time::RtcCycles;

/// Something that can start and stop radio advertising.
pub trait Advertiser {
    /// Starts advertising if `enabled`, stops it otherwise.
    fn set_advertising(&mut self, enabled: bool);
}

/// Advertising duty cycle.
///
/// Register this with [`initial_period`](Self::initial_period). Its first run
/// switches advertising off for the off phase; from then on it alternates.
#[derive(Debug)]
pub struct DutyCycle<A> {
    radio: A,
    config: AdvertisingConfig,
    enable_next: bool,
}

impl<A: Advertiser> DutyCycle<A> {
    /// Creates a duty cycle controlling `radio`.
    pub fn new(radio: A, config: AdvertisingConfig) -> Self {
        Self {
            radio,
            config,
            enable_next: false,
        }
    }

    /// Period to register this task with: the first run comes at the end of
    /// an "on" phase.
    pub fn initial_period(&self) -> RtcCycles {
        self.config.on
    }

    /// Borrows the radio.
    pub fn radio(&self) -> &A {
        &self.radio
    }
}

impl<A: Advertiser> Task for DutyCycle<A> {
    fn run(&mut self, cx: &mut TaskContext<'_>) {
        let enable = self.enable_next;
        self.radio.set_advertising(enable);

        let phase = if enable { self.config.on } else { self.config.off };
        if cx.set_period(phase).is_err() {
            warn!("advertising phase {} out of range", phase.0);
        }
        self.enable_next = !enable;
        debug!("advertising {}, next toggle in {} ms", enable, cx.period().as_millis());
    }
}

/// A task that ignores its context.
#[derive(Debug)]
pub struct Periodic<F>(pub F);

impl<F: FnMut()> Task for Periodic<F> {
    fn run(&mut self, _cx: &mut TaskContext<'_>) {
        (self.0)()
    }
}

/// A task with an activity marker pin, low for the duration of each run.
#[derive(Debug)]
pub struct Marked<T, P> {
    task: T,
    pin: P,
}

impl<T, P> Marked<T, P>
where
    T: Task,
    P: OutputPin,
{
    /// Wraps `task`, and parks `pin` high until the first run.
    pub fn new(task: T, mut pin: P) -> Self {
        let _ = pin.set_high();
        Self { task, pin }
    }

    /// Unwraps the task and the pin.
    pub fn into_parts(self) -> (T, P) {
        (self.task, self.pin)
    }
}

impl<T, P> Task for Marked<T, P>
where
    T: Task,
    P: OutputPin,
{
    fn run(&mut self, cx: &mut TaskContext<'_>) {
        // The marker is for observation only; failing to drive it doesn't
        // affect the task.
        let _ = self.pin.set_low();
        self.task.run(cx);
        let _ = self.pin.set_high();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::exec::Scheduler;
    use crate::task::{TaskHandle, TaskState};
    use crate::time::RtcInstant;
    use core::cell::Cell;
    use embedded_hal_mock::pin::{Mock as PinMock, State as PinState, Transaction as PinTransaction};
    use std::vec::Vec;

    #[derive(Debug, Default)]
    struct FakeRadio(Vec<bool>);

    impl Advertiser for FakeRadio {
        fn set_advertising(&mut self, enabled: bool) {
            self.0.push(enabled);
        }
    }

    fn run_once(task: &mut dyn Task, period: &mut RtcCycles) {
        let config = SchedulerConfig::DEFAULT;
        let mut cx = TaskContext::new(TaskHandle(0), period, &config, RtcInstant::BOOT);
        task.run(&mut cx);
    }

    #[test]
    fn duty_cycle_alternates_phases() {
        let mut duty = DutyCycle::new(FakeRadio::default(), AdvertisingConfig::DEFAULT);
        let mut period = duty.initial_period();
        assert_eq!(period, RtcCycles::from_secs(2));

        run_once(&mut duty, &mut period);
        assert_eq!(period, RtcCycles::from_secs(8));
        run_once(&mut duty, &mut period);
        assert_eq!(period, RtcCycles::from_secs(2));
        run_once(&mut duty, &mut period);
        assert_eq!(period, RtcCycles::from_secs(8));

        assert_eq!(duty.radio().0, [false, true, false]);
    }

    #[test]
    fn duty_cycle_keeps_period_when_phase_out_of_range() {
        let config = AdvertisingConfig {
            on: RtcCycles::from_secs(2),
            off: RtcCycles::from_secs(120),
        };
        let mut duty = DutyCycle::new(FakeRadio::default(), config);
        let mut period = duty.initial_period();

        run_once(&mut duty, &mut period);
        assert_eq!(period, RtcCycles::from_secs(2));
        // Still toggles the radio.
        run_once(&mut duty, &mut period);
        assert_eq!(duty.radio().0, [false, true]);
    }

    #[test]
    fn duty_cycle_in_scheduler() {
        let mut duty = DutyCycle::new(FakeRadio::default(), AdvertisingConfig::DEFAULT);
        let first = duty.initial_period();
        let mut sched: Scheduler<'_, 2> = Scheduler::new(SchedulerConfig::DEFAULT);
        let h = sched.register(Some(&mut duty), first).unwrap();

        let mut sleeps = Vec::new();
        let mut elapsed = SchedulerConfig::DEFAULT.startup_interval;
        for _ in 0..5 {
            sched.advance(elapsed);
            sched.run_ready();
            elapsed = sched.next_wake();
            sleeps.push(elapsed.as_millis());
        }
        assert_eq!(sched.tasks().state(h), Some(TaskState::Blocked));
        drop(sched);

        assert_eq!(sleeps, [1000, 8000, 2000, 8000, 2000]);
        assert_eq!(duty.radio().0, [false, true, false, true]);
    }

    #[test]
    fn periodic_calls_closure() {
        let calls = Cell::new(0);
        let mut task = Periodic(|| calls.set(calls.get() + 1));
        let mut period = RtcCycles::from_secs(30);
        run_once(&mut task, &mut period);
        run_once(&mut task, &mut period);
        assert_eq!(calls.get(), 2);
        assert_eq!(period, RtcCycles::from_secs(30));
    }

    #[test]
    fn marker_brackets_each_run() {
        let pin = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ]);
        let calls = Cell::new(0);
        let mut task = Marked::new(Periodic(|| calls.set(calls.get() + 1)), pin);
        let mut period = RtcCycles::from_secs(1);
        run_once(&mut task, &mut period);
        run_once(&mut task, &mut period);
        assert_eq!(calls.get(), 2);

        let (_, mut pin) = task.into_parts();
        pin.done();
    }

    #[test]
    fn marked_task_can_set_its_period() {
        let pin = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ]);
        let mut task = Marked::new(
            |cx: &mut TaskContext<'_>| cx.set_period(RtcCycles::from_secs(5)).unwrap(),
            pin,
        );
        let mut period = RtcCycles::from_secs(1);
        run_once(&mut task, &mut period);
        assert_eq!(period, RtcCycles::from_secs(5));
        task.into_parts().1.done();
    }
}
