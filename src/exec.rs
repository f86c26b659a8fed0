// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The scheduler proper, and the mainline loop that drives it.
//!
//! # Scheduler entry point
//!
//! Each time the RTC alarm wakes the device, the mainline calls
//! [`Scheduler::tick`]. That does four things, in order:
//!
//! 1. **Advance.** Every task that isn't suspended is credited with the cycles
//!    that passed since the previous tick. Any task whose credit has reached
//!    its period becomes Ready, and its credit goes back to zero. This pass
//!    covers *every* task before anything runs, so no task's action can
//!    affect another's due-check on the same tick.
//!
//! 2. **Run.** Each Ready task runs to completion, in registration order, and
//!    goes back to Blocked.
//!
//! 3. **Plan.** The next sleep is the shortest time until any Blocked task
//!    comes due, but never longer than the configured maximum burst.
//!
//! 4. **Arm.** The RTC is re-armed for that long, measured from the alarm
//!    that started this tick (see [`rtc`][crate::rtc]). What actually got
//!    committed is remembered so the next tick advances by the true interval.
//!
//! # Starting up
//!
//! Before the loop starts the RTC needs something to count toward. Call
//! [`Scheduler::arm_startup`], which arms the RTC for the configured startup
//! interval measured from now; the first tick then advances every task by
//! that interval.
//!
//! # Interrupts and sleep
//!
//! The only thing the wakeup interrupt tells the mainline is "the RTC alarm
//! fired," through an [`RtcWake`] flag. [`run_forever`] is the usual loop: it
//! checks and clears that flag, ticks if it was set, and then hands the
//! planned sleep duration to an *idle hook*. The hook is where the decision of
//! how deeply to sleep (or whether to stay awake for the radio) lives; the
//! simplest hook is just `cortex_m::asm::wfi`.
//!
//! `run_forever` runs with interrupts masked, opening a brief window once per
//! iteration for them to be serviced. This closes the race where the alarm
//! fires after we've checked the flag but before the idle hook sleeps: the
//! interrupt stays pending, and `WFI` returns immediately on a pending
//! interrupt even while masked.

use crate::config::SchedulerConfig;
use crate::rtc::{Arm, Armed, InterruptMask, RtcCounter, StandbyClock, Synchronizer};
use crate::task::{RegistrationError, Task, TaskContext, TaskHandle, TaskState, TaskTable};
use crate::time::{RtcCycles, RtcInstant};
use crate::wake::{RtcWake, WakeCauses};

/// The durations the scheduler has asked for and been given.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WakePlan {
    /// Sleep the scheduler asked for on the last tick.
    pub requested: RtcCycles,
    /// Register value committed on the tick before that.
    pub previous_programmed: RtcCycles,
    /// Register value committed on the last tick.
    pub actual_programmed: RtcCycles,
    /// Cycles from the last alarm to the next one. The next tick advances
    /// tasks by this much.
    pub interval: RtcCycles,
}

/// A tick-driven scheduler for up to `N` periodic tasks.
#[derive(Debug)]
pub struct Scheduler<'a, const N: usize> {
    tasks: TaskTable<'a, N>,
    plan: WakePlan,
    now: RtcInstant,
}

impl<'a, const N: usize> Scheduler<'a, N> {
    /// Creates a scheduler with an empty task table.
    ///
    /// Until [`arm_startup`](Self::arm_startup) says otherwise, the RTC is
    /// assumed to have been armed for `config.startup_interval` at boot.
    pub fn new(config: SchedulerConfig) -> Self {
        let startup = config.startup_interval;
        Self {
            tasks: TaskTable::new(config),
            plan: WakePlan {
                requested: startup,
                previous_programmed: RtcCycles::ZERO,
                actual_programmed: startup.saturating_sub(RtcCycles(1)),
                interval: startup,
            },
            now: RtcInstant::BOOT,
        }
    }

    /// Borrows the task table.
    pub fn tasks(&self) -> &TaskTable<'a, N> {
        &self.tasks
    }

    /// Borrows the task table mutably, e.g. to suspend or resume a task.
    pub fn tasks_mut(&mut self) -> &mut TaskTable<'a, N> {
        &mut self.tasks
    }

    /// Registers a task. See [`TaskTable::register`].
    pub fn register(
        &mut self,
        action: Option<&'a mut dyn Task>,
        period: RtcCycles,
    ) -> Result<TaskHandle, RegistrationError> {
        self.tasks.register(action, period)
    }

    /// Current wake plan.
    pub fn plan(&self) -> WakePlan {
        self.plan
    }

    /// Sleep duration requested by the most recent tick.
    pub fn requested(&self) -> RtcCycles {
        self.plan.requested
    }

    /// Arms the RTC for the startup interval, measured from now. Call this
    /// once, before the first tick.
    pub fn arm_startup<R, C, M>(
        &mut self,
        sync: &mut Synchronizer<R, C, M>,
    ) -> Armed
    where
        R: RtcCounter,
        C: StandbyClock,
        M: InterruptMask,
    {
        let startup = self.tasks.config.startup_interval;
        let armed = sync.reconfigure(startup, RtcCycles::ZERO, Arm::Absolute);
        self.plan = WakePlan {
            requested: startup,
            previous_programmed: RtcCycles::ZERO,
            actual_programmed: armed.register,
            interval: armed.interval,
        };
        info!("scheduler armed for startup, {} ms", startup.as_millis());
        armed
    }

    /// Credits every unsuspended task with `elapsed` cycles, then marks the
    /// ones that have reached their period Ready.
    pub fn advance(&mut self, elapsed: RtcCycles) {
        for (_, task) in self.tasks.iter_mut() {
            if task.state != TaskState::Suspended {
                task.elapsed = task.elapsed.saturating_add(elapsed);
            }
        }

        for (handle, task) in self.tasks.iter_mut() {
            if task.state != TaskState::Suspended && task.elapsed >= task.period {
                task.elapsed = RtcCycles::ZERO;
                task.state = TaskState::Ready;
                trace!("task {} ready", handle.0);
            }
        }
    }

    /// Runs every Ready task once, in registration order, returning each to
    /// Blocked. Returns the number of tasks run.
    pub fn run_ready(&mut self) -> usize {
        let now = self.now;
        let config = &self.tasks.config;
        let mut ran = 0;
        for (i, slot) in self.tasks.slots[..self.tasks.len].iter_mut().enumerate() {
            let Some(task) = slot else { continue };
            if task.state != TaskState::Ready {
                continue;
            }

            let mut cx = TaskContext::new(TaskHandle(i), &mut task.period, config, now);
            task.action.run(&mut cx);
            task.state = TaskState::Blocked;
            ran += 1;
        }
        ran
    }

    /// Cycles until the next Blocked task comes due, capped at the maximum
    /// burst. Ready and Suspended tasks don't count.
    pub fn next_wake(&self) -> RtcCycles {
        let max_burst = self.tasks.config.max_burst;
        self.tasks.slots[..self.tasks.len]
            .iter()
            .flatten()
            .filter(|task| task.state == TaskState::Blocked)
            .map(|task| task.period.saturating_sub(task.elapsed))
            .fold(max_burst, RtcCycles::min)
    }

    /// Handles a wakeup. Returns the planned sleep.
    ///
    /// Only a wakeup that includes the RTC alarm moves the scheduler; for any
    /// other cause this returns the previous plan and touches nothing.
    pub fn tick<R, C, M>(
        &mut self,
        cause: WakeCauses,
        sync: &mut Synchronizer<R, C, M>,
    ) -> RtcCycles
    where
        R: RtcCounter,
        C: StandbyClock,
        M: InterruptMask,
    {
        if !cause.contains(WakeCauses::RTC_ALARM) {
            return self.plan.requested;
        }

        // The alarm that woke us fired one register-load after the last
        // reconfiguration.
        self.now = sync.total_elapsed()
            + self.plan.actual_programmed.saturating_add(RtcCycles(1));

        self.advance(self.plan.interval);
        let ran = self.run_ready();
        let next = self.next_wake();

        let previous = self.plan.actual_programmed;
        let armed = sync.reconfigure(next, previous, Arm::Relative);
        self.plan = WakePlan {
            requested: next,
            previous_programmed: previous,
            actual_programmed: armed.register,
            interval: armed.interval,
        };

        debug!(
            "ran {} tasks; sleep {} ms, programmed {}",
            ran,
            next.as_millis(),
            armed.register.0
        );
        info!("uptime {}", sync.total_elapsed().uptime());
        next
    }
}

/// Services a pending RTC wake, if there is one. Returns the new sleep plan
/// if the scheduler ticked.
pub fn service_wake<R, C, M, const N: usize>(
    rtc_wake: &RtcWake,
    sched: &mut Scheduler<'_, N>,
    sync: &mut Synchronizer<R, C, M>,
) -> Option<RtcCycles>
where
    R: RtcCounter,
    C: StandbyClock,
    M: InterruptMask,
{
    if rtc_wake.take() {
        Some(sched.tick(WakeCauses::RTC_ALARM, sync))
    } else {
        None
    }
}

/// Runs the scheduler forever.
///
/// Each time through the loop this services any pending RTC wake, then, if no
/// new wake arrived in the meantime, calls `idle_hook` with the planned sleep
/// duration. Interrupts are masked except for a brief window after the hook
/// returns; the hook should end in `WFI` (or deeper sleep) if it wants to
/// save power.
pub fn run_forever<R, C, M, const N: usize>(
    rtc_wake: &RtcWake,
    sched: &mut Scheduler<'_, N>,
    sync: &mut Synchronizer<R, C, M>,
    mut idle_hook: impl FnMut(RtcCycles),
) -> !
where
    R: RtcCounter,
    C: StandbyClock,
    M: InterruptMask,
{
    cortex_m::interrupt::disable();
    loop {
        service_wake(rtc_wake, sched, sync);

        if !rtc_wake.is_pending() {
            idle_hook(sched.requested());
        }

        // Let the wakeup interrupt run.
        // Safety: we're not relying on interrupts being masked for memory
        // safety; it's only to order the wake check against sleep.
        unsafe {
            cortex_m::interrupt::enable();
        }
        cortex_m::interrupt::disable();
    }
}
