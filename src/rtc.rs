// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reprogramming the RTC alarm across clock domains.
//!
//! The RTC is a free-running down-counter clocked from the 32.768 kHz standby
//! oscillator. It counts down from a value we load; when it passes zero it
//! raises the alarm (which wakes us) and reloads itself from the preload
//! register. Between alarms we keep the preload at a large constant `P`, so
//! that after the alarm `P - counter` is the number of cycles since it fired.
//!
//! The counter and its configuration registers live in the standby clock
//! domain, which is asynchronous to the CPU clock. A write that lands near an
//! edge of the standby clock can be lost or half-taken. The safe window is
//! just after a rising edge, and the write has settled by the following
//! falling edge. The standby clock is routed to a pin with an edge-detect
//! interrupt, so we can wait for those edges with the CPU halted, but only if
//! nothing else wakes us first; hence all other interrupts are held off for
//! the duration.
//!
//! # Keeping time
//!
//! To avoid accumulating drift, each new window is armed *relative* to the
//! alarm that just fired: however many cycles we've spent since the alarm
//! (doing the scheduler's work, waiting for the edge) are subtracted from the
//! new countdown. The same residual tells us exactly how long the previous
//! window lasted, which is how [`Synchronizer`] keeps its 64-bit count of
//! cycles since boot.
//!
//! The hardware itself is reached through three small traits, so that the
//! protocol can be exercised against a simulated counter on the host.

use crate::config::SchedulerConfig;
use crate::time::{RtcCycles, RtcInstant};

/// Access to the RTC down-counter.
pub trait RtcCounter {
    /// Reads the current counter value. Only meaningful just after a rising
    /// edge of the standby clock.
    fn read(&mut self) -> u32;

    /// Writes the value the counter will next be loaded from.
    fn write_preload(&mut self, value: u32);

    /// Restarts the counter from the preload value and re-enables the
    /// count-to-zero alarm.
    fn reload(&mut self);

    /// Clears the sticky alarm wake flag.
    fn clear_alarm(&mut self);
}

/// An edge-detect channel watching a replica of the standby clock.
pub trait StandbyClock {
    /// Routes the standby clock to the edge-detect channel and makes its
    /// interrupt the only one able to wake the CPU.
    fn enable(&mut self);

    /// Halts the CPU until the next rising edge.
    fn wait_rising(&mut self);

    /// Halts the CPU until the next falling edge.
    fn wait_falling(&mut self);

    /// Stops watching the standby clock.
    fn disable(&mut self);
}

/// Save/disable/restore of interrupt delivery.
pub trait InterruptMask {
    /// Whatever is needed to put things back.
    type Saved;

    /// Disables interrupt delivery and records the prior enable state.
    fn save_and_disable(&mut self) -> Self::Saved;

    /// Restores the enable state captured by `save_and_disable`.
    fn restore(&mut self, saved: Self::Saved);
}

/// How a requested duration is measured.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Arm {
    /// From the moment of reprogramming.
    Absolute,
    /// From the previous alarm, discounting the cycles already spent since.
    Relative,
}

/// What `Synchronizer::reconfigure` actually committed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Armed {
    /// Value written to the countdown register. Pass this back as
    /// `previous_programmed` on the next call.
    pub register: RtcCycles,
    /// Cycles until the new alarm, counted from the previous alarm for a
    /// relative arm or from now for an absolute one. Differs from the request
    /// only when the request was shorter than the time already spent.
    pub interval: RtcCycles,
}

/// Owner of the RTC and keeper of the cycles-since-boot count.
#[derive(Debug)]
pub struct Synchronizer<R, C, M> {
    rtc: R,
    clock: C,
    mask: M,
    preload: u32,
    started: bool,
    total: RtcInstant,
}

impl<R, C, M> Synchronizer<R, C, M>
where
    R: RtcCounter,
    C: StandbyClock,
    M: InterruptMask,
{
    /// Takes over the RTC. It's assumed to be counting down from
    /// `config.preload` at this point, as it will be after the first alarm.
    pub fn new(rtc: R, clock: C, mask: M, config: &SchedulerConfig) -> Self {
        Self {
            rtc,
            clock,
            mask,
            preload: config.preload,
            started: false,
            total: RtcInstant::BOOT,
        }
    }

    /// RTC cycles since boot, as of the most recent `reconfigure`.
    pub fn total_elapsed(&self) -> RtcInstant {
        self.total
    }

    /// Arms the RTC alarm to fire after `duration` cycles, and accounts for
    /// the time since the previous call.
    ///
    /// `previous_programmed` must be the `register` value committed by the
    /// previous call (ignored on the first).
    ///
    /// This halts the CPU twice waiting for standby clock edges, so it takes
    /// between one and two RTC cycles, with interrupts disabled throughout.
    /// If the standby clock isn't running it never returns.
    pub fn reconfigure(
        &mut self,
        duration: RtcCycles,
        previous_programmed: RtcCycles,
        arm: Arm,
    ) -> Armed {
        let saved = self.mask.save_and_disable();
        let mask = &mut self.mask;
        let guard = scopeguard::guard(saved, |saved| mask.restore(saved));

        self.clock.enable();
        self.clock.wait_rising();

        let counter = read_counter(&mut self.rtc);
        let consumed = self.preload.saturating_sub(counter);
        // A counter at zero is about to fire: the old window ran its full
        // length and nothing of the new one has been used.
        let residual = if counter == 0 { 0 } else { consumed };

        let target = duration.0.saturating_sub(1);
        let register = match arm {
            Arm::Absolute => target,
            Arm::Relative => target.saturating_sub(residual),
        };
        self.rtc.write_preload(register);

        self.clock.wait_falling();

        self.rtc.reload();
        self.rtc.clear_alarm();
        self.rtc.write_preload(self.preload);

        self.clock.disable();
        drop(guard);

        let window = if !self.started {
            self.started = true;
            u64::from(consumed)
        } else if counter == 0 {
            u64::from(previous_programmed.0)
        } else {
            u64::from(previous_programmed.0) + u64::from(consumed) + 1
        };
        self.total = RtcInstant::from_cycles_since_boot(
            self.total.cycles_since_boot() + window,
        );

        let interval = match arm {
            Arm::Absolute => RtcCycles(register).saturating_add(RtcCycles(1)),
            Arm::Relative => RtcCycles(residual)
                .saturating_add(RtcCycles(register))
                .saturating_add(RtcCycles(1)),
        };
        trace!("rtc counter {} armed {} for {}", counter, register, interval.0);

        Armed {
            register: RtcCycles(register),
            interval,
        }
    }

    /// Borrows the RTC counter.
    pub fn rtc(&self) -> &R {
        &self.rtc
    }

    /// Borrows the standby clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Borrows the interrupt mask.
    pub fn mask(&self) -> &M {
        &self.mask
    }
}

/// Reads the counter, double-checking against a torn read across the clock
/// boundary. The counter only changes on standby clock edges, so a third read
/// made after a disagreement is settled.
fn read_counter(rtc: &mut impl RtcCounter) -> u32 {
    let first = rtc.read();
    let second = rtc.read();
    if first == second {
        second
    } else {
        rtc.read()
    }
}
