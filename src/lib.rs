// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A tick-driven cooperative scheduler for low-power devices that sleep
//! between short bursts of work, woken by a real-time clock.
//!
//! # What this is for
//!
//! Many small radio devices spend almost all of their life asleep. The only
//! thing running during that time is a low-frequency real-time clock (RTC),
//! typically fed by a 32.768 kHz crystal, which counts down and raises an
//! alarm that wakes the CPU. When the CPU wakes, it does a little work --
//! toggles advertising, samples a sensor -- decides how long it can sleep
//! before the next bit of work is due, reprograms the RTC for that long, and
//! goes back to sleep.
//!
//! This crate is the part of that loop that decides *what* is due and *how
//! long* to sleep, plus the fiddly part that reprograms the RTC without losing
//! time.
//!
//! # Pieces
//!
//! - [`task`] holds the fixed table of periodic jobs and their state machine.
//!   Tasks are registered once at startup and never removed.
//!
//! - [`exec`] is the scheduler proper: on each RTC wake it advances every
//!   task's elapsed-cycle counter, runs the tasks that came due (to
//!   completion, in registration order), and computes the longest sleep that
//!   won't make any task late.
//!
//! - [`rtc`] reprograms the RTC alarm. The RTC counts in its own clock domain,
//!   asynchronous to the CPU, so its registers can only be written safely in a
//!   narrow window just after an edge of the RTC clock. The synchronizer waits
//!   for that window with interrupts suppressed, commits the new countdown,
//!   and keeps a drift-free 64-bit count of RTC cycles since boot.
//!
//! - [`wake`] is the interrupt-level half: it figures out why the device woke,
//!   clears the sticky hardware flags, and hands the RTC wake to the mainline
//!   through a single atomic flag.
//!
//! - [`tasks`] contains the stock periodic jobs, such as an advertising duty
//!   cycle that alternates between an "on" and an "off" period.
//!
//! # Cooperative, not preemptive
//!
//! Task actions always run to completion on the mainline stack. They must not
//! block, sleep, or wait -- the next sleep computation assumes every task
//! returned promptly. The only designed blocking points in the whole mainline
//! path are the two clock-edge waits inside the RTC synchronizer, and those
//! halt the CPU rather than spinning.
//!
//! # Hardware
//!
//! Everything hardware-specific is behind traits ([`rtc::RtcCounter`],
//! [`rtc::StandbyClock`], [`rtc::InterruptMask`], [`wake::WakeController`]),
//! so the scheduler and synchronizer can be tested on a workstation against
//! simulated clocks. On ARM targets, [`cortex_m_irq`] provides the NVIC
//! mask-and-restore and `WFI` edge waits the synchronizer needs; the
//! vendor-specific RTC registers are left to the board crate.

#![cfg_attr(not(test), no_std)]

#![warn(
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    missing_debug_implementations,
    missing_docs,
    semicolon_in_expressions_from_macros,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_op_in_unsafe_fn,
    unused_qualifications,
)]

/// Internal assert macro that doesn't stringify its expression or generate any
/// fancy messages. This means failures must be diagnosed by file:line only, so,
/// don't use this more than once on the same line. In exchange, this makes
/// asserts significantly smaller in terms of text size.
macro_rules! cheap_assert {
    ($x:expr) => {
        if !$x { panic!(); };
    }
}
pub(crate) use cheap_assert;

#[macro_use]
mod fmt;

pub mod atomic;
pub mod config;
pub mod exec;
pub mod rtc;
pub mod task;
pub mod tasks;
pub mod time;
pub mod wake;

#[cfg(target_arch = "arm")]
pub mod cortex_m_irq;

#[cfg(test)]
mod sim;

pub use crate::config::SchedulerConfig;
pub use crate::exec::{Scheduler, WakePlan};
pub use crate::rtc::{Arm, Armed, Synchronizer};
pub use crate::task::{
    RegistrationError, Task, TaskContext, TaskError, TaskHandle, TaskState, TaskTable,
};
pub use crate::time::{RtcCycles, RtcInstant, Uptime};
pub use crate::wake::{RtcWake, WakeCauses};
