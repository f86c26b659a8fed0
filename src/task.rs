// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The task table.
//!
//! A *task* is a periodic job: something to run every so many RTC cycles. The
//! application registers all of its tasks during startup, into a table with a
//! fixed capacity chosen at compile time. Tasks are never removed. Each task
//! is identified by a [`TaskHandle`], which is just its position in
//! registration order; that order is also the order tasks run in when more
//! than one comes due on the same tick.
//!
//! # Task states
//!
//! Every task is in one of three states ([`TaskState`]):
//!
//! - *Blocked* tasks accumulate elapsed cycles and count toward the sleep
//!   computation. All tasks start out Blocked.
//! - *Ready* tasks have come due and will run on this tick. A task is only
//!   ever Ready between the scheduler's advance pass and its run pass; by the
//!   time the scheduler decides how long to sleep, it's Blocked again.
//! - *Suspended* tasks are parked: they don't accumulate time and don't
//!   constrain sleep. Only something outside the scheduler (see
//!   [`TaskTable::suspend`]) puts a task into this state or takes it out.
//!
//! # Task actions
//!
//! Anything implementing [`Task`] can be registered. Closures taking a
//! `&mut TaskContext` implement it automatically. The action borrows the
//! table for its lifetime `'a`, so it can be a closure on the stack of `main`
//! that captures other stack locals by reference, with no allocation or
//! `'static` juggling required.

use core::fmt;

use crate::config::SchedulerConfig;
use crate::time::{RtcCycles, RtcInstant};

/// A periodic job.
///
/// `run` is called once each time the task comes due. It must return
/// promptly: no blocking, sleeping, or waiting for hardware. The scheduler
/// computes the next sleep after all due tasks have returned, and a task that
/// dawdles makes every other task late.
pub trait Task {
    /// Performs one round of the task's work.
    fn run(&mut self, cx: &mut TaskContext<'_>);
}

impl<F> Task for F
where
    F: FnMut(&mut TaskContext<'_>),
{
    fn run(&mut self, cx: &mut TaskContext<'_>) {
        self(cx)
    }
}

/// Names a registered task. Handles are assigned in registration order,
/// starting from zero.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskHandle(pub(crate) usize);

impl TaskHandle {
    /// Position of this task in registration order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Scheduling state of a task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    /// Accumulating time toward the next run.
    Blocked,
    /// Due; will run on this tick.
    Ready,
    /// Excluded from time accounting until resumed.
    Suspended,
}

/// Ways registering a task can fail.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationError {
    /// The table already holds as many tasks as it can.
    CapacityExceeded,
    /// The requested period lies outside the configured burst range.
    PeriodOutOfRange,
    /// No action was provided.
    InvalidAction,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded => f.write_str("task table is full"),
            Self::PeriodOutOfRange => f.write_str("task period out of range"),
            Self::InvalidAction => f.write_str("task has no action"),
        }
    }
}

/// Ways changing an already-registered task can fail.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskError {
    /// The handle doesn't name a registered task.
    NoSuchTask,
    /// The requested period lies outside the configured burst range.
    PeriodOutOfRange,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchTask => f.write_str("no such task"),
            Self::PeriodOutOfRange => f.write_str("task period out of range"),
        }
    }
}

/// One slot in the task table.
pub(crate) struct ScheduledTask<'a> {
    pub(crate) action: &'a mut dyn Task,
    pub(crate) period: RtcCycles,
    pub(crate) elapsed: RtcCycles,
    pub(crate) state: TaskState,
}

impl fmt::Debug for ScheduledTask<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("period", &self.period)
            .field("elapsed", &self.elapsed)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Fixed-capacity table of up to `N` tasks.
#[derive(Debug)]
pub struct TaskTable<'a, const N: usize> {
    pub(crate) slots: [Option<ScheduledTask<'a>>; N],
    pub(crate) len: usize,
    pub(crate) config: SchedulerConfig,
}

impl<'a, const N: usize> TaskTable<'a, N> {
    /// Creates an empty table that will check periods against `config`.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            len: 0,
            config,
        }
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks whether no tasks have been registered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of tasks.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Limits this table checks periods against.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Adds a task that will first come due `period` cycles after the
    /// scheduler starts, and every `period` cycles after that (or whatever
    /// period it later sets for itself).
    ///
    /// The checks are made in a fixed order: the period range, then the
    /// table's capacity, then the presence of `action`. On failure the table
    /// is left as it was.
    pub fn register(
        &mut self,
        action: Option<&'a mut dyn Task>,
        period: RtcCycles,
    ) -> Result<TaskHandle, RegistrationError> {
        if !self.config.period_in_range(period) {
            warn!("task period {} out of range", period.0);
            return Err(RegistrationError::PeriodOutOfRange);
        }
        if self.len >= N {
            warn!("task table full ({} tasks)", N);
            return Err(RegistrationError::CapacityExceeded);
        }
        let Some(action) = action else {
            warn!("task registered without an action");
            return Err(RegistrationError::InvalidAction);
        };

        let handle = TaskHandle(self.len);
        self.slots[self.len] = Some(ScheduledTask {
            action,
            period,
            elapsed: RtcCycles::ZERO,
            state: TaskState::Blocked,
        });
        self.len += 1;
        debug!("task {} registered, period {}", handle.0, period.0);
        Ok(handle)
    }

    /// Changes the period of the task named by `handle`. Its elapsed cycles
    /// and state are untouched, so the new period applies to the time already
    /// accumulated.
    pub fn set_period(
        &mut self,
        handle: TaskHandle,
        period: RtcCycles,
    ) -> Result<(), TaskError> {
        let in_range = self.config.period_in_range(period);
        let task = self.get_mut(handle)?;
        if !in_range {
            return Err(TaskError::PeriodOutOfRange);
        }
        task.period = period;
        Ok(())
    }

    /// Parks the task named by `handle`. It stops accumulating time and stops
    /// constraining sleep until [`resume`](Self::resume) is called.
    pub fn suspend(&mut self, handle: TaskHandle) -> Result<(), TaskError> {
        let task = self.get_mut(handle)?;
        task.state = TaskState::Suspended;
        Ok(())
    }

    /// Returns a suspended task to the Blocked state, keeping whatever time
    /// it had accumulated before it was suspended. Resuming a task that isn't
    /// suspended has no effect.
    pub fn resume(&mut self, handle: TaskHandle) -> Result<(), TaskError> {
        let task = self.get_mut(handle)?;
        if task.state == TaskState::Suspended {
            task.state = TaskState::Blocked;
        }
        Ok(())
    }

    /// Current state of the task named by `handle`, if it exists.
    pub fn state(&self, handle: TaskHandle) -> Option<TaskState> {
        self.get(handle).map(|t| t.state)
    }

    /// Current period of the task named by `handle`, if it exists.
    pub fn period(&self, handle: TaskHandle) -> Option<RtcCycles> {
        self.get(handle).map(|t| t.period)
    }

    /// Cycles the task named by `handle` has accumulated since it last came
    /// due, if it exists.
    pub fn elapsed(&self, handle: TaskHandle) -> Option<RtcCycles> {
        self.get(handle).map(|t| t.elapsed)
    }

    fn get(&self, handle: TaskHandle) -> Option<&ScheduledTask<'a>> {
        self.slots.get(handle.0)?.as_ref()
    }

    fn get_mut(
        &mut self,
        handle: TaskHandle,
    ) -> Result<&mut ScheduledTask<'a>, TaskError> {
        self.slots
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(TaskError::NoSuchTask)
    }

    /// Registered tasks with their handles, in registration order.
    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (TaskHandle, &mut ScheduledTask<'a>)> {
        self.slots[..self.len]
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|t| (TaskHandle(i), t)))
    }
}

/// What a running task can see and change about itself.
pub struct TaskContext<'t> {
    handle: TaskHandle,
    period: &'t mut RtcCycles,
    config: &'t SchedulerConfig,
    now: RtcInstant,
}

impl<'t> TaskContext<'t> {
    pub(crate) fn new(
        handle: TaskHandle,
        period: &'t mut RtcCycles,
        config: &'t SchedulerConfig,
        now: RtcInstant,
    ) -> Self {
        crate::cheap_assert!(config.period_in_range(*period));
        Self { handle, period, config, now }
    }

    /// Handle of the running task.
    pub fn handle(&self) -> TaskHandle {
        self.handle
    }

    /// Period of the running task.
    pub fn period(&self) -> RtcCycles {
        *self.period
    }

    /// Changes the running task's period. The task will next come due after
    /// `period` cycles, counted from this tick.
    ///
    /// This is how a task alternates between phases of different lengths,
    /// e.g. the on and off halves of a duty cycle.
    pub fn set_period(&mut self, period: RtcCycles) -> Result<(), TaskError> {
        if !self.config.period_in_range(period) {
            warn!("task {} period {} out of range", self.handle.0, period.0);
            return Err(TaskError::PeriodOutOfRange);
        }
        *self.period = period;
        Ok(())
    }

    /// RTC cycles since boot at the alarm that started this tick.
    pub fn now(&self) -> RtcInstant {
        self.now
    }
}

impl fmt::Debug for TaskContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("handle", &self.handle)
            .field("period", &self.period)
            .field("now", &self.now)
            .finish()
    }
}
