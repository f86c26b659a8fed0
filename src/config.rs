// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scheduler limits and stock task timing.
//!
//! These are all fixed for the life of the device. They're plain values
//! rather than Cargo features so that tests can tighten them, and so that a
//! board crate can derive them from its own constants in a `const` context:
//!
//! ```
//! use rtc_sched::config::SchedulerConfig;
//! use rtc_sched::time::RtcCycles;
//!
//! const CONFIG: SchedulerConfig = SchedulerConfig::DEFAULT
//!     .with_max_burst(RtcCycles::from_secs(10));
//! ```

use crate::time::RtcCycles;

/// Preload value the RTC down-counter restarts from at every alarm.
///
/// The count between alarms is always far below this, so the distance
/// `PRELOAD - counter` is the number of cycles since the last alarm.
pub const DEFAULT_PRELOAD: u32 = 0xDEAD_BEEF;

/// Limits and constants shared by the task table, the scheduler and the RTC
/// synchronizer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulerConfig {
    /// Shortest task period accepted at registration.
    pub min_burst: RtcCycles,
    /// Longest task period accepted at registration, and the longest the
    /// scheduler will ever sleep.
    pub max_burst: RtcCycles,
    /// Interval the RTC is armed for before the scheduler takes over. The
    /// first tick advances every task by this much.
    pub startup_interval: RtcCycles,
    /// Value the RTC counter is reloaded with after each alarm.
    pub preload: u32,
}

impl SchedulerConfig {
    /// 1 ms to 60 s periods, a 1 s startup interval, and the standard
    /// preload.
    pub const DEFAULT: Self = Self {
        min_burst: RtcCycles::from_millis(1),
        max_burst: RtcCycles::from_secs(60),
        startup_interval: RtcCycles::from_secs(1),
        preload: DEFAULT_PRELOAD,
    };

    /// Replaces the minimum task period.
    pub const fn with_min_burst(self, min_burst: RtcCycles) -> Self {
        Self { min_burst, ..self }
    }

    /// Replaces the maximum task period and sleep duration.
    pub const fn with_max_burst(self, max_burst: RtcCycles) -> Self {
        Self { max_burst, ..self }
    }

    /// Replaces the startup interval.
    pub const fn with_startup_interval(self, startup_interval: RtcCycles) -> Self {
        Self { startup_interval, ..self }
    }

    /// Replaces the RTC preload value.
    pub const fn with_preload(self, preload: u32) -> Self {
        Self { preload, ..self }
    }

    /// Checks whether `period` is acceptable as a task period.
    pub const fn period_in_range(&self, period: RtcCycles) -> bool {
        period.0 >= self.min_burst.0 && period.0 <= self.max_burst.0
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// On and off phases of the advertising duty cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingConfig {
    /// How long advertising stays on.
    pub on: RtcCycles,
    /// How long advertising stays off.
    pub off: RtcCycles,
}

impl AdvertisingConfig {
    /// Two seconds on, eight off.
    pub const DEFAULT: Self = Self {
        on: RtcCycles::from_secs(2),
        off: RtcCycles::from_secs(8),
    };
}

impl Default for AdvertisingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Period of the stock housekeeping task.
pub const HOUSEKEEPING_PERIOD: RtcCycles = RtcCycles::from_secs(30);
