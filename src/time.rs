// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Units of RTC time.
//!
//! Everything in this crate counts time in *RTC cycles*: ticks of the
//! always-running 32.768 kHz low-power clock, which keeps counting while the
//! rest of the chip sleeps. There are two types for this, in slightly
//! different roles.
//!
//! `RtcCycles` is a relative interval -- a task period, a sleep duration, a
//! countdown value. It's 32 bits wide, which covers a bit over 36 hours at
//! 32.768 kHz; that's far longer than any single sleep.
//!
//! `RtcInstant` is a point in time, measured as the number of RTC cycles since
//! boot. It's 64 bits wide, which at 32.768 kHz overflows every 17 million
//! years, so we ignore overflow.
//!
//! `Uptime` breaks an `RtcInstant` down into days, hours, minutes, seconds and
//! milliseconds for humans.
//!
//! Conversions from milliseconds truncate. 32.768 kHz does not divide evenly
//! into milliseconds, so `RtcCycles::from_millis(1)` is 32 cycles, not 32.768;
//! periods specified in whole seconds are exact.

use core::fmt;
use core::ops::{Add, AddAssign};

/// Frequency of the RTC clock domain, in Hz.
pub const RTC_HZ: u32 = 32_768;

const CYCLES_PER_SECOND: u64 = RTC_HZ as u64;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// A relative interval measured in RTC cycles.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtcCycles(pub u32);

impl RtcCycles {
    /// Zero cycles.
    pub const ZERO: Self = Self(0);

    /// Converts milliseconds to RTC cycles, truncating.
    pub const fn from_millis(ms: u32) -> Self {
        Self((ms as u64 * CYCLES_PER_SECOND / 1000) as u32)
    }

    /// Converts whole seconds to RTC cycles.
    pub const fn from_secs(s: u32) -> Self {
        Self(s * RTC_HZ)
    }

    /// Converts back to milliseconds, truncating.
    pub const fn as_millis(self) -> u32 {
        (self.0 as u64 * 1000 / CYCLES_PER_SECOND) as u32
    }

    /// Subtracts `other`, stopping at zero instead of wrapping.
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Adds `other`, stopping at `u32::MAX` instead of wrapping.
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl From<RtcCycles> for u32 {
    fn from(c: RtcCycles) -> Self {
        c.0
    }
}

impl From<u32> for RtcCycles {
    fn from(x: u32) -> Self {
        Self(x)
    }
}

impl fmt::Display for RtcCycles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cycles", self.0)
    }
}

/// A moment in time, as the number of RTC cycles since boot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtcInstant(u64);

impl RtcInstant {
    /// The moment of boot.
    pub const BOOT: Self = Self(0);

    /// Constructs an `RtcInstant` describing `cycles` RTC cycles since boot.
    pub const fn from_cycles_since_boot(cycles: u64) -> Self {
        Self(cycles)
    }

    /// Number of RTC cycles since boot.
    pub const fn cycles_since_boot(self) -> u64 {
        self.0
    }

    /// Breaks this instant down into calendar-ish fields.
    pub const fn uptime(self) -> Uptime {
        Uptime::from_cycles(self.0)
    }
}

/// Adds RTC cycles to an instant with normal `+` overflow behavior (i.e.
/// checked in debug builds, optionally not checked in release builds).
impl Add<RtcCycles> for RtcInstant {
    type Output = Self;
    fn add(self, other: RtcCycles) -> Self::Output {
        Self(self.0 + u64::from(other.0))
    }
}

impl AddAssign<RtcCycles> for RtcInstant {
    fn add_assign(&mut self, other: RtcCycles) {
        self.0 += u64::from(other.0);
    }
}

impl From<RtcInstant> for u64 {
    fn from(t: RtcInstant) -> Self {
        t.0
    }
}

/// Time since boot, broken down for reporting.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uptime {
    /// Whole days.
    pub days: u32,
    /// Hours past the last whole day, `0..24`.
    pub hours: u8,
    /// Minutes past the last whole hour, `0..60`.
    pub minutes: u8,
    /// Seconds past the last whole minute, `0..60`.
    pub seconds: u8,
    /// Milliseconds past the last whole second, `0..1000`.
    pub millis: u16,
}

impl Uptime {
    /// Breaks a count of RTC cycles down into days through milliseconds.
    pub const fn from_cycles(cycles: u64) -> Self {
        let secs = cycles / CYCLES_PER_SECOND;
        let sub = cycles % CYCLES_PER_SECOND;
        Self {
            days: (secs / SECONDS_PER_DAY) as u32,
            hours: (secs / 3600 % 24) as u8,
            minutes: (secs / 60 % 60) as u8,
            seconds: (secs % 60) as u8,
            millis: (sub * 1000 / CYCLES_PER_SECOND) as u16,
        }
    }
}

impl From<RtcInstant> for Uptime {
    fn from(t: RtcInstant) -> Self {
        t.uptime()
    }
}

impl fmt::Display for Uptime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}d {:02}:{:02}:{:02}.{:03}",
            self.days, self.hours, self.minutes, self.seconds, self.millis,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_conversions() {
        assert_eq!(RtcCycles::from_millis(500), RtcCycles(16_384));
        assert_eq!(RtcCycles::from_millis(1000), RtcCycles(32_768));
        assert_eq!(RtcCycles::from_millis(1), RtcCycles(32));
        assert_eq!(RtcCycles::from_secs(8), RtcCycles(262_144));
        assert_eq!(RtcCycles(16_384).as_millis(), 500);
        // 32 cycles is 0.977 ms.
        assert_eq!(RtcCycles(32).as_millis(), 0);
    }

    #[test]
    fn saturating_arithmetic() {
        assert_eq!(RtcCycles(5).saturating_sub(RtcCycles(9)), RtcCycles::ZERO);
        assert_eq!(RtcCycles(9).saturating_sub(RtcCycles(5)), RtcCycles(4));
        assert_eq!(
            RtcCycles(u32::MAX).saturating_add(RtcCycles(1)),
            RtcCycles(u32::MAX),
        );
    }

    #[test]
    fn instant_accumulates_past_32_bits() {
        let mut t = RtcInstant::BOOT;
        for _ in 0..3 {
            t += RtcCycles(u32::MAX);
        }
        assert_eq!(t.cycles_since_boot(), 3 * u64::from(u32::MAX));
    }

    #[test]
    fn uptime_breakdown() {
        // 1 day, 2 hours, 3 minutes, 4 seconds, and half a second.
        let secs = 86_400 + 2 * 3600 + 3 * 60 + 4;
        let cycles = secs * 32_768 + 16_384;
        let up = Uptime::from_cycles(cycles);
        assert_eq!(up, Uptime {
            days: 1,
            hours: 2,
            minutes: 3,
            seconds: 4,
            millis: 500,
        });
        assert_eq!(std::format!("{}", up), "1d 02:03:04.500");
    }

    #[test]
    fn uptime_of_one_day_in_cycles() {
        let up = RtcInstant::from_cycles_since_boot(2_831_155_200).uptime();
        assert_eq!(up.days, 1);
        assert_eq!((up.hours, up.minutes, up.seconds, up.millis), (0, 0, 0, 0));
    }
}
