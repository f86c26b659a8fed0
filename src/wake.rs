// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wakeup interrupt handling.
//!
//! The wakeup controller latches a sticky flag for each thing that can bring
//! the device out of sleep, and raises a single interrupt while any of them
//! is set. [`dispatch`] is the body of that interrupt handler: it works out
//! which causes are asserted, clears them, and passes on the one the
//! scheduler cares about (the RTC alarm) through an [`RtcWake`] flag.
//!
//! `dispatch` is the only part of this crate meant to run at interrupt
//! priority. The flag is the only state it shares with the mainline.
//!
//! # Draining
//!
//! A new cause can latch while the handler is running, after we've read the
//! status. Depending on the controller, that may not raise a fresh interrupt
//! edge. So after handling what it saw, `dispatch` checks the status once
//! more and, if anything is still set, pends its own interrupt so the handler
//! runs again.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::atomic::AtomicExt;

/// A set of wake causes, as reported by the wakeup controller.
#[derive(Copy, Clone, Eq, PartialEq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WakeCauses(u32);

impl WakeCauses {
    /// No cause.
    pub const NONE: Self = Self(0);
    /// Edge on the external wakeup pin.
    pub const PIN: Self = Self(1 << 0);
    /// RTC alarm.
    pub const RTC_ALARM: Self = Self(1 << 1);
    /// Auxiliary (radio baseband) timer.
    pub const AUX_TIMER: Self = Self(1 << 2);

    /// Wraps raw status bits. Bits outside the named causes are kept, so that
    /// an unrecognized cause still counts as "something is pending."
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw status bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Checks whether every cause in `other` is also in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Checks whether no cause is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for WakeCauses {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for WakeCauses {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for WakeCauses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for (cause, name) in [
            (Self::PIN, "PIN"),
            (Self::RTC_ALARM, "RTC_ALARM"),
            (Self::AUX_TIMER, "AUX_TIMER"),
        ] {
            if self.contains(cause) {
                set.entry(&format_args!("{}", name));
            }
        }
        let other = self.0 & !(Self::PIN | Self::RTC_ALARM | Self::AUX_TIMER).0;
        if other != 0 {
            set.entry(&format_args!("{:#x}", other));
        }
        set.finish()
    }
}

/// The wakeup controller: sticky cause flags plus the interrupt that reports
/// them.
pub trait WakeController {
    /// Reads the composite wake status.
    fn status(&mut self) -> WakeCauses;

    /// Clears the sticky flags for `causes`.
    fn clear(&mut self, causes: WakeCauses);

    /// Checks whether the wakeup interrupt is already pending.
    fn is_pending(&mut self) -> bool;

    /// Pends the wakeup interrupt.
    fn pend(&mut self);
}

/// Signal from the wakeup interrupt to the mainline that the RTC alarm fired.
///
/// Any number of alarms between two calls to [`take`](Self::take) collapse
/// into one; the scheduler only needs to know that at least one happened.
#[derive(Debug, Default)]
pub struct RtcWake(AtomicBool);

impl RtcWake {
    /// Creates a flag with no wake pending. This is a `const fn` so the flag
    /// can live in a `static` shared with the interrupt handler.
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Records that the RTC alarm fired. Safe to call from an ISR.
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Checks for and clears a pending wake in one step. A wake signalled
    /// concurrently lands either before (and is returned here) or after (and
    /// is returned next time); it's never lost.
    pub fn take(&self) -> bool {
        self.0.swap_polyfill(false, Ordering::AcqRel)
    }

    /// Checks for a pending wake without clearing it.
    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handles a wakeup interrupt.
///
/// For each cause in the controller's status: the RTC alarm is cleared and
/// signalled through `rtc_wake`; the pin cause is cleared and `on_pin` is
/// called; the auxiliary timer is just cleared. If causes are still pending
/// afterwards, the wakeup interrupt is re-pended.
///
/// Returns the causes that were handled.
pub fn dispatch<W>(
    controller: &mut W,
    rtc_wake: &RtcWake,
    mut on_pin: impl FnMut(),
) -> WakeCauses
where
    W: WakeController,
{
    let status = controller.status();

    if status.contains(WakeCauses::PIN) {
        controller.clear(WakeCauses::PIN);
        on_pin();
    }
    if status.contains(WakeCauses::RTC_ALARM) {
        controller.clear(WakeCauses::RTC_ALARM);
        rtc_wake.signal();
    }
    if status.contains(WakeCauses::AUX_TIMER) {
        controller.clear(WakeCauses::AUX_TIMER);
    }

    if !controller.status().is_empty() && !controller.is_pending() {
        trace!("wake causes still pending, re-pending");
        controller.pend();
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    /// Wake controller that can latch a new cause partway through dispatch.
    #[derive(Default)]
    struct FakeController {
        status: u32,
        pending: bool,
        pends: usize,
        cleared: Vec<WakeCauses>,
        /// Latched on the first clear, simulating a cause arriving mid-ISR.
        late: Option<WakeCauses>,
    }

    impl WakeController for FakeController {
        fn status(&mut self) -> WakeCauses {
            WakeCauses::from_bits(self.status)
        }

        fn clear(&mut self, causes: WakeCauses) {
            self.status &= !causes.bits();
            self.cleared.push(causes);
            if let Some(late) = self.late.take() {
                self.status |= late.bits();
            }
        }

        fn is_pending(&mut self) -> bool {
            self.pending
        }

        fn pend(&mut self) {
            self.pending = true;
            self.pends += 1;
        }
    }

    #[test]
    fn rtc_alarm_signals_mainline() {
        let wake = RtcWake::new();
        let mut ctl = FakeController {
            status: WakeCauses::RTC_ALARM.bits(),
            ..FakeController::default()
        };
        let handled = dispatch(&mut ctl, &wake, || panic!("no pin event"));

        assert_eq!(handled, WakeCauses::RTC_ALARM);
        assert_eq!(ctl.status, 0);
        assert_eq!(ctl.pends, 0);
        assert!(wake.is_pending());
        assert!(wake.take());
        assert!(!wake.take());
    }

    #[test]
    fn every_asserted_cause_is_cleared() {
        let wake = RtcWake::new();
        let mut pins = 0;
        let mut ctl = FakeController {
            status: (WakeCauses::PIN | WakeCauses::RTC_ALARM | WakeCauses::AUX_TIMER)
                .bits(),
            ..FakeController::default()
        };
        dispatch(&mut ctl, &wake, || pins += 1);

        assert_eq!(pins, 1);
        assert_eq!(ctl.status, 0);
        assert_eq!(ctl.cleared, [
            WakeCauses::PIN,
            WakeCauses::RTC_ALARM,
            WakeCauses::AUX_TIMER,
        ]);
        assert!(wake.take());
    }

    #[test]
    fn aux_timer_alone_does_not_wake_scheduler() {
        let wake = RtcWake::new();
        let mut ctl = FakeController {
            status: WakeCauses::AUX_TIMER.bits(),
            ..FakeController::default()
        };
        dispatch(&mut ctl, &wake, || ());
        assert!(!wake.is_pending());
        assert_eq!(ctl.status, 0);
    }

    #[test]
    fn late_cause_re_pends_interrupt() {
        let wake = RtcWake::new();
        let mut ctl = FakeController {
            status: WakeCauses::PIN.bits(),
            late: Some(WakeCauses::RTC_ALARM),
            ..FakeController::default()
        };
        let handled = dispatch(&mut ctl, &wake, || ());

        // The alarm arrived after the status was read, so it wasn't handled
        // this time, but the interrupt will come back around for it.
        assert_eq!(handled, WakeCauses::PIN);
        assert!(!wake.is_pending());
        assert_eq!(ctl.pends, 1);

        ctl.pending = false;
        let handled = dispatch(&mut ctl, &wake, || ());
        assert_eq!(handled, WakeCauses::RTC_ALARM);
        assert!(wake.take());
        assert_eq!(ctl.pends, 1);
    }

    #[test]
    fn already_pending_interrupt_is_not_pended_again() {
        let wake = RtcWake::new();
        let mut ctl = FakeController {
            status: WakeCauses::AUX_TIMER.bits(),
            late: Some(WakeCauses::PIN),
            pending: true,
            ..FakeController::default()
        };
        dispatch(&mut ctl, &wake, || ());
        assert_eq!(ctl.pends, 0);
    }

    #[test]
    fn unknown_bits_keep_interrupt_alive() {
        let wake = RtcWake::new();
        let mut ctl = FakeController {
            status: 1 << 7,
            ..FakeController::default()
        };
        let handled = dispatch(&mut ctl, &wake, || ());
        assert_eq!(handled.bits(), 1 << 7);
        assert_eq!(ctl.pends, 1);
    }

    #[test]
    fn causes_debug() {
        let c = WakeCauses::PIN | WakeCauses::from_bits(1 << 8);
        assert_eq!(std::format!("{:?}", c), "{PIN, 0x100}");
        assert_eq!(std::format!("{:?}", WakeCauses::NONE), "{}");
    }
}
