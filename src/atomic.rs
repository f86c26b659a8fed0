// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Atomic "polyfill" for the one read-modify-write operation we need.
//!
//! The wake flag handed from the dispatcher ISR to the mainline has to be
//! read and cleared in one indivisible step, or an RTC alarm landing between
//! the read and the clear would be lost. On most targets that's a native
//! `swap`. ARMv6-M processors like the Cortex-M0 have no atomic swap, so
//! there we do the load and store with interrupts disabled instead.
//!
//! Disabling interrupts on an M0 hurts interrupt latency a little, but the
//! window is two instructions long, and the M0 was never going to win any
//! latency contests anyway.

use core::sync::atomic::{AtomicBool, Ordering};

/// Basic atomic operations.
pub trait AtomicExt {
    /// Primitive type corresponding to this atomic type.
    type Value;

    /// Atomically exchange our current contents for `val`, returning the
    /// original contents.
    ///
    /// Replacement for `swap`.
    fn swap_polyfill(&self, val: Self::Value, ordering: Ordering) -> Self::Value;
}

macro_rules! impl_atomic_polyfills {
    ($t:ty, $v:ty) => {
        // Native version
        #[cfg(rtc_sched_has_native_rmw)]
        impl AtomicExt for $t {
            type Value = $v;

            #[inline(always)]
            fn swap_polyfill(
                &self,
                val: Self::Value,
                ordering: Ordering,
            ) -> Self::Value {
                self.swap(val, ordering)
            }
        }

        // Non-native version
        #[cfg(not(rtc_sched_has_native_rmw))]
        impl AtomicExt for $t {
            type Value = $v;

            #[inline(always)]
            fn swap_polyfill(
                &self,
                val: Self::Value,
                ordering: Ordering,
            ) -> Self::Value {
                let (lo, so) = rmw_ordering(ordering);
                cortex_m::interrupt::free(|_| {
                    let x = self.load(lo);
                    self.store(val, so);
                    x
                })
            }
        }
    };
}

impl_atomic_polyfills!(AtomicBool, bool);

#[cfg(not(rtc_sched_has_native_rmw))]
#[inline(always)]
fn rmw_ordering(o: Ordering) -> (Ordering, Ordering) {
    match o {
        Ordering::AcqRel => (Ordering::Acquire, Ordering::Release),
        Ordering::Relaxed => (o, o),
        Ordering::SeqCst => (o, o),
        Ordering::Acquire => (Ordering::Acquire, Ordering::Relaxed),
        Ordering::Release => (Ordering::Relaxed, Ordering::Release),
        _ => panic!(),
    }
}
