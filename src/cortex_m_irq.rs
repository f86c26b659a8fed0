// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cortex-M implementations of the interrupt-facing hardware traits.
//!
//! What's here is the part that's the same on any Cortex-M: saving and
//! clearing the NVIC enable bits, halting in `WFI` until one particular
//! interrupt pends, and pending the wakeup interrupt. Which GPIO the standby
//! clock comes out on, and which bits of which register hold the wake causes,
//! are the board's business; it supplies those through [`EdgeChannel`] and
//! [`WakeStatus`].

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;
use cortex_m::register::primask::{self, Primask};

use crate::rtc::{InterruptMask, StandbyClock};
use crate::wake::{WakeCauses, WakeController};

/// Interrupt mask that disables every NVIC interrupt except the standby
/// clock edge interrupt, with PRIMASK set on top.
///
/// `W` is the number of 32-bit NVIC enable words the part implements.
#[derive(Debug)]
pub struct NvicMask<I, const W: usize> {
    edge_irq: I,
}

impl<I: InterruptNumber, const W: usize> NvicMask<I, W> {
    /// Creates a mask that leaves `edge_irq` enabled.
    pub fn new(edge_irq: I) -> Self {
        Self { edge_irq }
    }
}

/// NVIC and PRIMASK state captured by [`NvicMask`].
#[derive(Copy, Clone, Debug)]
pub struct SavedMask<const W: usize> {
    iser: [u32; W],
    primask: Primask,
}

impl<I: InterruptNumber, const W: usize> InterruptMask for NvicMask<I, W> {
    type Saved = SavedMask<W>;

    fn save_and_disable(&mut self) -> SavedMask<W> {
        let primask = primask::read();
        cortex_m::interrupt::disable();

        // Safety: interrupts are off and we own the NVIC enable state until
        // `restore`.
        let nvic = unsafe { &*NVIC::PTR };
        let mut iser = [0; W];
        for (i, word) in iser.iter_mut().enumerate() {
            *word = nvic.iser[i].read();
            // Safety: clearing enables can't break memory safety.
            unsafe {
                nvic.icer[i].write(!0);
            }
        }
        NVIC::unpend(self.edge_irq);
        // Safety: the edge interrupt's handler (if any) doesn't share state
        // with a critical section; it only needs to wake us.
        unsafe {
            NVIC::unmask(self.edge_irq);
        }

        SavedMask { iser, primask }
    }

    fn restore(&mut self, saved: SavedMask<W>) {
        NVIC::mask(self.edge_irq);

        // Safety: see save_and_disable.
        let nvic = unsafe { &*NVIC::PTR };
        for (i, word) in saved.iser.iter().enumerate() {
            // Safety: just restoring state.
            unsafe {
                nvic.iser[i].write(*word);
            }
        }

        if saved.primask == Primask::Active {
            // Safety: interrupts were on when we were called, so this won't
            // compromise memory safety.
            unsafe {
                cortex_m::interrupt::enable();
            }
        }
    }
}

/// Which standby clock edge an [`EdgeChannel`] should trigger on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Low to high.
    Rising,
    /// High to low.
    Falling,
}

/// A GPIO edge-detect interrupt wired to the standby clock output.
pub trait EdgeChannel {
    /// NVIC interrupt raised by the channel.
    type Irq: InterruptNumber;

    /// The channel's interrupt number.
    fn irq(&self) -> Self::Irq;

    /// Routes the standby clock to the pin and triggers on `edge`, or with
    /// `None`, stops triggering and releases the pin.
    fn route(&mut self, edge: Option<Edge>);
}

/// Standby clock edge waits using `WFI`.
///
/// This relies on everything but the edge interrupt being disabled in the
/// NVIC, as [`NvicMask`] arranges; with PRIMASK set the interrupt wakes the
/// core without running a handler.
#[derive(Debug)]
pub struct WfiStandbyClock<E>(pub E);

impl<E: EdgeChannel> WfiStandbyClock<E> {
    fn wait(&mut self, edge: Edge) {
        let irq = self.0.irq();
        self.0.route(Some(edge));
        while !NVIC::is_pending(irq) {
            cortex_m::asm::wfi();
        }
        NVIC::unpend(irq);
    }
}

impl<E: EdgeChannel> StandbyClock for WfiStandbyClock<E> {
    fn enable(&mut self) {
        self.0.route(None);
        NVIC::unpend(self.0.irq());
    }

    fn wait_rising(&mut self) {
        self.wait(Edge::Rising);
    }

    fn wait_falling(&mut self) {
        self.wait(Edge::Falling);
    }

    fn disable(&mut self) {
        self.0.route(None);
        NVIC::unpend(self.0.irq());
    }
}

/// The board's view of the wakeup controller's sticky status register.
pub trait WakeStatus {
    /// Reads the asserted causes.
    fn read(&mut self) -> WakeCauses;

    /// Clears the sticky flags for `causes`.
    fn clear(&mut self, causes: WakeCauses);
}

/// Wake controller combining a board status register with the NVIC line of
/// the wakeup interrupt.
#[derive(Debug)]
pub struct NvicWakeController<S, I> {
    status: S,
    irq: I,
}

impl<S: WakeStatus, I: InterruptNumber> NvicWakeController<S, I> {
    /// Creates a controller for the wakeup interrupt `irq`.
    pub fn new(status: S, irq: I) -> Self {
        Self { status, irq }
    }
}

impl<S: WakeStatus, I: InterruptNumber> WakeController for NvicWakeController<S, I> {
    fn status(&mut self) -> WakeCauses {
        self.status.read()
    }

    fn clear(&mut self, causes: WakeCauses) {
        self.status.clear(causes);
    }

    fn is_pending(&mut self) -> bool {
        NVIC::is_pending(self.irq)
    }

    fn pend(&mut self) {
        NVIC::pend(self.irq);
    }
}
