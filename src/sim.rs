// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simulated RTC hardware for host tests.
//!
//! A single `Sim` stands in for the counter, the standby clock edge channel,
//! and the interrupt mask; clones share state, so tests hand one clone to each
//! role and keep one to drive time and inspect what happened.
//!
//! The counter model: each RTC cycle, a counter at zero fires the alarm and
//! reloads from the preload register; any other value counts down by one.
//! Reloading from software sets the counter to the preload register
//! immediately. Waiting for a rising edge takes `edge_delay` cycles (zero by
//! default, i.e. we were already sitting on one); the falling edge is half a
//! cycle later and takes no whole cycles.

use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use crate::config::DEFAULT_PRELOAD;
use crate::rtc::{InterruptMask, RtcCounter, StandbyClock};

pub(crate) const P: u32 = DEFAULT_PRELOAD;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Op {
    SaveMask,
    RestoreMask,
    ClockEnable,
    ClockDisable,
    WaitRising,
    WaitFalling,
    Read(u32),
    WritePreload(u32),
    Reload,
    ClearAlarm,
}

#[derive(Debug)]
struct State {
    now: u64,
    counter: u32,
    preload: u32,
    alarm_flag: bool,
    alarms: Vec<u64>,
    glitch: Option<u32>,
    edge_delay: u64,
    interrupts_enabled: bool,
    log: Vec<Op>,
}

impl State {
    fn elapse(&mut self, mut n: u64) {
        while n > 0 {
            if self.counter == 0 {
                self.now += 1;
                n -= 1;
                self.counter = self.preload;
                self.alarm_flag = true;
                self.alarms.push(self.now);
            } else {
                let step = n.min(u64::from(self.counter));
                self.counter -= step as u32;
                self.now += step;
                n -= step;
            }
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Sim(Rc<RefCell<State>>);

impl Sim {
    /// Fresh hardware at boot: counting down from `P`, interrupts enabled.
    pub(crate) fn new() -> Self {
        Self(Rc::new(RefCell::new(State {
            now: 0,
            counter: P,
            preload: P,
            alarm_flag: false,
            alarms: Vec::new(),
            glitch: None,
            edge_delay: 0,
            interrupts_enabled: true,
            log: Vec::new(),
        })))
    }

    pub(crate) fn elapse(&self, n: u64) {
        self.0.borrow_mut().elapse(n);
    }

    /// Advances to the cycle on which the alarm next fires.
    pub(crate) fn run_to_alarm(&self) {
        let mut s = self.0.borrow_mut();
        let n = u64::from(s.counter) + 1;
        s.elapse(n);
    }

    pub(crate) fn now(&self) -> u64 {
        self.0.borrow().now
    }

    pub(crate) fn counter(&self) -> u32 {
        self.0.borrow().counter
    }

    pub(crate) fn alarms(&self) -> Vec<u64> {
        self.0.borrow().alarms.clone()
    }

    pub(crate) fn alarm_pending(&self) -> bool {
        self.0.borrow().alarm_flag
    }

    pub(crate) fn interrupts_enabled(&self) -> bool {
        self.0.borrow().interrupts_enabled
    }

    pub(crate) fn glitch_next_read(&self, value: u32) {
        self.0.borrow_mut().glitch = Some(value);
    }

    pub(crate) fn set_edge_delay(&self, cycles: u64) {
        self.0.borrow_mut().edge_delay = cycles;
    }

    pub(crate) fn take_log(&self) -> Vec<Op> {
        core::mem::take(&mut self.0.borrow_mut().log)
    }

    fn record(&self, op: Op) {
        self.0.borrow_mut().log.push(op);
    }
}

impl RtcCounter for Sim {
    fn read(&mut self) -> u32 {
        let mut s = self.0.borrow_mut();
        let v = s.glitch.take().unwrap_or(s.counter);
        s.log.push(Op::Read(v));
        v
    }

    fn write_preload(&mut self, value: u32) {
        self.0.borrow_mut().preload = value;
        self.record(Op::WritePreload(value));
    }

    fn reload(&mut self) {
        {
            let mut s = self.0.borrow_mut();
            s.counter = s.preload;
        }
        self.record(Op::Reload);
    }

    fn clear_alarm(&mut self) {
        self.0.borrow_mut().alarm_flag = false;
        self.record(Op::ClearAlarm);
    }
}

impl StandbyClock for Sim {
    fn enable(&mut self) {
        self.record(Op::ClockEnable);
    }

    fn wait_rising(&mut self) {
        {
            let mut s = self.0.borrow_mut();
            let n = s.edge_delay;
            s.elapse(n);
        }
        self.record(Op::WaitRising);
    }

    fn wait_falling(&mut self) {
        self.record(Op::WaitFalling);
    }

    fn disable(&mut self) {
        self.record(Op::ClockDisable);
    }
}

impl InterruptMask for Sim {
    type Saved = bool;

    fn save_and_disable(&mut self) -> bool {
        let mut s = self.0.borrow_mut();
        s.log.push(Op::SaveMask);
        core::mem::replace(&mut s.interrupts_enabled, false)
    }

    fn restore(&mut self, saved: bool) {
        let mut s = self.0.borrow_mut();
        s.log.push(Op::RestoreMask);
        s.interrupts_enabled = saved;
    }
}
