//! Clock and programmable timer.
//!
//! The clock only advances in interrupt windows (see the crate
//! documentation) and when the processor idles. Idling is only possible while
//! someone waits for the timer: a processor with nothing to run and no armed
//! timer is stuck forever, and [`idle`] reports that to the caller instead of
//! hanging.
use crate::{Machine, Status, try_current};
use rand::Rng;
use std::sync::atomic::Ordering;

/// Ticks consumed by each interrupt window.
pub const KERNEL_TICK: u64 = 10;

/// Ticks between two timer interrupts.
pub const TIMER_PERIOD: u64 = 500;

/// Current value of the clock, or 0 without an installed machine.
pub fn now() -> u64 {
    try_current().map_or(0, |m| m.now())
}

/// Records that a thread waits for a future timer interrupt.
pub fn arm() {
    if let Some(m) = try_current() {
        m.armed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Withdraws one [`arm`].
pub fn disarm() {
    if let Some(m) = try_current() {
        let _ = m
            .armed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

/// Idles the processor until the next timer interrupt and delivers it.
///
/// Must be called with interrupts disabled. Rescheduling requests raised by
/// the handler are dropped, as the caller is about to pick the next thread
/// anyway.
///
/// Returns `false` without waiting if no timer is armed or the machine is
/// halted.
pub fn idle() -> bool {
    let Some(m) = try_current() else {
        return false;
    };
    if m.armed.load(Ordering::SeqCst) == 0 || m.is_halted() {
        return false;
    }
    let target = m.next_fire.load(Ordering::SeqCst);
    m.clock.fetch_max(target, Ordering::SeqCst);
    m.fire();
    m.set(Status::RESCHEDULE, false);
    true
}

impl Machine {
    pub(crate) fn next_period(&self) -> u64 {
        let mut rng = self.rng.lock();
        let period = match rng.as_mut() {
            Some(rng) => rng.gen_range(1..=2 * TIMER_PERIOD),
            None => TIMER_PERIOD,
        };
        rng.unlock();
        period
    }
}
