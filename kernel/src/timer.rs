//! Tick clock and periodic timer callbacks.
//!
//! Time is measured in ticks of the machine clock. The clock only advances in
//! interrupt windows and while the processor idles, so a thread that keeps
//! interrupts disabled observes a frozen clock.
//!
//! Every timer interrupt runs the registered hooks in registration order and
//! then calls [`Scheduler::timer_tick`]. Hooks run inside the interrupt
//! handler: they must not block, and a hook that wants the interrupted thread
//! to give up the processor calls [`Current::yield_now`], which is deferred
//! until the handler returns.
//!
//! [`Scheduler::timer_tick`]: crate::thread::scheduler::Scheduler::timer_tick
//! [`Current::yield_now`]: crate::thread::Current::yield_now
use crate::thread::scheduler::{Cpu, cpu, try_cpu};
use std::sync::{Arc, Weak};

pub use machine::timer::{KERNEL_TICK, TIMER_PERIOD};

pub(crate) type Hook = Arc<dyn Fn() + Send + Sync>;

/// Current time in ticks.
pub fn ticks() -> u64 {
    machine::timer::now()
}

/// Announces that the current thread waits for a timer interrupt.
///
/// While at least one wait is armed, a processor without runnable threads
/// idles until the next timer interrupt instead of reporting a deadlock.
pub fn arm() {
    machine::timer::arm();
}

/// Withdraws one [`arm`].
pub fn disarm() {
    machine::timer::disarm();
}

/// Registration of a timer callback.
///
/// The callback stays registered until the hook is dropped.
pub struct TimerHook {
    id: u64,
    cpu: Weak<Cpu>,
}

/// Calls `f` on every timer interrupt.
///
/// # Panics
/// Panics if called outside of a kernel thread.
pub fn on_timer(f: impl Fn() + Send + Sync + 'static) -> TimerHook {
    let cpu = cpu();
    let mut timers = cpu.timers.lock();
    let id = timers.next_id;
    timers.next_id += 1;
    timers.hooks.insert(id, Arc::new(f));
    timers.unlock();
    TimerHook {
        id,
        cpu: Arc::downgrade(&cpu),
    }
}

impl Drop for TimerHook {
    fn drop(&mut self) {
        if let Some(cpu) = self.cpu.upgrade() {
            let mut timers = cpu.timers.lock();
            timers.hooks.remove(&self.id);
            timers.unlock();
        }
    }
}

/// The timer interrupt handler.
pub(crate) fn dispatch() {
    let Some(cpu) = try_cpu() else {
        return;
    };
    let timers = cpu.timers.lock();
    let hooks = timers.hooks.values().cloned().collect::<Vec<_>>();
    timers.unlock();
    for hook in hooks {
        hook();
    }
    cpu.scheduler.timer_tick();
}
