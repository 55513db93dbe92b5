//! # Round-Robin Scheduling.
//!
//! Round-Robin scheduling is a preemptive scheduling algorithm that assigns
//! each thread a fixed time slice (or quantum) in a circular order. Once a
//! thread's time slice expires, it is preempted and pushed back to the end of
//! the ready queue, while the next thread in the queue gets to run. This
//! guarantees that all threads receive a fair share of CPU time.
//!
//! The time slice is counted in timer interrupts. Every timer interrupt
//! invokes [`Scheduler::timer_tick`], which decrements the remaining slice of
//! the running thread and yields it once the slice is used up. The yield is
//! deferred until the interrupt handler returns.
//!
//! A thread that keeps interrupts disabled is never preempted: it does not
//! observe timer interrupts at all.
//!
//! [`Scheduler::timer_tick`]: kernel::thread::scheduler::Scheduler::timer_tick
use kernel::{
    sync::{SpinLock, atomic::AtomicIsize},
    thread::{Current, Thread, scheduler::Scheduler},
};
use std::collections::VecDeque;

/// Default time slice, in timer interrupts.
pub const DEFAULT_QUANTUM: isize = 2;

/// A round robin scheduler.
pub struct RoundRobin {
    /// Queue of threads ready to run.
    run_queue: SpinLock<VecDeque<Box<Thread>>>,
    /// Remaining time slice for the currently running thread.
    remain: AtomicIsize,
    quantum: isize,
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundRobin {
    /// Create a new [`RoundRobin`] scheduler with [`DEFAULT_QUANTUM`].
    pub fn new() -> Self {
        Self::with_quantum(DEFAULT_QUANTUM)
    }

    /// Create a new [`RoundRobin`] scheduler that preempts a thread after
    /// `quantum` timer interrupts.
    pub fn with_quantum(quantum: isize) -> Self {
        Self {
            run_queue: SpinLock::new(VecDeque::new()),
            remain: AtomicIsize::new(quantum.max(1)),
            quantum: quantum.max(1),
        }
    }
}

impl Scheduler for RoundRobin {
    fn next_to_run(&self) -> Option<Box<Thread>> {
        let mut run_queue = self.run_queue.lock();
        let next = run_queue.pop_front();
        run_queue.unlock();
        if next.is_some() {
            self.remain.store(self.quantum);
        }
        next
    }

    fn push_to_queue(&self, th: Box<Thread>) {
        let mut run_queue = self.run_queue.lock();
        run_queue.push_back(th);
        run_queue.unlock();
    }

    fn timer_tick(&self) {
        if self.remain.fetch_sub(1) <= 1 {
            Current::yield_now();
        }
    }
}
