//! # Condition variable.
//!
//! A condition variable lets a thread block, consuming no CPU time, until
//! another thread announces that some condition may have changed. It is always
//! used together with a [`Lock`] that protects the condition: the condition is
//! checked with the lock held, and the thread sleeps only if the check fails.
//!
//! ```rust,ignore
//! lock.acquire();
//! while !ready() {
//!     cond.sleep();
//! }
//! // The condition holds, and the lock is held.
//! lock.release();
//! ```
//!
//! The hazard a condition variable must avoid is the **lost wakeup**: a waker
//! that runs after the sleeper released the lock, but before the sleeper was
//! recorded as waiting, finds nobody to wake and the sleeper blocks forever.
//! [`Condition::sleep`] therefore disables interrupts before releasing the
//! lock and keeps them disabled until the thread is recorded in the wait queue
//! and parked. On a uniprocessor no other thread can run in between, so
//! "release, record, block" is atomic.
//!
//! Every operation requires the calling thread to hold the lock. Violations
//! are fatal assertions.
use kernel::{
    interrupt::InterruptGuard,
    sync::{FifoQueue, Lock, SpinLock, WaitQueue},
    thread::Current,
};
use std::sync::Arc;

/// A condition variable over a shared [`Lock`].
///
/// The order in which sleepers are woken is decided by the wait queue `Q`,
/// first-come-first-served by default.
pub struct Condition<Q: WaitQueue = FifoQueue> {
    lock: Arc<Lock>,
    waiters: SpinLock<Q>,
}

impl<Q: WaitQueue> Condition<Q> {
    /// Creates a condition variable associated with `lock`.
    pub fn new(lock: Arc<Lock>) -> Self {
        Self {
            lock,
            waiters: SpinLock::new(Q::default()),
        }
    }

    /// The lock associated with this condition variable.
    pub fn lock(&self) -> &Arc<Lock> {
        &self.lock
    }

    /// Number of threads recorded as sleeping.
    pub fn waiting(&self) -> usize {
        let waiters = self.waiters.lock();
        let n = waiters.len();
        waiters.unlock();
        n
    }

    fn assert_held(&self, op: &str) {
        assert!(
            self.lock.is_held_by_current_thread(),
            "Condition::{op} requires the calling thread to hold the lock."
        );
    }

    /// Atomically releases the lock and blocks until woken, then re-acquires
    /// the lock before returning.
    ///
    /// # Panics
    /// Panics if the calling thread does not hold the lock.
    pub fn sleep(&self) {
        self.assert_held("sleep");
        let guard = InterruptGuard::new();
        self.lock.release();
        let mut waiters = self.waiters.lock();
        Current::park_with(|handle| {
            waiters.push(handle);
            waiters.unlock();
        });
        drop(guard);
        self.lock.acquire();
    }

    /// Wakes at most one sleeping thread.
    ///
    /// Returns whether a thread was woken. Does not block.
    ///
    /// # Panics
    /// Panics if the calling thread does not hold the lock.
    pub fn wake(&self) -> bool {
        self.assert_held("wake");
        let mut waiters = self.waiters.lock();
        let next = waiters.pop();
        waiters.unlock();
        match next {
            Some(handle) => {
                handle.unpark();
                true
            }
            None => false,
        }
    }

    /// Wakes every thread sleeping at the moment of the call.
    ///
    /// Threads that start sleeping while the batch is being woken are not part
    /// of it. Returns the number of woken threads.
    ///
    /// # Panics
    /// Panics if the calling thread does not hold the lock.
    pub fn wake_all(&self) -> usize {
        self.assert_held("wake_all");
        let mut waiters = self.waiters.lock();
        let mut batch = std::mem::take(&mut *waiters);
        waiters.unlock();
        let mut woken = 0;
        while let Some(handle) = batch.pop() {
            handle.unpark();
            woken += 1;
        }
        woken
    }
}
