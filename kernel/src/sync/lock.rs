//! Blocking mutual-exclusion lock.
use super::{FifoQueue, SpinLock, WaitQueue};
use crate::{
    interrupt::InterruptGuard,
    thread::{Current, ParkHandle},
};

/// A mutual exclusion lock owned by the thread that acquired it.
///
/// Unlike [`SpinLock`], a thread waiting for a [`Lock`] parks instead of
/// spinning, and a thread holding a [`Lock`] may block. Ownership is handed
/// directly from the releasing thread to the first waiter, so a released lock
/// can never be stolen by a thread that arrives later.
///
/// # Examples
///
/// ```rust,ignore
/// let lock = Lock::new();
/// lock.acquire();
/// assert!(lock.is_held_by_current_thread());
/// lock.release();
/// ```
#[derive(Default)]
pub struct Lock {
    inner: SpinLock<LockInner>,
}

#[derive(Default)]
struct LockInner {
    holder: Option<u64>,
    waiters: FifoQueue,
}

impl Lock {
    /// Creates a new lock in an unlocked state ready for use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock, parking the current thread until it is available.
    ///
    /// # Panics
    /// Panics if the current thread already holds the lock.
    pub fn acquire(&self) {
        let me = Current::get_tid();
        let guard = InterruptGuard::new();
        let mut inner = self.inner.lock();
        if inner.holder == Some(me) {
            inner.unlock();
            panic!("Lock acquired twice by thread {me}.");
        }
        if inner.holder.is_none() {
            inner.holder = Some(me);
            inner.unlock();
        } else {
            Current::park_with(|handle| {
                inner.waiters.push(handle);
                inner.unlock();
            });
        }
        drop(guard);
    }

    /// Releases the lock, handing it to the first waiter if any.
    ///
    /// # Panics
    /// Panics if the current thread does not hold the lock.
    pub fn release(&self) {
        let me = Current::get_tid();
        let mut inner = self.inner.lock();
        if inner.holder != Some(me) {
            inner.unlock();
            panic!("Lock released by thread {me}, which does not hold it.");
        }
        let next = inner.waiters.pop();
        inner.holder = next.as_ref().map(ParkHandle::tid);
        inner.unlock();
        if let Some(next) = next {
            next.unpark();
        }
    }

    /// Whether the current thread holds the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        let me = Current::get_tid();
        let inner = self.inner.lock();
        let held = inner.holder == Some(me);
        inner.unlock();
        held
    }
}
