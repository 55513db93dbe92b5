//! Counting semaphore.
use super::{FifoQueue, SpinLock, WaitQueue};
use crate::{interrupt::InterruptGuard, thread::Current};

/// A counting semaphore.
///
/// [`Semaphore::wait`] takes a permit, parking the current thread while none is
/// left. [`Semaphore::signal`] returns a permit, or hands it directly to the
/// first waiting thread. `signal` never blocks, so it may be called from an
/// interrupt handler.
#[derive(Default)]
pub struct Semaphore {
    inner: SpinLock<SemaphoreInner>,
}

#[derive(Default)]
struct SemaphoreInner {
    permits: usize,
    waiters: FifoQueue,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        Self {
            inner: SpinLock::new(SemaphoreInner {
                permits,
                waiters: FifoQueue::default(),
            }),
        }
    }

    /// Takes a permit, parking until one is available.
    pub fn wait(&self) {
        let guard = InterruptGuard::new();
        let mut inner = self.inner.lock();
        if inner.permits > 0 {
            inner.permits -= 1;
            inner.unlock();
        } else {
            // `signal` hands its permit to us directly.
            Current::park_with(|handle| {
                inner.waiters.push(handle);
                inner.unlock();
            });
        }
        drop(guard);
    }

    /// Takes a permit if one is available without blocking.
    pub fn try_wait(&self) -> bool {
        let mut inner = self.inner.lock();
        let taken = inner.permits > 0;
        if taken {
            inner.permits -= 1;
        }
        inner.unlock();
        taken
    }

    /// Returns a permit, waking the first waiter if any.
    pub fn signal(&self) {
        let mut inner = self.inner.lock();
        let waiter = inner.waiters.pop();
        if waiter.is_none() {
            inner.permits += 1;
        }
        inner.unlock();
        if let Some(waiter) = waiter {
            waiter.unpark();
        }
    }

    /// Number of available permits.
    pub fn permits(&self) -> usize {
        let inner = self.inner.lock();
        let permits = inner.permits;
        inner.unlock();
        permits
    }
}
