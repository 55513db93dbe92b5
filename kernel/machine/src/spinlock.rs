//! Interrupt-disabling spinlock.

use crate::interrupt::InterruptGuard;
use std::{
    cell::{Cell, UnsafeCell},
    marker::PhantomData,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

thread_local! {
    static HELD: Cell<usize> = const { Cell::new(0) };
}

/// Number of spinlocks held by the current host thread.
///
/// A thread must not leave the processor while this is non-zero.
pub fn held() -> usize {
    HELD.try_with(Cell::get).unwrap_or(0)
}

fn adjust_held(acquired: bool) {
    let _ = HELD.try_with(|h| {
        if acquired {
            h.set(h.get() + 1)
        } else {
            h.set(h.get().saturating_sub(1))
        }
    });
}

/// The lock could not be acquired at this time because the operation would
/// otherwise block.
#[derive(Debug)]
pub struct WouldBlock;

/// A mutual exclusion primitive useful for protecting shared data
///
/// The data can only be accessed through the guards returned from [`lock`]
/// and [`try_lock`]. Acquiring the lock disables interrupts until the guard is
/// unlocked, so the protected section is never interrupted by the timer.
///
/// [`lock`]: Self::lock
/// [`try_lock`]: Self::try_lock
///
/// # Examples
///
/// ```
/// use machine::spinlock::SpinLock;
///
/// let data = SpinLock::new(0);
/// let mut guard = data.lock();
/// *guard += 1;
/// // the lock must be "explicitly" unlocked before `guard` goes out of scope.
/// guard.unlock();
/// ```
pub struct SpinLock<T: ?Sized> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates a new spinlock in an unlocked state ready for use.
    #[inline]
    pub const fn new(t: T) -> SpinLock<T> {
        SpinLock {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(t),
        }
    }

    /// Consumes this spinlock, returning the underlying data.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> SpinLock<T> {
    /// Acquires a spinlock, spinning until it is able to do so.
    ///
    /// Upon returning, the thread is the only thread with the lock held and
    /// interrupts are disabled. When the guard goes out of scope without
    /// [`SpinLockGuard::unlock`], panic occurs.
    ///
    /// Locking a spinlock in the thread which already holds it never returns.
    #[track_caller]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let guard = loop {
            let guard = InterruptGuard::new();

            std::hint::spin_loop();
            if !self.locked.fetch_or(true, Ordering::SeqCst) {
                break guard;
            }

            drop(guard);
        };
        adjust_held(true);

        SpinLockGuard {
            caller: std::panic::Location::caller(),
            lock: self,
            guard: Some(guard),
            _not_send: PhantomData,
        }
    }

    /// Attempts to acquire this lock.
    ///
    /// This function does not block.
    ///
    /// # Errors
    ///
    /// If the spinlock could not be acquired because it is already locked, then
    /// this call will return the [`WouldBlock`] error.
    #[track_caller]
    pub fn try_lock(&self) -> Result<SpinLockGuard<'_, T>, WouldBlock> {
        let guard = InterruptGuard::new();
        if self.locked.fetch_or(true, Ordering::SeqCst) {
            return Err(WouldBlock);
        }
        adjust_held(true);
        Ok(SpinLockGuard {
            caller: std::panic::Location::caller(),
            lock: self,
            guard: Some(guard),
            _not_send: PhantomData,
        })
    }
}

impl<T: Default> Default for SpinLock<T> {
    /// Creates a `SpinLock<T>`, with the `Default` value for T.
    fn default() -> SpinLock<T> {
        SpinLock::new(Default::default())
    }
}

/// An implementation of a "scoped lock" of a spinlock. When this structure
/// is dropped (falls out of scope) without unlock, panic occurs.
///
/// The lock must be explicitly unlocked by [`unlock`] method.
///
/// [`unlock`]: Self::unlock
pub struct SpinLockGuard<'a, T: ?Sized + 'a> {
    caller: &'static std::panic::Location<'static>,
    lock: &'a SpinLock<T>,
    guard: Option<InterruptGuard>,
    _not_send: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync> Sync for SpinLockGuard<'_, T> {}

impl<T: ?Sized> SpinLockGuard<'_, T> {
    /// Releases the underlying [`SpinLock`] and restores the interrupt state
    /// saved by [`SpinLock::lock`].
    pub fn unlock(mut self) {
        self.release();
        std::mem::forget(self);
    }

    fn release(&mut self) {
        self.lock.locked.store(false, Ordering::SeqCst);
        adjust_held(false);
        self.guard.take();
    }
}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // Unwinding threads drop their guards on the way out.
        self.release();
        if !std::thread::panicking() {
            panic!(
                "`.unlock()` must be explicitly called before dropping SpinLockGuard.
The lock is held at {:?}.",
                self.caller
            );
        }
    }
}
