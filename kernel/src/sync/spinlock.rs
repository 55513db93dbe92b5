//! Uniprocessor spinlock.
//!
//! On a uniprocessor a spinlock is simple; it just requires preventing
//! preemption of the lock holder. Acquiring a [`SpinLock`] therefore disables
//! interrupts, and releasing it restores the interrupt state saved at
//! acquisition. While the lock is held, no other thread can be scheduled, so
//! no other thread can touch the protected data.
//!
//! The guard must be released **explicitly** with [`SpinLockGuard::unlock`];
//! dropping a guard is a bug and panics. A thread must never park or yield
//! while holding a spinlock.
pub use machine::spinlock::{SpinLock, SpinLockGuard, WouldBlock};
