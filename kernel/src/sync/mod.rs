//! Synchronization primitives.
//!
//! - [`SpinLock`]: short, non-blocking critical sections. Interrupts are
//!   disabled while the lock is held.
//! - [`Lock`]: a blocking mutual-exclusion lock owned by a thread.
//! - [`Semaphore`]: a counting semaphore.
//! - [`WaitQueue`]: the ordering policy of blocked threads.
//! - [`atomic`]: sequentially consistent atomic types.
pub mod atomic;
pub mod lock;
pub mod semaphore;
pub mod spinlock;
pub mod wait_queue;

pub use lock::Lock;
pub use semaphore::Semaphore;
pub use spinlock::{SpinLock, SpinLockGuard, WouldBlock};
pub use wait_queue::{FifoQueue, WaitQueue};
