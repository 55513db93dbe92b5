//! Synchronization primitives built on the kernel's thread substrate.
pub mod condition;

pub use condition::Condition;
pub use kernel::sync::{FifoQueue, Lock, WaitQueue};
