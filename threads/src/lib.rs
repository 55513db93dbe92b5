//! # Threads: blocking synchronization and timed sleep.
//!
//! This crate builds the blocking primitives of the kernel on top of the
//! thread substrate of the [`kernel`] crate. The only atomicity primitive it
//! relies on is disabling the timer interrupt; every primitive is written such
//! that no wake-up can get lost between checking a condition and blocking.
//!
//! ## Outline
//!
//! - [`Condition Variable`]: atomically releases a [`Lock`], blocks, and
//!   re-acquires the lock once woken.
//! - [`Alarm`]: puts threads to sleep until a deadline, woken by the timer
//!   interrupt.
//! - [`Communicator`]: a rendezvous channel that hands one value from exactly
//!   one speaker to exactly one listener.
//! - [`Round Robin Scheduler`]: a preemptive scheduler that switches threads
//!   after a fixed number of timer interrupts.
//!
//! Control flows downwards: the communicator is built on condition variables,
//! condition variables on the wait queue and the interrupt mask.
//!
//! [`Condition Variable`]: sync::condition
//! [`Alarm`]: alarm
//! [`Communicator`]: communicator
//! [`Round Robin Scheduler`]: round_robin
//! [`Lock`]: kernel::sync::Lock

#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod alarm;
pub mod communicator;
pub mod round_robin;
pub mod sync;

pub use alarm::Alarm;
pub use communicator::Communicator;
pub use round_robin::RoundRobin;
pub use sync::Condition;
