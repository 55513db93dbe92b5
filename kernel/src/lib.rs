//! # Kernel: threads and the synchronization substrate.
//!
//! This crate runs a tiny kernel on the simulated uniprocessor of the
//! [`machine`] crate. It provides everything that the synchronization
//! primitives of the `threads` crate consume:
//!
//! - **Threads** ([`thread`]): creation, joining, parking and yielding. At any
//!   given time **exactly one** kernel thread runs on the processor. The other
//!   threads are either waiting in the scheduler's run queue or parked on some
//!   wait queue.
//! - **Scheduling** ([`thread::scheduler::Scheduler`]): the policy that picks
//!   the next thread. The kernel ships a non-preemptive FIFO policy; a
//!   preemptive policy only needs to implement [`Scheduler::timer_tick`].
//! - **Interrupts** ([`interrupt`]): the interrupt flag is the only atomicity
//!   primitive. A thread with interrupts disabled is never switched away from
//!   unless it explicitly parks or yields.
//! - **Timer** ([`timer`]): the tick clock and periodic timer callbacks.
//! - **Synchronization** ([`sync`]): spinlocks, the blocking [`sync::Lock`],
//!   [`sync::Semaphore`] and the [`sync::WaitQueue`] abstraction.
//!
//! ## Booting
//!
//! A kernel is booted with [`SystemConfigurationBuilder::start`], which creates
//! a fresh machine, runs the given function as the `main` kernel thread, and
//! returns the exit code of `main` once it exits. When every thread is blocked
//! and no timer can ever wake one up, the kernel reports
//! [`KernelError::Deadlock`] instead of hanging.
//!
//! ```rust
//! use kernel::{SystemConfigurationBuilder, thread::ThreadBuilder};
//!
//! let code = SystemConfigurationBuilder::new()
//!     .start(|| {
//!         let handle = ThreadBuilder::new("child").spawn(|| ());
//!         assert_eq!(handle.join(), 0);
//!     });
//! assert_eq!(code, Ok(0));
//! ```
//!
//! ## Testing
//!
//! Graders describe test cases as plain functions and hand them to a
//! [`TestDriver`]. Each case boots its own kernel, so a failing case can not
//! corrupt the following ones. The driver honors the following environment:
//!
//! - `GRADER_SEED`: seed for the randomized timer. Different seeds produce
//!   different, but reproducible, interleavings.
//! - `GRADER_VERBOSE`: print kernel log messages.
//!
//! Command line arguments select test cases by name:
//!
//! ```bash
//! $ cargo run -- condition::no_lost_wakeup alarm::isolation
//! ```

#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod interrupt;
pub mod sync;
pub mod thread;
pub mod timer;

pub use machine::{debug, info, print, println, warning};

use std::sync::atomic::Ordering;
use thread::scheduler::{Fifo, Scheduler};

/// Enum representing errors that can occur during a kernel operation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum KernelError {
    /// No thread can make progress. (EDEADLK)
    Deadlock,
    /// Device or resource busy. (EBUSY)
    Busy,
    /// Invalid arguement. (EINVAL)
    InvalidArgument,
}

/// Seed of the randomized timer used by [`TestDriver`] when `GRADER_SEED` is
/// not set.
pub const DEFAULT_GRADER_SEED: u64 = 0x5eed_cafe;

/// A builder for system configuration settings.
///
/// The [`SystemConfigurationBuilder`] struct provides an interface for
/// configuring the system-wide settings of a kernel before booting it with
/// [`SystemConfigurationBuilder::start`].
pub struct SystemConfigurationBuilder {
    scheduler: Option<Box<dyn Scheduler>>,
    timer_seed: Option<u64>,
    quiet: bool,
}

impl Default for SystemConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemConfigurationBuilder {
    /// Creates a configuration with the FIFO scheduler, a fixed timer period
    /// and logging enabled.
    pub fn new() -> Self {
        Self {
            scheduler: None,
            timer_seed: None,
            quiet: false,
        }
    }

    /// Sets the system-wide scheduler.
    ///
    /// This function replaces the default FIFO scheduler with a custom
    /// scheduler implementation.
    pub fn set_scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Box::new(scheduler));
        self
    }

    /// Randomizes the timer period with `seed`.
    pub fn set_timer_seed(mut self, seed: u64) -> Self {
        self.timer_seed = Some(seed);
        self
    }

    /// Silences the kernel log messages.
    pub fn set_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Boots a fresh kernel that runs `main` as its main thread.
    ///
    /// Returns the exit code of `main` once it exits. All the other threads
    /// are torn down at that point.
    ///
    /// # Errors
    /// - [`KernelError::Busy`] if the calling host thread already runs a
    ///   kernel.
    /// - [`KernelError::Deadlock`] if every thread got blocked forever before
    ///   `main` exited.
    pub fn start<F>(self, main: F) -> Result<i32, KernelError>
    where
        F: FnOnce() + Send + 'static,
    {
        machine::QUIET.store(self.quiet, Ordering::SeqCst);
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Box::new(Fifo::default()));
        thread::scheduler::boot(scheduler, self.timer_seed, main)
    }
}

// Test utilities
#[doc(hidden)]
pub trait TestCase
where
    Self: Sync + Send,
{
    fn name(&'static self) -> &'static str;
    fn run(&'static self, config: SystemConfigurationBuilder) -> bool;
}

impl<T> TestCase for T
where
    T: Fn() + Send + Sync + 'static,
{
    fn name(&'static self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn run(&'static self, config: SystemConfigurationBuilder) -> bool {
        print!("test {} ... ", std::any::type_name::<T>());
        match config.start(move || self()) {
            Ok(0) => {
                println!("ok");
                true
            }
            Ok(code) => {
                println!("FAILED (exit code {code})");
                false
            }
            Err(e) => {
                println!("FAILED ({e:?})");
                false
            }
        }
    }
}

#[doc(hidden)]
pub fn grader_seed() -> u64 {
    std::env::var("GRADER_SEED")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_GRADER_SEED)
}

/// A driver for running tests.
pub struct TestDriver<S: Scheduler + Default + 'static> {
    _s: std::marker::PhantomData<S>,
}

impl<S: Scheduler + Default + 'static> TestDriver<S> {
    /// Run the given tests, each on a freshly booted kernel scheduled by `S`.
    ///
    /// Returns whether every selected test passed.
    pub fn start<const TC: usize>(tests: [&'static dyn TestCase; TC]) -> bool {
        let filter = std::env::args()
            .skip(1)
            .filter(|arg| !arg.starts_with('-'))
            .collect::<std::collections::BTreeSet<_>>();
        let tests = tests
            .into_iter()
            .filter(|test| {
                if filter.is_empty() {
                    return true;
                }
                let name = test.name();
                let r = name.split("::").next().map(|n| n.len() + 2).unwrap_or(0);
                filter.contains(name.get(r..).unwrap_or(name))
            })
            .collect::<Vec<_>>();
        let (total, mut succ) = (tests.len(), 0);
        let seed = grader_seed();
        let quiet = std::env::var_os("GRADER_VERBOSE").is_none();
        println!(
            "Running {} test{} (scheduler: {}, seed: {})",
            total,
            if total == 1 { "" } else { "s" },
            std::any::type_name::<S>()
                .rsplit("::")
                .next()
                .unwrap_or_default(),
            seed
        );

        for test in tests {
            let config = SystemConfigurationBuilder::new()
                .set_scheduler(S::default())
                .set_timer_seed(seed)
                .set_quiet(quiet);
            if test.run(config) {
                succ += 1;
            }
        }
        println!(
            "test result: {}. {} passed; {} failed",
            if total == succ { "ok" } else { "FAILED" },
            succ,
            total - succ
        );
        total == succ
    }
}
