//! # Machine: the hardware underneath the kernel.
//!
//! The kernel runs on a simulated uniprocessor. The machine provides the
//! pieces of hardware the kernel depends on and nothing more:
//!
//! - a single **interrupt flag** ([`interrupt::InterruptState`]) which is the
//!   only atomicity primitive available to kernel code,
//! - a **clock** counting ticks ([`timer::now`]),
//! - a programmable **timer** that periodically raises
//!   [`interrupt::Vector::Timer`],
//! - an **interrupt vector table** ([`interrupt::register`]),
//! - a **console** ([`print!`], [`info!`], ...).
//!
//! ## Time
//!
//! Time does not flow on its own. Each time the interrupt flag goes from
//! disabled to enabled the machine opens an *interrupt window*: the clock
//! advances by [`timer::KERNEL_TICK`] ticks and a due timer interrupt is
//! delivered. Code that runs with interrupts disabled therefore executes in
//! zero simulated time, and code that never enables interrupts is never
//! interrupted.
//!
//! The timer fires every [`timer::TIMER_PERIOD`] ticks. A machine created with
//! a seed draws each period at random instead, which yields a different but
//! reproducible interleaving of kernel threads for every seed.
//!
//! ## Installation
//!
//! A [`Machine`] is shared by every host thread that executes on it. Each such
//! host thread must [`install`] the machine before touching the interrupt
//! flag. Host threads without a machine see interrupts as always enabled and
//! never observe a timer interrupt, which makes [`spinlock::SpinLock`] usable
//! outside of a kernel as well.

#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod interrupt;
pub mod kprint;
pub mod spinlock;
pub mod timer;

use crossbeam_utils::atomic::AtomicCell;
use rand::{SeedableRng, rngs::StdRng};
use spinlock::SpinLock;
use std::{
    cell::RefCell,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering},
    },
};

/// Suppress the [`info!`], [`warning!`] and [`debug!`] output.
pub static QUIET: AtomicBool = AtomicBool::new(false);

bitflags::bitflags! {
    /// Status bits of the processor.
    pub struct Status: u32 {
        /// The timer interrupt can be delivered.
        const INTERRUPTS = 1 << 0;
        /// An interrupt handler is running.
        const IN_HANDLER = 1 << 1;
        /// A handler asked the interrupted thread to give up the processor.
        const RESCHEDULE = 1 << 2;
        /// The machine is powered off.
        const HALTED = 1 << 3;
    }
}

/// A simulated uniprocessor.
pub struct Machine {
    status: AtomicU32,
    clock: AtomicU64,
    next_fire: AtomicU64,
    armed: AtomicUsize,
    vectors: [AtomicCell<Option<fn()>>; interrupt::NUM_VECTORS],
    rng: SpinLock<Option<StdRng>>,
}

impl Machine {
    /// Creates a powered-on machine with interrupts disabled.
    ///
    /// With `seed`, every timer period is drawn at random from a generator
    /// seeded with it. Otherwise the timer fires exactly every
    /// [`timer::TIMER_PERIOD`] ticks.
    pub fn new(seed: Option<u64>) -> Arc<Self> {
        let machine = Arc::new(Self {
            status: AtomicU32::new(Status::empty().bits()),
            clock: AtomicU64::new(0),
            next_fire: AtomicU64::new(0),
            armed: AtomicUsize::new(0),
            vectors: [const { AtomicCell::new(None) }; interrupt::NUM_VECTORS],
            rng: SpinLock::new(seed.map(StdRng::seed_from_u64)),
        });
        let first = machine.next_period();
        machine.next_fire.store(first, Ordering::SeqCst);
        machine
    }

    /// Reads the status bits.
    pub fn status(&self) -> Status {
        Status::from_bits_truncate(self.status.load(Ordering::SeqCst))
    }

    /// Sets or clears `flag`, returning whether it was set before.
    pub(crate) fn set(&self, flag: Status, on: bool) -> bool {
        let prev = if on {
            self.status.fetch_or(flag.bits(), Ordering::SeqCst)
        } else {
            self.status.fetch_and(!flag.bits(), Ordering::SeqCst)
        };
        Status::from_bits_truncate(prev).contains(flag)
    }

    /// Powers off the machine.
    ///
    /// Interrupt windows of a halted machine neither advance the clock nor
    /// deliver interrupts.
    pub fn halt(&self) {
        self.set(Status::HALTED, true);
    }

    /// Whether the machine has been powered off.
    pub fn is_halted(&self) -> bool {
        self.status().contains(Status::HALTED)
    }

    /// Current value of the clock.
    pub fn now(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }
}

thread_local! {
    static MACHINE: RefCell<Option<Arc<Machine>>> = const { RefCell::new(None) };
}

/// Installs `machine` on the current host thread, returning the machine that
/// was installed before.
pub fn install(machine: Arc<Machine>) -> Option<Arc<Machine>> {
    MACHINE.with(|m| m.borrow_mut().replace(machine))
}

/// Removes the machine installed on the current host thread.
pub fn uninstall() -> Option<Arc<Machine>> {
    MACHINE.try_with(|m| m.borrow_mut().take()).ok().flatten()
}

/// The machine installed on the current host thread, if any.
pub fn try_current() -> Option<Arc<Machine>> {
    MACHINE.try_with(|m| m.borrow().clone()).ok().flatten()
}

/// The machine installed on the current host thread.
///
/// # Panics
/// Panics if no machine is installed.
pub fn current() -> Arc<Machine> {
    try_current().unwrap_or_else(|| panic!("No machine is installed on this thread."))
}
