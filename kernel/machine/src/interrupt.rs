//! Interrupt flag, vector table, and interrupt delivery.
#[cfg(doc)]
use crate::spinlock::SpinLockGuard;
use crate::{Machine, Status, try_current};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::{cell::Cell, marker::PhantomData, sync::atomic::Ordering};

/// Number of entries in the interrupt vector table.
pub const NUM_VECTORS: usize = 256;

/// Interrupt vectors raised by the machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Vector {
    /// The periodic timer.
    Timer = 32,
    /// Deferred rescheduling request.
    ///
    /// Raised at the end of an interrupt window after an interrupt handler
    /// called [`request_reschedule`].
    Reschedule = 126,
}

/// Enumeration representing the interrupt state.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum InterruptState {
    /// Interrupts are enabled.
    On,
    /// Interrupts are disabled.
    Off,
}

impl InterruptState {
    /// Reads the current interrupt state.
    ///
    /// # Returns
    /// - [`InterruptState::On`] if interrupts are enabled, or no machine is
    ///   installed on this host thread.
    /// - [`InterruptState::Off`] if interrupts are disabled.
    pub fn current() -> Self {
        match try_current() {
            Some(m) if !m.status().contains(Status::INTERRUPTS) => Self::Off,
            _ => Self::On,
        }
    }

    /// Enables interrupts.
    ///
    /// Going from disabled to enabled opens an interrupt window: the clock
    /// advances and pending interrupts are delivered before this returns.
    pub fn enable() {
        if let Some(m) = try_current() {
            m.enable();
        }
    }

    /// Disables interrupts, returning the state before the call.
    pub fn disable() -> Self {
        match try_current() {
            Some(m) if !m.set(Status::INTERRUPTS, false) => Self::Off,
            _ => Self::On,
        }
    }

    /// Returns to `prior`, a state previously returned by [`disable`].
    ///
    /// [`disable`]: Self::disable
    pub fn restore(prior: Self) {
        if prior == Self::On {
            Self::enable();
        }
    }
}

/// An RAII-based guard for managing interrupt disabling.
///
/// When an `InterruptGuard` is created, interrupts are disabled. When it is
/// dropped, the interrupt state is restored to what it was before the guard was
/// created.
///
/// **Important:**
/// - [`InterruptGuard`] instances **must be dropped in reverse order of their
///   creation** to prevent unintended interrupt state changes.
/// - Every [`SpinLockGuard`] carries one, so holding a spinlock keeps
///   interrupts disabled.
///
/// This structure is created using [`InterruptGuard::new`].
pub struct InterruptGuard {
    prior: InterruptState,
    _not_send: PhantomData<*const ()>,
}

impl InterruptGuard {
    /// Creates a new `InterruptGuard`, disabling interrupts.
    ///
    /// # Example
    /// ```rust
    /// use machine::interrupt::InterruptGuard;
    ///
    /// let _guard = InterruptGuard::new(); // Disables interrupts
    /// // Critical section...
    /// // Interrupts are restored when `_guard` goes out of scope.
    /// ```
    pub fn new() -> Self {
        let prior = InterruptState::disable();
        std::sync::atomic::fence(Ordering::SeqCst);
        Self {
            prior,
            _not_send: PhantomData,
        }
    }

    /// Forgets the guard without restoring the interrupt state.
    ///
    /// Used by a thread that leaves the processor for good while interrupts
    /// are disabled; the thread that runs next owns the interrupt flag.
    pub fn consume(self) {
        std::mem::forget(self);
    }
}

impl Default for InterruptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        std::sync::atomic::fence(Ordering::SeqCst);
        InterruptState::restore(self.prior);
    }
}

/// Whether an interrupt handler is running.
pub fn in_handler() -> bool {
    try_current().is_some_and(|m| m.status().contains(Status::IN_HANDLER))
}

/// Asks the machine to raise [`Vector::Reschedule`] once the current interrupt
/// handler returns.
pub fn request_reschedule() {
    if let Some(m) = try_current() {
        m.set(Status::RESCHEDULE, true);
    }
}

/// Installs `handler` for `vector` on the current machine.
///
/// # Panics
/// Panics if no machine is installed.
pub fn register(vector: Vector, handler: fn()) {
    crate::current().vectors[u8::from(vector) as usize].store(Some(handler));
}

thread_local! {
    static DEFERRING: Cell<bool> = const { Cell::new(false) };
}

impl Machine {
    pub(crate) fn enable(&self) {
        if self.set(Status::INTERRUPTS, true) {
            return;
        }
        if self.is_halted() || std::thread::panicking() {
            return;
        }
        let now = self
            .clock
            .fetch_add(crate::timer::KERNEL_TICK, Ordering::SeqCst)
            + crate::timer::KERNEL_TICK;
        if now >= self.next_fire.load(Ordering::SeqCst) {
            self.fire();
        }
        self.run_deferred();
    }

    /// Delivers the timer interrupt with interrupts disabled.
    pub(crate) fn fire(&self) {
        struct Leave<'a> {
            machine: &'a Machine,
            interrupts: bool,
        }
        impl Drop for Leave<'_> {
            fn drop(&mut self) {
                self.machine.set(Status::IN_HANDLER, false);
                // Raw restore: the window that delivered us is still open.
                self.machine.set(Status::INTERRUPTS, self.interrupts);
            }
        }

        let interrupts = self.set(Status::INTERRUPTS, false);
        self.set(Status::IN_HANDLER, true);
        let _leave = Leave {
            machine: self,
            interrupts,
        };
        let period = self.next_period();
        self.next_fire
            .store(self.now() + period, Ordering::SeqCst);
        self.dispatch(Vector::Timer);
    }

    fn run_deferred(&self) {
        struct Reset;
        impl Drop for Reset {
            fn drop(&mut self) {
                let _ = DEFERRING.try_with(|d| d.set(false));
            }
        }

        if DEFERRING.try_with(|d| d.replace(true)).unwrap_or(true) {
            return;
        }
        let _reset = Reset;
        while self.status().contains(Status::INTERRUPTS)
            && !self.is_halted()
            && self.set(Status::RESCHEDULE, false)
        {
            self.dispatch(Vector::Reschedule);
        }
    }

    fn dispatch(&self, vector: Vector) {
        let no = u8::from(vector);
        match self.vectors[no as usize].load() {
            Some(handler) => handler(),
            None => panic!("Unknown interrupt #{no}"),
        }
    }
}
