//! Interrupt management.
//!
//! Kernel code disables interrupts with an [`InterruptGuard`] to build short
//! critical sections; on a uniprocessor this is enough to keep every other
//! thread and the timer handler away. The guard restores exactly the state it
//! saved, so guards nest freely as long as they are dropped in reverse order.
use crate::{thread::Current, timer};
pub use machine::interrupt::{InterruptGuard, InterruptState, Vector, in_handler};

/// Register the interrupt handler for `vector`.
pub fn register(vector: Vector, handler: fn()) {
    machine::interrupt::register(vector, handler);
}

/// Install the kernel's interrupt handlers on the current machine.
pub(crate) fn init() {
    register(Vector::Timer, timer::dispatch);
    register(Vector::Reschedule, Current::yield_now);
}
