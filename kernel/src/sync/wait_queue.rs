//! Wait queue: the ordering policy of blocked threads.
use crate::thread::ParkHandle;
use std::collections::VecDeque;

/// An ordered holding area for threads blocked on one event.
///
/// The queue decides which blocked thread is released first. It is always
/// accessed under the lock of the primitive that owns it.
pub trait WaitQueue: Default + Send {
    /// Records a blocked thread.
    fn push(&mut self, handle: ParkHandle);

    /// Removes the next thread to release.
    fn pop(&mut self) -> Option<ParkHandle>;

    /// Number of recorded threads.
    fn len(&self) -> usize;

    /// Whether no thread is recorded.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// First-blocked-first-released.
#[derive(Default)]
pub struct FifoQueue(VecDeque<ParkHandle>);

impl WaitQueue for FifoQueue {
    fn push(&mut self, handle: ParkHandle) {
        self.0.push_back(handle);
    }

    fn pop(&mut self) -> Option<ParkHandle> {
        self.0.pop_front()
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}
