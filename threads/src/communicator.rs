//! # Communicator: a rendezvous channel.
//!
//! A [`Communicator`] hands values from speakers to listeners without any
//! buffering. [`Communicator::speak`] blocks until exactly one listener took
//! its value, and [`Communicator::listen`] blocks until exactly one speaker
//! handed it a value. Every value is delivered to exactly one listener.
//!
//! ## The handshake
//!
//! The channel owns a single slot and transfers one value at a time. A
//! transfer is a two-phase handshake, all under the communicator's lock:
//!
//! 1. **Match.** A speaker waits until a listener is pending and no other
//!    transfer is in flight. It then claims one pending listener, puts its
//!    value into the slot, and wakes a listener.
//! 2. **Acknowledge.** A listener takes the value out of the slot and wakes the
//!    speaker, which waits until the slot is empty before returning.
//!
//! While a transfer is in flight no other speaker may touch the slot, so a
//! value is never overwritten before it is read. Which of the pending
//! listeners receives a value, and which of the pending speakers is matched
//! first, is not specified.
use crate::sync::Condition;
use kernel::sync::{Lock, SpinLock};
use std::sync::Arc;

struct State<T> {
    /// Listeners not yet claimed by a speaker.
    listeners: usize,
    /// Speakers not yet matched with a listener.
    speakers: usize,
    in_transfer: bool,
    slot: Option<T>,
}

/// A synchronous, one-value-at-a-time rendezvous channel.
///
/// # Examples
///
/// ```rust,ignore
/// let comm = Arc::new(Communicator::new());
/// let speaker = {
///     let comm = comm.clone();
///     ThreadBuilder::new("speaker").spawn(move || comm.speak(4))
/// };
/// assert_eq!(comm.listen(), 4);
/// speaker.join();
/// ```
pub struct Communicator<T: Send> {
    lock: Arc<Lock>,
    /// Speakers waiting for a listener, or for the slot.
    speakers: Condition,
    /// Listeners waiting for a value.
    listeners: Condition,
    /// The speaker in transfer, waiting for its value to be taken.
    ack: Condition,
    /// Only accessed with `lock` held.
    state: SpinLock<State<T>>,
}

impl<T: Send> Default for Communicator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Communicator<T> {
    /// Creates a communicator without pending speakers or listeners.
    pub fn new() -> Self {
        let lock = Arc::new(Lock::new());
        Self {
            speakers: Condition::new(lock.clone()),
            listeners: Condition::new(lock.clone()),
            ack: Condition::new(lock.clone()),
            lock,
            state: SpinLock::new(State {
                listeners: 0,
                speakers: 0,
                in_transfer: false,
                slot: None,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State<T>) -> R) -> R {
        let mut state = self.state.lock();
        let r = f(&mut state);
        state.unlock();
        r
    }

    /// Hands `word` to exactly one listener.
    ///
    /// Blocks until a listener has taken the value.
    pub fn speak(&self, word: T) {
        self.lock.acquire();
        self.with_state(|s| s.speakers += 1);
        while self.with_state(|s| s.in_transfer || s.listeners == 0) {
            self.speakers.sleep();
        }
        self.with_state(|s| {
            s.listeners -= 1;
            s.speakers -= 1;
            s.in_transfer = true;
            s.slot = Some(word);
        });
        self.listeners.wake();
        while self.with_state(|s| s.slot.is_some()) {
            self.ack.sleep();
        }
        self.with_state(|s| s.in_transfer = false);
        // The slot is free for the next speaker.
        self.speakers.wake();
        self.lock.release();
    }

    /// Receives the value of exactly one speaker.
    ///
    /// Blocks until a speaker has handed over its value.
    pub fn listen(&self) -> T {
        self.lock.acquire();
        self.with_state(|s| s.listeners += 1);
        self.speakers.wake();
        let word = loop {
            if let Some(word) = self.with_state(|s| s.slot.take()) {
                break word;
            }
            self.listeners.sleep();
        };
        self.ack.wake();
        self.lock.release();
        word
    }

    /// Number of speakers waiting for a listener.
    pub fn pending_speakers(&self) -> usize {
        self.with_state(|s| s.speakers)
    }

    /// Number of listeners waiting for a speaker.
    pub fn pending_listeners(&self) -> usize {
        self.with_state(|s| s.listeners)
    }
}
