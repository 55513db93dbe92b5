//! # Alarm: sleeping until a deadline.
//!
//! [`Alarm::wait_until`] suspends the calling thread for at least the given
//! number of ticks. The thread does not poll the clock: it records a sleep
//! entry (its deadline and a wake-up signal) and blocks on the signal. The
//! alarm's timer hook runs on every timer interrupt and signals every entry
//! whose deadline has passed.
//!
//! Entries are kept in a min-heap keyed by deadline, so a tick that finds no
//! expired entry only peeks at the earliest one, and expired entries are
//! removed by popping the minimum, never by mutating the heap while iterating
//! it. Entries with equal deadlines are released in the order they were
//! registered.
//!
//! Each alarm owns its registry. Sleepers of one alarm are never woken by the
//! tick of another one.
use kernel::{
    sync::{Semaphore, SpinLock, atomic::AtomicU64},
    thread::Current,
    timer::{self, TimerHook},
};
use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    sync::Arc,
};

type Registry = SpinLock<BinaryHeap<Reverse<SleepEntry>>>;

/// One outstanding [`Alarm::wait_until`].
struct SleepEntry {
    deadline: u64,
    seq: u64,
    signal: Arc<Semaphore>,
}

impl PartialEq for SleepEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SleepEntry {}

impl PartialOrd for SleepEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SleepEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// A deadline-ordered sleep facility driven by the timer interrupt.
pub struct Alarm {
    sleepers: Arc<Registry>,
    seq: AtomicU64,
    _hook: TimerHook,
}

impl Alarm {
    /// Creates an alarm and registers its tick handler with the timer.
    ///
    /// # Panics
    /// Panics if called outside of a kernel thread.
    pub fn new() -> Self {
        let sleepers: Arc<Registry> = Arc::new(SpinLock::new(BinaryHeap::new()));
        let registry = Arc::downgrade(&sleepers);
        let hook = timer::on_timer(move || {
            if let Some(sleepers) = registry.upgrade() {
                Self::tick(&sleepers);
            }
        });
        Self {
            sleepers,
            seq: AtomicU64::new(0),
            _hook: hook,
        }
    }

    /// Puts the current thread to sleep for at least `x` ticks.
    ///
    /// The thread is woken by the first timer interrupt at which the clock is
    /// past `now + x`. Returns immediately if `x <= 0`.
    pub fn wait_until(&self, x: i64) {
        if x <= 0 {
            return;
        }
        let signal = Arc::new(Semaphore::new(0));
        let mut sleepers = self.sleepers.lock();
        sleepers.push(Reverse(SleepEntry {
            deadline: timer::ticks().saturating_add(x as u64),
            seq: self.seq.fetch_add(1),
            signal: signal.clone(),
        }));
        timer::arm();
        sleepers.unlock();
        // A tick that fires before we block leaves its permit behind.
        signal.wait();
    }

    /// Number of threads sleeping on this alarm.
    pub fn pending(&self) -> usize {
        let sleepers = self.sleepers.lock();
        let n = sleepers.len();
        sleepers.unlock();
        n
    }

    /// The timer interrupt handler.
    fn tick(sleepers: &Registry) {
        let now = timer::ticks();
        let mut heap = sleepers.lock();
        let mut due = Vec::new();
        while heap
            .peek()
            .is_some_and(|Reverse(entry)| now > entry.deadline)
        {
            if let Some(Reverse(entry)) = heap.pop() {
                due.push(entry);
            }
        }
        heap.unlock();

        for entry in due {
            timer::disarm();
            entry.signal.signal();
        }
        Current::yield_now();
    }
}

impl Default for Alarm {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Alarm {
    fn drop(&mut self) {
        let mut sleepers = self.sleepers.lock();
        for _ in sleepers.drain() {
            timer::disarm();
        }
        sleepers.unlock();
    }
}
