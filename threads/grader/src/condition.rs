use grading::{assert_exit_code, repeat, settle, wait_for};
use kernel::{
    sync::{
        FifoQueue, Lock, SpinLock,
        atomic::{AtomicBool, AtomicUsize},
    },
    thread::{ThreadBuilder, ThreadState, get_state_by_tid},
};
use std::{collections::VecDeque, sync::Arc};
use threads::sync::Condition;

struct Shared {
    lock: Arc<Lock>,
    cond: Condition,
    flag: AtomicBool,
}

impl Shared {
    fn new() -> Arc<Self> {
        let lock = Arc::new(Lock::new());
        Arc::new(Self {
            cond: Condition::new(lock.clone()),
            lock,
            flag: AtomicBool::new(false),
        })
    }

    fn wait_flag(&self) {
        self.lock.acquire();
        while !self.flag.load() {
            self.cond.sleep();
        }
        self.lock.release();
    }

    fn set_flag(&self) -> bool {
        self.lock.acquire();
        self.flag.store(true);
        let woken = self.cond.wake();
        self.lock.release();
        woken
    }
}

/// A sleeper that is already asleep is woken by a single `wake`.
#[repeat(20)]
pub fn no_lost_wakeup() {
    let shared = Shared::new();
    let sleeper = {
        let shared = shared.clone();
        ThreadBuilder::new("sleeper").spawn(move || shared.wait_flag())
    };
    wait_for("the sleeper to sleep", || shared.cond.waiting() == 1);
    assert!(shared.set_flag());
    assert_eq!(sleeper.join(), 0);
    assert_eq!(shared.cond.waiting(), 0);
}

/// A waker that runs first leaves nobody to wake, and the sleeper never
/// sleeps.
#[repeat(20)]
pub fn wake_before_sleep() {
    let shared = Shared::new();
    let waker = {
        let shared = shared.clone();
        ThreadBuilder::new("waker").spawn(move || {
            assert!(!shared.set_flag());
        })
    };
    assert_eq!(waker.join(), 0);
    shared.wait_flag();
    assert_eq!(shared.cond.waiting(), 0);
}

/// Two threads take strict turns.
pub fn ping_pong() {
    const ROUNDS: usize = 100;
    let lock = Arc::new(Lock::new());
    let state = Arc::new((
        Condition::<FifoQueue>::new(lock.clone()),
        AtomicUsize::new(0),
        SpinLock::new(Vec::new()),
    ));

    let players = (0..2)
        .map(|me| {
            let (lock, state) = (lock.clone(), state.clone());
            ThreadBuilder::new(format!("player{me}")).spawn(move || {
                let (cond, turn, log) = &*state;
                for _ in 0..ROUNDS {
                    lock.acquire();
                    while turn.load() != me {
                        cond.sleep();
                    }
                    let mut log = log.lock();
                    log.push(me);
                    log.unlock();
                    turn.store(1 - me);
                    cond.wake();
                    lock.release();
                }
            })
        })
        .collect::<Vec<_>>();

    for player in players {
        assert_eq!(player.join(), 0);
    }
    let (_, _, log) = &*state;
    let log = log.lock();
    let turns = log.clone();
    log.unlock();
    assert_eq!(turns.len(), 2 * ROUNDS);
    assert!(
        turns.iter().enumerate().all(|(i, who)| *who == i % 2),
        "Players did not alternate: {turns:?}"
    );
}

pub fn wake_on_empty() {
    let shared = Shared::new();
    shared.lock.acquire();
    assert!(!shared.cond.wake());
    assert_eq!(shared.cond.wake_all(), 0);
    shared.lock.release();
}

pub fn wake_all_wakes_every_sleeper() {
    const SLEEPERS: usize = 8;
    let shared = Shared::new();
    let sleepers = (0..SLEEPERS)
        .map(|i| {
            let shared = shared.clone();
            ThreadBuilder::new(format!("sleeper{i}")).spawn(move || shared.wait_flag())
        })
        .collect::<Vec<_>>();

    wait_for("every sleeper to sleep", || {
        shared.cond.waiting() == SLEEPERS
    });
    shared.lock.acquire();
    shared.flag.store(true);
    assert_eq!(shared.cond.wake_all(), SLEEPERS);
    assert_eq!(shared.cond.waiting(), 0);
    shared.lock.release();

    for sleeper in sleepers {
        assert_eq!(sleeper.join(), 0);
    }
}

/// A thread that starts sleeping after `wake_all` returned stays asleep.
///
/// `wake_all` detaches the whole wait queue at once, and a sleeper can only
/// enqueue itself while holding the lock, so no thread joins a batch that is
/// being woken.
pub fn wake_all_leaves_later_sleepers() {
    const SLEEPERS: usize = 4;
    let lock = Arc::new(Lock::new());
    let state = Arc::new((
        Condition::<FifoQueue>::new(lock.clone()),
        AtomicUsize::new(0),
    ));
    let sleep_once = {
        let (lock, state) = (lock.clone(), state.clone());
        move || {
            let (cond, woken) = &*state;
            lock.acquire();
            cond.sleep();
            woken.fetch_add(1);
            lock.release();
        }
    };

    let sleepers = (0..SLEEPERS)
        .map(|i| ThreadBuilder::new(format!("sleeper{i}")).spawn(sleep_once.clone()))
        .collect::<Vec<_>>();
    let (cond, woken) = &*state;
    wait_for("every sleeper to sleep", || cond.waiting() == SLEEPERS);

    lock.acquire();
    assert_eq!(cond.wake_all(), SLEEPERS);
    lock.release();
    for sleeper in sleepers {
        assert_eq!(sleeper.join(), 0);
    }
    assert_eq!(woken.load(), SLEEPERS);

    let late = ThreadBuilder::new("late").spawn(sleep_once);
    wait_for("the late sleeper to sleep", || cond.waiting() == 1);
    settle(10);
    assert_eq!(get_state_by_tid(late.tid), Ok(ThreadState::Parked));
    assert_eq!(woken.load(), SLEEPERS);

    lock.acquire();
    assert!(cond.wake());
    lock.release();
    assert_eq!(late.join(), 0);
    assert_eq!(woken.load(), SLEEPERS + 1);
}

const CAPACITY: usize = 2;
const ITEMS: usize = 100;

struct Buffer {
    lock: Arc<Lock>,
    not_full: Condition,
    not_empty: Condition,
    /// Only accessed with `lock` held.
    items: SpinLock<VecDeque<usize>>,
}

impl Buffer {
    fn len(&self) -> usize {
        let items = self.items.lock();
        let n = items.len();
        items.unlock();
        n
    }

    fn put(&self, val: usize) {
        self.lock.acquire();
        while self.len() == CAPACITY {
            self.not_full.sleep();
        }
        let mut items = self.items.lock();
        items.push_back(val);
        items.unlock();
        self.not_empty.wake();
        self.lock.release();
    }

    fn get(&self) -> usize {
        self.lock.acquire();
        while self.len() == 0 {
            self.not_empty.sleep();
        }
        let mut items = self.items.lock();
        let val = items.pop_front();
        items.unlock();
        self.not_full.wake();
        self.lock.release();
        val.unwrap_or_else(|| panic!("Buffer is empty after waiting."))
    }
}

pub fn bounded_buffer() {
    const PRODUCERS: usize = 2;
    const CONSUMERS: usize = 2;
    let lock = Arc::new(Lock::new());
    let buffer = Arc::new(Buffer {
        not_full: Condition::new(lock.clone()),
        not_empty: Condition::new(lock.clone()),
        lock,
        items: SpinLock::new(VecDeque::new()),
    });
    let output = Arc::new(SpinLock::new(Vec::new()));

    let consumers = (0..CONSUMERS)
        .map(|i| {
            let (buffer, output) = (buffer.clone(), output.clone());
            ThreadBuilder::new(format!("consumer{i}")).spawn(move || {
                for _ in 0..ITEMS / CONSUMERS {
                    let val = buffer.get();
                    let mut output = output.lock();
                    output.push(val);
                    output.unlock();
                }
            })
        })
        .collect::<Vec<_>>();
    let producers = (0..PRODUCERS)
        .map(|i| {
            let buffer = buffer.clone();
            ThreadBuilder::new(format!("producer{i}")).spawn(move || {
                for val in (i..ITEMS).step_by(PRODUCERS) {
                    buffer.put(val);
                }
            })
        })
        .collect::<Vec<_>>();

    for handle in producers.into_iter().chain(consumers) {
        assert_eq!(handle.join(), 0);
    }
    let mut output = output.lock();
    let mut consumed = std::mem::take(&mut *output);
    output.unlock();
    consumed.sort_unstable();
    assert_eq!(consumed, (0..ITEMS).collect::<Vec<_>>());
    assert_eq!(buffer.len(), 0);
}

#[assert_exit_code(-1)]
pub fn sleep_without_lock() {
    let cond: Condition = Condition::new(Arc::new(Lock::new()));
    cond.sleep();
}

#[assert_exit_code(-1)]
pub fn wake_without_lock() {
    let cond: Condition = Condition::new(Arc::new(Lock::new()));
    cond.wake();
}

#[assert_exit_code(-1)]
pub fn wake_all_without_lock() {
    let lock = Arc::new(Lock::new());
    let cond: Condition = Condition::new(lock.clone());
    let holder = {
        let lock = lock.clone();
        ThreadBuilder::new("holder").spawn(move || lock.acquire())
    };
    assert_eq!(holder.join(), 0);
    // Held, but by another thread.
    cond.wake_all();
}
