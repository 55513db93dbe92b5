//! Tests of the kernel substrate the primitives are built on.
use grading::{assert_exit_code, settle, wait_for};
use kernel::{
    KernelError, SystemConfigurationBuilder,
    sync::{
        Lock, Semaphore,
        atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize},
    },
    thread::{Current, ThreadBuilder, ThreadState, get_state_by_tid},
};
use std::sync::Arc;

fn is_parked(tid: u64) -> bool {
    get_state_by_tid(tid) == Ok(ThreadState::Parked)
}

/// Threads that yield inside the critical section never lose an update.
pub fn lock_mutual_exclusion() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 50;
    let lock = Arc::new(Lock::new());
    let counter = Arc::new(AtomicUsize::new(0));

    let handles = (0..THREADS)
        .map(|i| {
            let (lock, counter) = (lock.clone(), counter.clone());
            ThreadBuilder::new(format!("incr{i}")).spawn(move || {
                for _ in 0..ROUNDS {
                    lock.acquire();
                    let v = counter.load();
                    // Give every other thread the chance to break in.
                    Current::yield_now();
                    counter.store(v + 1);
                    lock.release();
                }
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.join(), 0);
    }
    assert_eq!(counter.load(), THREADS * ROUNDS);
}

pub fn lock_parks_waiter() {
    let lock = Arc::new(Lock::new());
    lock.acquire();

    let blockee = {
        let lock = lock.clone();
        ThreadBuilder::new("blockee").spawn(move || {
            lock.acquire();
            assert!(lock.is_held_by_current_thread());
            lock.release();
        })
    };
    wait_for("the blockee to park", || is_parked(blockee.tid));
    assert!(lock.is_held_by_current_thread());

    lock.release();
    assert!(!lock.is_held_by_current_thread());
    assert_eq!(blockee.join(), 0);
}

#[assert_exit_code(-1)]
pub fn lock_release_without_holding() {
    Lock::new().release();
}

#[assert_exit_code(-1)]
pub fn lock_acquire_twice() {
    let lock = Lock::new();
    lock.acquire();
    lock.acquire();
}

pub fn semaphore_blocks() {
    let sema = Arc::new(Semaphore::new(0));
    let passed = Arc::new(AtomicBool::new(false));

    let waiter = {
        let (sema, passed) = (sema.clone(), passed.clone());
        ThreadBuilder::new("waiter").spawn(move || {
            sema.wait();
            passed.store(true);
        })
    };
    wait_for("the waiter to park", || is_parked(waiter.tid));
    assert!(!passed.load());

    sema.signal();
    assert_eq!(waiter.join(), 0);
    assert!(passed.load());
    // The permit went to the waiter.
    assert_eq!(sema.permits(), 0);
}

pub fn semaphore_permits() {
    let sema = Semaphore::new(3);
    for _ in 0..3 {
        assert!(sema.try_wait());
    }
    assert!(!sema.try_wait());
    assert_eq!(sema.permits(), 0);

    sema.signal();
    assert_eq!(sema.permits(), 1);
    sema.wait();
    assert_eq!(sema.permits(), 0);
}

/// Exactly one of the racing threads wins the claim.
pub fn atomics() {
    const RACERS: usize = 8;
    let claimed = Arc::new(AtomicBool::new(false));
    let winners = Arc::new(AtomicUsize::new(0));
    let highest = Arc::new(AtomicU32::new(0));
    let balance = Arc::new(AtomicI64::new(0));

    let racers = (0..RACERS)
        .map(|i| {
            let (claimed, winners) = (claimed.clone(), winners.clone());
            let (highest, balance) = (highest.clone(), balance.clone());
            ThreadBuilder::new(format!("racer{i}")).spawn(move || {
                Current::yield_now();
                if claimed.compare_exchange(false, true).is_ok() {
                    winners.fetch_add(1);
                }
                highest.fetch_max(i as u32);
                balance.fetch_sub(1);
            })
        })
        .collect::<Vec<_>>();

    for racer in racers {
        assert_eq!(racer.join(), 0);
    }
    assert_eq!(winners.load(), 1);
    assert_eq!(claimed.compare_exchange(false, true), Err(true));
    assert_eq!(highest.load(), RACERS as u32 - 1);
    assert_eq!(balance.load(), -(RACERS as i64));
}

pub fn join_exit_codes() {
    let returned = ThreadBuilder::new("returned").spawn(|| ());
    let exited = ThreadBuilder::new("exited").spawn(|| Current::exit(7));
    let panicked = ThreadBuilder::new("panicked").spawn(|| panic!("expected panic"));

    assert_eq!(returned.join(), 0);
    assert_eq!(exited.join(), 7);
    assert_eq!(panicked.join(), -1);
}

pub fn spawn_as_parked() {
    let ran = Arc::new(AtomicBool::new(false));
    let handle = {
        let ran = ran.clone();
        ThreadBuilder::new("parked").spawn_as_parked(move || ran.store(true))
    };
    let tid = handle.tid();

    settle(10);
    assert!(!ran.load(), "A parked thread must not run before unpark.");
    assert_eq!(get_state_by_tid(tid), Ok(ThreadState::Parked));

    handle.unpark();
    wait_for("the unparked thread to run", || ran.load());
}

pub fn unknown_tid() {
    assert_eq!(
        get_state_by_tid(u64::MAX),
        Err(KernelError::InvalidArgument)
    );
    assert_eq!(
        get_state_by_tid(Current::get_tid()),
        Ok(ThreadState::Running)
    );
}

pub fn nested_boot() {
    assert_eq!(
        SystemConfigurationBuilder::new().start(|| ()),
        Err(KernelError::Busy)
    );
}
