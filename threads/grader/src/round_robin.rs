use grading::{wait_for, window};
use kernel::{
    sync::atomic::{AtomicBool, AtomicUsize},
    thread::ThreadBuilder,
};
use std::sync::Arc;

/// Tests the scheduler's ability to execute multiple threads in order.
///
/// This test ensures that:
/// - Multiple threads are created and scheduled correctly.
/// - Each thread gets its turn to execute sequentially, although every
///   thread spins instead of yielding.
/// - The total number of executed threads matches the expected count.
pub fn functionality() {
    const JOB_CNT: usize = 20;
    let cnt = Arc::new(AtomicUsize::new(0));

    // Spawn `JOB_CNT` threads that execute in order.
    let handles = (0..JOB_CNT)
        .map(|i| {
            let c = cnt.clone();
            ThreadBuilder::new(format!("waiter{i}")).spawn(move || {
                // Wait for the counter to reach `i`, ensuring sequential execution.
                while c.load() != i {
                    window();
                }
                c.fetch_add(1);
                // Spin until all threads complete execution.
                while c.load() != JOB_CNT {
                    window();
                }
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.join(), 0);
    }
    assert_eq!(cnt.load(), JOB_CNT);
}

/// A spinning thread is preempted in favor of the thread it waits for.
pub fn preemption() {
    let flag = Arc::new(AtomicBool::new(false));
    let spinner = {
        let flag = flag.clone();
        ThreadBuilder::new("spinner").spawn(move || {
            while !flag.load() {
                window();
            }
        })
    };
    let setter = {
        let flag = flag.clone();
        ThreadBuilder::new("setter").spawn(move || flag.store(true))
    };
    assert_eq!(spinner.join(), 0);
    assert_eq!(setter.join(), 0);
}

/// Every spinning thread receives a share of the processor.
pub fn fairness() {
    const SPINNERS: usize = 4;
    let stop = Arc::new(AtomicBool::new(false));
    let progress = Arc::new([0; SPINNERS].map(|_| AtomicUsize::new(0)));

    let spinners = (0..SPINNERS)
        .map(|i| {
            let (stop, progress) = (stop.clone(), progress.clone());
            ThreadBuilder::new(format!("spinner{i}")).spawn(move || {
                while !stop.load() {
                    progress[i].fetch_add(1);
                    window();
                }
            })
        })
        .collect::<Vec<_>>();

    wait_for("every spinner to make progress", || {
        progress.iter().all(|p| p.load() > 0)
    });
    stop.store(true);
    for spinner in spinners {
        assert_eq!(spinner.join(), 0);
    }
}
