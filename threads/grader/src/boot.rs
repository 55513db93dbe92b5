//! Tests of the kernel lifecycle.
//!
//! These cases check the outcome of [`SystemConfigurationBuilder::start`]
//! itself, so they boot the kernel on their own instead of running inside one.
use grading::settle;
use kernel::{
    KernelError, SystemConfigurationBuilder, TestCase,
    sync::{Lock, Semaphore},
    thread::{Current, ThreadBuilder},
};
use std::sync::Arc;

/// A test case that expects `main` to bring the kernel down with `expect`.
pub struct Boot {
    name: &'static str,
    main: fn(),
    expect: Result<i32, KernelError>,
}

impl TestCase for Boot {
    fn name(&'static self) -> &'static str {
        self.name
    }

    fn run(&'static self, config: SystemConfigurationBuilder) -> bool {
        kernel::print!("test {} ... ", self.name);
        let outcome = config.start(self.main);
        if outcome == self.expect {
            kernel::println!("ok");
            true
        } else {
            kernel::println!("FAILED (expected {:?}, got {:?})", self.expect, outcome);
            false
        }
    }
}

/// The only thread blocks forever.
pub static DEADLOCK: Boot = Boot {
    name: concat!(module_path!(), "::deadlock"),
    main: || Semaphore::new(0).wait(),
    expect: Err(KernelError::Deadlock),
};

/// Two threads wait for the lock held by the other one.
pub static LOCK_CYCLE: Boot = Boot {
    name: concat!(module_path!(), "::lock_cycle"),
    main: lock_cycle,
    expect: Err(KernelError::Deadlock),
};

fn lock_cycle() {
    let (a, b) = (Arc::new(Lock::new()), Arc::new(Lock::new()));
    a.acquire();
    let _other = {
        let (a, b) = (a.clone(), b.clone());
        ThreadBuilder::new("other").spawn(move || {
            b.acquire();
            a.acquire();
        })
    };
    settle(4);
    b.acquire();
}

pub static EXIT_CODE: Boot = Boot {
    name: concat!(module_path!(), "::exit_code"),
    main: || Current::exit(3),
    expect: Ok(3),
};

pub static PANIC: Boot = Boot {
    name: concat!(module_path!(), "::panic"),
    main: || panic!("expected panic"),
    expect: Ok(-1),
};

/// Threads still blocked when `main` returns are torn down.
pub static ORPHANS: Boot = Boot {
    name: concat!(module_path!(), "::orphans"),
    main: orphans,
    expect: Ok(0),
};

fn orphans() {
    let sema = Arc::new(Semaphore::new(0));
    for i in 0..4 {
        let sema = sema.clone();
        ThreadBuilder::new(format!("orphan{i}")).spawn(move || sema.wait());
    }
    settle(8);
}
