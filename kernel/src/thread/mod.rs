//! Thread abstration, an abstraction of a cpu core.
//!
//! ## The threading model
//!
//! An executing kernel consists of a collection of threads, each with their
//! own stack and local state. Exactly one of them runs on the processor at a
//! time. A thread leaves the processor only when it
//!
//! - **yields** ([`Current::yield_now`]), going back to the run queue,
//! - **parks** ([`Current::park_with`]), waiting until someone calls
//!   [`ParkHandle::unpark`] on its handle, or
//! - **exits**, by returning from its function or with [`Current::exit`].
//!
//! The timer interrupt can force a yield through the scheduler, but only while
//! interrupts are enabled.
//!
//! Parking is the building block of every blocking primitive. The thread
//! disables interrupts, records its [`ParkHandle`] somewhere a waker will find
//! it, and parks:
//!
//! ```rust,ignore
//! let guard = InterruptGuard::new();
//! let mut waiters = self.waiters.lock();
//! Current::park_with(|handle| {
//!     waiters.push_back(handle);
//!     waiters.unlock();
//! });
//! drop(guard);
//! ```
//!
//! As interrupts stay disabled from the check to the park, no wake-up can
//! slip in between.
pub mod scheduler;

use crate::{KernelError, interrupt::InterruptGuard, sync::SpinLock};
use crossbeam_utils::{
    atomic::AtomicCell,
    sync::{Parker, Unparker},
};
use machine::interrupt::{InterruptState, in_handler};
use scheduler::{Cpu, Exit, Halted, cpu};
use std::{
    panic::{AssertUnwindSafe, catch_unwind, resume_unwind},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

/// A possible state of the thread.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum ThreadState {
    /// Thread is runnable.
    Runnable,
    /// Thread is running.
    Running,
    /// Thread is exited with exitcode.
    Exited(i32),
    /// Thread is parked.
    Parked,
}

/// Get specified thread's [`ThreadState`] by TID (Thread ID).
///
/// # Errors
/// [`KernelError::InvalidArgument`] if no live thread has `tid`.
pub fn get_state_by_tid(tid: u64) -> Result<ThreadState, KernelError> {
    let cpu = scheduler::try_cpu().ok_or(KernelError::InvalidArgument)?;
    let threads = cpu.threads.lock();
    let state = threads.get(&tid).map(|state| state.load());
    threads.unlock();
    state.ok_or(KernelError::InvalidArgument)
}

/// An thread abstraction.
pub struct Thread {
    /// Thread id
    pub tid: u64,
    /// Thread name
    pub name: String,
    /// State of the thread.
    pub state: Arc<AtomicCell<ThreadState>>,
    pub(crate) unparker: Unparker,
}

/// A handle to join thread.
pub struct JoinHandle {
    /// Thread id of this handle.
    pub tid: u64,
    join: Arc<JoinState>,
}

#[derive(Default)]
pub(crate) struct JoinState {
    inner: SpinLock<JoinInner>,
}

#[derive(Default)]
struct JoinInner {
    code: Option<i32>,
    waiters: Vec<ParkHandle>,
}

impl JoinState {
    /// Records the exit code and returns the joiners to wake.
    pub(crate) fn complete(&self, code: i32) -> Vec<ParkHandle> {
        let mut inner = self.inner.lock();
        inner.code = Some(code);
        let waiters = std::mem::take(&mut inner.waiters);
        inner.unlock();
        waiters
    }
}

impl JoinHandle {
    /// Join this handle and returns exit code.
    ///
    /// The exit code is `0` if the thread returned, the code passed to
    /// [`Current::exit`], or `-1` if the thread panicked.
    pub fn join(self) -> i32 {
        loop {
            let guard = InterruptGuard::new();
            let mut inner = self.join.inner.lock();
            if let Some(code) = inner.code {
                inner.unlock();
                drop(guard);
                return code;
            }
            Current::park_with(|handle| {
                inner.waiters.push(handle);
                inner.unlock();
            });
            drop(guard);
        }
    }
}

/// A handle that represent the parked thread.
pub struct ParkHandle {
    pub(crate) th: Box<Thread>,
}

impl ParkHandle {
    /// Thread id of the parked thread.
    pub fn tid(&self) -> u64 {
        self.th.tid
    }

    /// Consume the handle and unpark the underlying thread.
    ///
    /// The thread becomes runnable; it runs when the scheduler picks it.
    pub fn unpark(self) {
        scheduler::wake(self.th);
    }
}

/// The opaque structure indicating the running thread on the current cpu.
pub struct Current {
    _p: (),
}

impl Current {
    /// Run a function `f` with [`ParkHandle`] for current thread, and then park
    /// the current thread.
    ///
    /// Interrupts must be disabled by the caller, which makes recording the
    /// handle and parking atomic. `f` must release every spinlock it was
    /// handed.
    ///
    /// # Panics
    /// Panics inside an interrupt handler, with interrupts enabled, or when a
    /// spinlock is still held after `f` returns.
    pub fn park_with(f: impl FnOnce(ParkHandle)) {
        assert!(!in_handler(), "Try to park a thread in an interrupt handler.");
        assert_eq!(
            InterruptState::current(),
            InterruptState::Off,
            "Try to park a thread with interrupts enabled."
        );
        scheduler::park_current(f);
    }

    /// Yield the processor to the next runnable thread.
    ///
    /// Inside an interrupt handler the yield is deferred until the handler
    /// returns.
    pub fn yield_now() {
        if in_handler() {
            machine::interrupt::request_reschedule();
        } else {
            scheduler::yield_current();
        }
    }

    /// Exit the current thread with `exit_code`.
    pub fn exit(exit_code: i32) -> ! {
        resume_unwind(Box::new(Exit(exit_code)))
    }

    /// Get the current thread's id.
    ///
    /// # Panics
    /// Panics if called outside of a kernel thread.
    pub fn get_tid() -> u64 {
        scheduler::local_tid().unwrap_or_else(|| panic!("Not a kernel thread."))
    }
}

/// A struct to build a new thread.
pub struct ThreadBuilder {
    tid: u64,
    name: String,
}

impl ThreadBuilder {
    /// Create a new thread builder for thread `name`.
    pub fn new<I>(name: I) -> Self
    where
        String: From<I>,
    {
        static TID: AtomicU64 = AtomicU64::new(0);
        Self {
            tid: TID.fetch_add(1, Ordering::SeqCst),
            name: String::from(name),
        }
    }

    /// Get the thread id of this thread.
    pub fn get_tid(&self) -> u64 {
        self.tid
    }

    /// Spawn the thread as a parked state.
    ///
    /// The thread starts running after [`ParkHandle::unpark`].
    pub fn spawn_as_parked<F: FnOnce() + Send + 'static>(self, thread_fn: F) -> ParkHandle {
        let (th, _) = self.into_thread(thread_fn);
        th.state.store(ThreadState::Parked);
        ParkHandle { th }
    }

    /// Spawn the thread.
    pub fn spawn<F: FnOnce() + Send + 'static>(self, thread_fn: F) -> JoinHandle {
        let tid = self.tid;
        let (th, join) = self.into_thread(thread_fn);
        let guard = InterruptGuard::new();
        cpu().scheduler.push_to_queue(th);
        drop(guard);
        JoinHandle { tid, join }
    }

    fn into_thread<F: FnOnce() + Send + 'static>(
        self,
        thread_fn: F,
    ) -> (Box<Thread>, Arc<JoinState>) {
        let cpu = cpu();
        let Self { tid, name } = self;
        let parker = Parker::new();
        let th = Box::new(Thread {
            tid,
            name: name.clone(),
            state: Arc::new(AtomicCell::new(ThreadState::Runnable)),
            unparker: parker.unparker().clone(),
        });
        cpu.register_thread(tid, th.state.clone());

        let join = Arc::new(JoinState::default());
        let host = std::thread::Builder::new()
            .name(name.clone())
            .spawn({
                let cpu = cpu.clone();
                let join = join.clone();
                move || thread_start(cpu, tid, name, parker, join, thread_fn)
            })
            .unwrap_or_else(|e| panic!("Failed to spawn a host thread: {e}"));
        cpu.register_host(th.unparker.clone(), host);
        (th, join)
    }
}

/// The very beginning of the thread
fn thread_start<F: FnOnce()>(
    cpu: Arc<Cpu>,
    tid: u64,
    name: String,
    parker: Parker,
    join: Arc<JoinState>,
    thread_fn: F,
) {
    scheduler::enter(cpu.clone(), tid, parker);
    let result = catch_unwind(AssertUnwindSafe(|| {
        scheduler::wait_for_cpu(&cpu, tid);
        InterruptState::enable();
        thread_fn();
    }));
    let code = match result {
        Ok(()) => Some(0),
        Err(payload) => {
            if let Some(Exit(code)) = payload.downcast_ref::<Exit>() {
                Some(*code)
            } else if payload.is::<Halted>() {
                None
            } else {
                crate::warning!("Thread `{}` (tid: {}) panicked.", name, tid);
                Some(-1)
            }
        }
    };
    if let Some(code) = code {
        scheduler::finish(&cpu, tid, &join, code);
    }
    scheduler::leave();
}
