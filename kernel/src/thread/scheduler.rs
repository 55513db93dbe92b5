//! Scheduler and the processor.
//!
//! Each kernel thread is backed by a host thread, but the processor is a
//! baton: a host thread runs kernel code only while [`Cpu`] names its thread
//! as the running one. Switching hands the baton to the next thread picked by
//! the [`Scheduler`] and parks the host thread until the baton comes back.
use super::{JoinState, ParkHandle, Thread, ThreadBuilder, ThreadState};
use crate::{
    KernelError,
    interrupt::{self, InterruptGuard, InterruptState},
    sync::SpinLock,
    timer::Hook,
};
use crossbeam_queue::SegQueue;
use crossbeam_utils::{
    atomic::AtomicCell,
    sync::{Parker, Unparker},
};
use machine::{Machine, spinlock};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    panic::resume_unwind,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

/// A trait for a thread scheduler.
///
/// The [`Scheduler`] trait defines the common functionality expected from a
/// thread scheduler. It provides an interface for managing threads, determining
/// which thread to run next, and handling periodic timer interrupts. The
/// scheduler determines when each thread is allowed to run and how the
/// processor is shared among all threads.
///
/// This trait can be implemented by different types of schedulers, such as
/// Round Robin, Priority-based, or Multi-level Queue schedulers.
pub trait Scheduler: Send + Sync {
    /// Peek a next thread to run.
    ///
    /// This method checks the queue and returns the next thread to run. If no
    /// threads are available, it returns `None`.
    fn next_to_run(&self) -> Option<Box<Thread>>;

    /// Push a thread `th` into scheduling queue.
    ///
    /// This method adds the specified thread to the queue of threads waiting to
    /// be scheduled.
    fn push_to_queue(&self, th: Box<Thread>);

    /// Called on every timer interrupt.
    ///
    /// This method runs inside the timer interrupt handler, after the timer
    /// hooks. A preemptive scheduler calls
    /// [`Current::yield_now`](super::Current::yield_now) here to make the
    /// interrupted thread give up the processor once the handler returns.
    fn timer_tick(&self);
}

/// A First-in-first-out scheduler.
///
/// Threads run until they park, yield or exit; the timer never preempts them.
#[derive(Default)]
pub struct Fifo {
    runqueue: SegQueue<Box<Thread>>,
}

impl Scheduler for Fifo {
    fn next_to_run(&self) -> Option<Box<Thread>> {
        self.runqueue.pop()
    }
    fn push_to_queue(&self, th: Box<Thread>) {
        self.runqueue.push(th);
    }
    fn timer_tick(&self) {}
}

/// Tid of nobody.
const NONE: u64 = u64::MAX;

#[derive(Default)]
pub(crate) struct Timers {
    pub(crate) next_id: u64,
    pub(crate) hooks: BTreeMap<u64, Hook>,
}

/// The processor of one booted kernel.
pub(crate) struct Cpu {
    pub(crate) scheduler: Box<dyn Scheduler>,
    /// The running thread while it is not parked.
    current: SpinLock<Option<Box<Thread>>>,
    running: AtomicU64,
    main: AtomicU64,
    pub(crate) threads: SpinLock<BTreeMap<u64, Arc<AtomicCell<ThreadState>>>>,
    hosts: SpinLock<Vec<(Unparker, std::thread::JoinHandle<()>)>>,
    pub(crate) timers: SpinLock<Timers>,
    halted: AtomicBool,
    outcome: AtomicCell<Option<Result<i32, KernelError>>>,
    boot: Unparker,
    machine: Arc<Machine>,
}

/// Unwind payload of [`Current::exit`](super::Current::exit).
pub(crate) struct Exit(pub(crate) i32);

/// Unwind payload of the threads torn down by a halting kernel.
pub(crate) struct Halted;

pub(crate) struct Local {
    tid: u64,
    parker: Parker,
}

thread_local! {
    static CPU: RefCell<Option<Arc<Cpu>>> = const { RefCell::new(None) };
    static LOCAL: RefCell<Option<Local>> = const { RefCell::new(None) };
}

pub(crate) fn try_cpu() -> Option<Arc<Cpu>> {
    CPU.try_with(|c| c.borrow().clone()).ok().flatten()
}

pub(crate) fn cpu() -> Arc<Cpu> {
    try_cpu().unwrap_or_else(|| panic!("Not a kernel thread."))
}

/// Tid of the kernel thread backed by this host thread.
pub(crate) fn local_tid() -> Option<u64> {
    LOCAL
        .try_with(|l| l.borrow().as_ref().map(|l| l.tid))
        .ok()
        .flatten()
}

pub(crate) fn enter(cpu: Arc<Cpu>, tid: u64, parker: Parker) {
    machine::install(cpu.machine.clone());
    CPU.with(|c| *c.borrow_mut() = Some(cpu));
    LOCAL.with(|l| *l.borrow_mut() = Some(Local { tid, parker }));
}

pub(crate) fn leave() {
    let _ = LOCAL.try_with(|l| l.borrow_mut().take());
    let _ = CPU.try_with(|c| c.borrow_mut().take());
    machine::uninstall();
}

impl Cpu {
    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub(crate) fn register_thread(&self, tid: u64, state: Arc<AtomicCell<ThreadState>>) {
        let mut threads = self.threads.lock();
        threads.insert(tid, state);
        threads.unlock();
    }

    pub(crate) fn register_host(&self, unparker: Unparker, host: std::thread::JoinHandle<()>) {
        let mut hosts = self.hosts.lock();
        hosts.push((unparker, host));
        hosts.unlock();
    }

    /// Takes the running thread off the processor.
    pub(crate) fn take_current(&self) -> Option<Box<Thread>> {
        let mut current = self.current.lock();
        let th = current.take();
        current.unlock();
        th
    }

    /// Hands the processor to `next`.
    fn run(&self, next: Box<Thread>) {
        let unparker = next.unparker.clone();
        let tid = next.tid;
        next.state.store(ThreadState::Running);
        let mut current = self.current.lock();
        *current = Some(next);
        current.unlock();
        self.running.store(tid, Ordering::SeqCst);
        unparker.unpark();
    }

    /// Powers off the kernel with `outcome`.
    ///
    /// Every host thread waiting for the processor wakes up and unwinds.
    pub(crate) fn halt(&self, outcome: Result<i32, KernelError>) {
        if self.halted.swap(true, Ordering::SeqCst) {
            return;
        }
        self.machine.halt();
        self.outcome.store(Some(outcome));
        let hosts = self.hosts.lock();
        for (unparker, _) in hosts.iter() {
            unparker.unpark();
        }
        hosts.unlock();
        self.boot.unpark();
        crate::debug!("Kernel halted: {:?}", outcome);
    }
}

/// Boots a kernel on a new machine and runs `main` as its main thread.
pub(crate) fn boot<F>(
    scheduler: Box<dyn Scheduler>,
    seed: Option<u64>,
    main: F,
) -> Result<i32, KernelError>
where
    F: FnOnce() + Send + 'static,
{
    if machine::try_current().is_some() {
        return Err(KernelError::Busy);
    }
    let machine = Machine::new(seed);
    let boot = Parker::new();
    let cpu = Arc::new(Cpu {
        scheduler,
        current: SpinLock::new(None),
        running: AtomicU64::new(NONE),
        main: AtomicU64::new(NONE),
        threads: SpinLock::new(BTreeMap::new()),
        hosts: SpinLock::new(Vec::new()),
        timers: SpinLock::new(Timers::default()),
        halted: AtomicBool::new(false),
        outcome: AtomicCell::new(None),
        boot: boot.unparker().clone(),
        machine: machine.clone(),
    });
    machine::install(machine);
    CPU.with(|c| *c.borrow_mut() = Some(cpu.clone()));
    interrupt::init();
    crate::debug!("Booting kernel (timer seed: {:?}).", seed);

    let builder = ThreadBuilder::new("main");
    cpu.main.store(builder.get_tid(), Ordering::SeqCst);
    let _main = builder.spawn(main);
    match cpu.scheduler.next_to_run() {
        Some(first) => cpu.run(first),
        None => cpu.halt(Err(KernelError::Deadlock)),
    }
    // From now on the interrupt flag belongs to the kernel threads.
    machine::uninstall();

    let outcome = loop {
        if let Some(outcome) = cpu.outcome.take() {
            break outcome;
        }
        boot.park();
    };

    loop {
        let mut hosts = cpu.hosts.lock();
        let batch = std::mem::take(&mut *hosts);
        hosts.unlock();
        if batch.is_empty() {
            break;
        }
        for (_, host) in batch {
            let _ = host.join();
        }
    }
    leave();
    outcome
}

/// Waits until the processor is handed to `me`.
///
/// Unwinds with [`Halted`] when the kernel halts in the meantime.
pub(crate) fn wait_for_cpu(cpu: &Cpu, me: u64) {
    loop {
        if cpu.is_halted() {
            resume_unwind(Box::new(Halted));
        }
        if cpu.running.load(Ordering::SeqCst) == me {
            return;
        }
        LOCAL.with(|l| {
            if let Some(local) = l.borrow().as_ref() {
                local.parker.park();
            }
        });
    }
}

/// Gives the processor to the next runnable thread.
///
/// The caller has already taken its own thread off the processor: it is
/// either parked, queued for running, or `exiting`. Returns once the caller
/// runs again, or right after handing over the processor when `exiting`.
pub(crate) fn switch_away(cpu: &Cpu, me: u64, exiting: bool) {
    assert_eq!(
        InterruptState::current(),
        InterruptState::Off,
        "Try to switch threads with interrupts enabled."
    );
    assert_eq!(
        spinlock::held(),
        0,
        "Try to switch threads while holding a lock."
    );
    let next = loop {
        match cpu.scheduler.next_to_run() {
            Some(th) if matches!(th.state.load(), ThreadState::Exited(_)) => continue,
            Some(th) => break th,
            None if machine::timer::idle() => continue,
            None => {
                crate::warning!("Deadlock: no thread can run and no timer is pending.");
                cpu.halt(Err(KernelError::Deadlock));
                if exiting {
                    return;
                }
                resume_unwind(Box::new(Halted));
            }
        }
    };
    let next_tid = next.tid;
    cpu.run(next);
    if next_tid == me || exiting {
        return;
    }
    wait_for_cpu(cpu, me);
}

/// Retires thread `tid` with exit `code`.
///
/// Runs on the exiting thread while it still owns the processor, and hands
/// the processor over for good.
pub(crate) fn finish(cpu: &Cpu, tid: u64, join: &JoinState, code: i32) {
    let guard = InterruptGuard::new();
    if cpu.is_halted() {
        return;
    }
    let mut threads = cpu.threads.lock();
    let state = threads.remove(&tid);
    threads.unlock();
    if let Some(state) = state {
        state.store(ThreadState::Exited(code));
    }

    let mut current = cpu.current.lock();
    let me = if current.as_ref().is_some_and(|th| th.tid == tid) {
        current.take()
    } else {
        None
    };
    current.unlock();
    drop(me);

    for waiter in join.complete(code) {
        waiter.unpark();
    }

    if tid == cpu.main.load(Ordering::SeqCst) {
        cpu.halt(Ok(code));
        return;
    }
    switch_away(cpu, tid, true);
    // The interrupt flag now belongs to the next thread.
    guard.consume();
}

/// Parks the current thread, handing `f` the handle that makes it runnable
/// again.
pub(crate) fn park_current(f: impl FnOnce(ParkHandle)) {
    let cpu = cpu();
    let Some(th) = cpu.take_current() else {
        panic!("Try to park a thread that is not running.");
    };
    let tid = th.tid;
    th.state.store(ThreadState::Parked);
    f(ParkHandle { th });
    assert_eq!(
        spinlock::held(),
        0,
        "Try to park a thread while holding a lock."
    );
    switch_away(&cpu, tid, false);
}

/// Puts the current thread back to the run queue and runs the next thread.
pub(crate) fn yield_current() {
    let Some(cpu) = try_cpu() else {
        return;
    };
    let guard = InterruptGuard::new();
    if let Some(th) = cpu.take_current() {
        let tid = th.tid;
        th.state.store(ThreadState::Runnable);
        cpu.scheduler.push_to_queue(th);
        switch_away(&cpu, tid, false);
    }
    drop(guard);
}

/// Makes the parked thread `th` runnable.
pub(crate) fn wake(th: Box<Thread>) {
    if matches!(th.state.load(), ThreadState::Exited(_)) {
        return;
    }
    let Some(cpu) = try_cpu() else {
        return;
    };
    let guard = InterruptGuard::new();
    th.state.store(ThreadState::Runnable);
    cpu.scheduler.push_to_queue(th);
    drop(guard);
}
