use grading::wait_for;
use kernel::{
    sync::SpinLock,
    thread::{ThreadBuilder, ThreadState, get_state_by_tid},
    timer::{self, TIMER_PERIOD},
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::sync::Arc;
use threads::Alarm;

/// A sleeper wakes up no earlier than its deadline.
pub fn elapsed_at_least() {
    let alarm = Alarm::new();
    for x in [1, 10, 100, TIMER_PERIOD as i64, 3 * TIMER_PERIOD as i64 + 7] {
        let before = timer::ticks();
        alarm.wait_until(x);
        let after = timer::ticks();
        assert!(
            after >= before + x as u64,
            "Woke up at {after} after sleeping {x} ticks from {before}."
        );
    }
    assert_eq!(alarm.pending(), 0);
}

pub fn non_positive() {
    let alarm = Alarm::new();
    let before = timer::ticks();
    alarm.wait_until(0);
    alarm.wait_until(-1);
    alarm.wait_until(i64::MIN);
    assert_eq!(timer::ticks(), before, "Non-positive waits must not block.");
    assert_eq!(alarm.pending(), 0);
}

/// The tick of one alarm never wakes the sleepers of another.
pub fn isolation() {
    const LONG: i64 = 40 * TIMER_PERIOD as i64;
    let (long, short) = (Arc::new(Alarm::new()), Alarm::new());

    let sleeper = {
        let long = long.clone();
        ThreadBuilder::new("long sleeper").spawn(move || {
            let before = timer::ticks();
            long.wait_until(LONG);
            assert!(timer::ticks() >= before + LONG as u64);
        })
    };
    wait_for("the long sleeper to sleep", || long.pending() == 1);

    short.wait_until(TIMER_PERIOD as i64);
    assert_eq!(long.pending(), 1);
    assert_eq!(get_state_by_tid(sleeper.tid), Ok(ThreadState::Parked));
    assert_eq!(sleeper.join(), 0);
    assert_eq!(long.pending(), 0);
}

/// Sleepers wake up in deadline order.
pub fn ordering() {
    const GAP: i64 = 4 * TIMER_PERIOD as i64;
    let alarm = Arc::new(Alarm::new());
    let woken = Arc::new(SpinLock::new(Vec::new()));
    let rank = [3, 0, 4, 1, 2];

    let sleepers = rank
        .iter()
        .map(|&r| {
            let (alarm, woken) = (alarm.clone(), woken.clone());
            ThreadBuilder::new(format!("sleeper{r}")).spawn(move || {
                alarm.wait_until((r + 1) * GAP);
                let mut woken = woken.lock();
                woken.push(r);
                woken.unlock();
            })
        })
        .collect::<Vec<_>>();
    wait_for("every sleeper to sleep", || alarm.pending() == rank.len());

    for sleeper in sleepers {
        assert_eq!(sleeper.join(), 0);
    }
    let woken = woken.lock();
    let order = woken.clone();
    woken.unlock();
    assert_eq!(order, [0, 1, 2, 3, 4]);
}

/// Sleepers sharing a deadline are released by the same tick.
pub fn same_deadline() {
    const SLEEPERS: usize = 5;
    let alarm = Arc::new(Alarm::new());
    let target = timer::ticks() + 40 * TIMER_PERIOD;

    let sleepers = (0..SLEEPERS)
        .map(|i| {
            let alarm = alarm.clone();
            ThreadBuilder::new(format!("sleeper{i}")).spawn(move || {
                alarm.wait_until(target as i64 - timer::ticks() as i64);
                assert!(timer::ticks() > target);
            })
        })
        .collect::<Vec<_>>();
    wait_for("every sleeper to sleep", || alarm.pending() == SLEEPERS);

    wait_for("the deadline to pass", || alarm.pending() < SLEEPERS);
    assert_eq!(alarm.pending(), 0, "The batch was split across ticks.");
    for sleeper in sleepers {
        assert_eq!(sleeper.join(), 0);
    }
}

pub fn sleeper_is_parked() {
    let alarm = Arc::new(Alarm::new());
    let sleeper = {
        let alarm = alarm.clone();
        ThreadBuilder::new("sleeper").spawn(move || alarm.wait_until(10 * TIMER_PERIOD as i64))
    };
    wait_for("the sleeper to register", || alarm.pending() == 1);
    // The sleeper registers before it parks and may be preempted in between.
    wait_for("the sleeper to park", || {
        get_state_by_tid(sleeper.tid) == Ok(ThreadState::Parked)
    });
    assert_eq!(alarm.pending(), 1);
    assert_eq!(sleeper.join(), 0);
    assert_eq!(alarm.pending(), 0);
}

/// With nothing to run, the processor idles until the sleeper is due.
pub fn idle_fast_forward() {
    const LONG: i64 = 2_000 * TIMER_PERIOD as i64;
    let alarm = Alarm::new();
    let before = timer::ticks();
    alarm.wait_until(LONG);
    assert!(timer::ticks() >= before + LONG as u64);
}

pub fn many_sleepers() {
    const SLEEPERS: usize = 32;
    let alarm = Arc::new(Alarm::new());
    let mut rng = StdRng::seed_from_u64(grading::seed());

    let sleepers = (0..SLEEPERS)
        .map(|i| {
            let alarm = alarm.clone();
            let x = rng.gen_range(-10..=5 * TIMER_PERIOD as i64);
            ThreadBuilder::new(format!("sleeper{i}")).spawn(move || {
                let before = timer::ticks();
                alarm.wait_until(x);
                if x > 0 {
                    assert!(timer::ticks() >= before + x as u64);
                }
            })
        })
        .collect::<Vec<_>>();

    for sleeper in sleepers {
        assert_eq!(sleeper.join(), 0);
    }
    assert_eq!(alarm.pending(), 0);
}
