// This is test & bootstrap implementation.
// Run with `cargo test -p threads-grader` or `cargo run -p threads-grader`.
mod alarm;
mod boot;
mod communicator;
mod condition;
mod primitives;
mod round_robin;

use kernel::{TestDriver, thread::scheduler::Fifo};
use threads::RoundRobin;

fn main() {
    let fifo = TestDriver::<Fifo>::start([
        // Kernel substrate.
        &primitives::lock_mutual_exclusion,
        &primitives::lock_parks_waiter,
        &primitives::lock_release_without_holding,
        &primitives::lock_acquire_twice,
        &primitives::semaphore_blocks,
        &primitives::semaphore_permits,
        &primitives::atomics,
        &primitives::join_exit_codes,
        &primitives::spawn_as_parked,
        &primitives::unknown_tid,
        &primitives::nested_boot,
        &boot::DEADLOCK,
        &boot::LOCK_CYCLE,
        &boot::EXIT_CODE,
        &boot::PANIC,
        &boot::ORPHANS,
        // Condition variable.
        &condition::no_lost_wakeup,
        &condition::wake_before_sleep,
        &condition::ping_pong,
        &condition::wake_on_empty,
        &condition::wake_all_wakes_every_sleeper,
        &condition::wake_all_leaves_later_sleepers,
        &condition::bounded_buffer,
        &condition::sleep_without_lock,
        &condition::wake_without_lock,
        &condition::wake_all_without_lock,
        // Alarm.
        &alarm::elapsed_at_least,
        &alarm::non_positive,
        &alarm::isolation,
        &alarm::ordering,
        &alarm::same_deadline,
        &alarm::sleeper_is_parked,
        &alarm::idle_fast_forward,
        &alarm::many_sleepers,
        // Communicator.
        &communicator::speakers_first,
        &communicator::listeners_first,
        &communicator::interleaved,
        &communicator::alternating,
        &communicator::speaker_blocks,
        &communicator::listener_blocks,
        &communicator::speak_returns_after_listen,
        &communicator::more_speakers,
        &communicator::more_listeners,
        &communicator::randomized,
        &communicator::owned_payload,
    ]);

    let round_robin = TestDriver::<RoundRobin>::start([
        // Round robin scheduler.
        &round_robin::functionality,
        &round_robin::preemption,
        &round_robin::fairness,
        // Synchronization under preemption.
        &primitives::lock_mutual_exclusion,
        &primitives::semaphore_blocks,
        &condition::no_lost_wakeup,
        &condition::ping_pong,
        &condition::wake_all_wakes_every_sleeper,
        &condition::bounded_buffer,
        &alarm::elapsed_at_least,
        &alarm::isolation,
        &alarm::ordering,
        &alarm::same_deadline,
        &alarm::sleeper_is_parked,
        &alarm::many_sleepers,
        &communicator::speakers_first,
        &communicator::listeners_first,
        &communicator::more_speakers,
        &communicator::more_listeners,
        &communicator::randomized,
    ]);

    if !(fifo && round_robin) {
        std::process::exit(1);
    }
}
