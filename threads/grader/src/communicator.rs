use grading::{settle, wait_for};
use kernel::{
    sync::SpinLock,
    thread::{JoinHandle, ThreadBuilder, ThreadState, get_state_by_tid},
};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use std::sync::Arc;
use threads::Communicator;

#[derive(Clone, Copy)]
enum Party {
    Speaker(u32),
    Listener,
}

/// Words heard by the listeners.
type Heard<T> = Arc<SpinLock<Vec<T>>>;

fn spawn(party: Party, comm: &Arc<Communicator<u32>>, heard: &Heard<u32>) -> JoinHandle {
    let (comm, heard) = (comm.clone(), heard.clone());
    match party {
        Party::Speaker(word) => {
            ThreadBuilder::new(format!("speaker{word}")).spawn(move || comm.speak(word))
        }
        Party::Listener => ThreadBuilder::new("listener").spawn(move || {
            let word = comm.listen();
            let mut heard = heard.lock();
            heard.push(word);
            heard.unlock();
        }),
    }
}

fn take_sorted<T: Ord>(heard: &Heard<T>) -> Vec<T> {
    let mut heard = heard.lock();
    let mut words = std::mem::take(&mut *heard);
    heard.unlock();
    words.sort_unstable();
    words
}

fn count<T>(heard: &Heard<T>) -> usize {
    let heard = heard.lock();
    let n = heard.len();
    heard.unlock();
    n
}

fn is_parked(handle: &JoinHandle) -> bool {
    get_state_by_tid(handle.tid) == Ok(ThreadState::Parked)
}

/// Parties arrive in `order`, each one blocking before the next arrives.
fn rendezvous(order: [Party; 4]) {
    let comm = Arc::new(Communicator::new());
    let heard = Heard::default();

    let handles = order
        .into_iter()
        .map(|party| {
            let handle = spawn(party, &comm, &heard);
            settle(4);
            handle
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.join(), 0);
    }
    assert_eq!(take_sorted(&heard), [4, 7]);
    assert_eq!(comm.pending_speakers(), 0);
    assert_eq!(comm.pending_listeners(), 0);
}

pub fn speakers_first() {
    use Party::*;
    rendezvous([Speaker(4), Speaker(7), Listener, Listener]);
}

pub fn listeners_first() {
    use Party::*;
    rendezvous([Listener, Listener, Speaker(4), Speaker(7)]);
}

pub fn interleaved() {
    use Party::*;
    rendezvous([Speaker(4), Listener, Listener, Speaker(7)]);
}

pub fn alternating() {
    use Party::*;
    rendezvous([Listener, Speaker(4), Speaker(7), Listener]);
}

pub fn speaker_blocks() {
    let comm = Arc::new(Communicator::new());
    let speaker = spawn(Party::Speaker(5), &comm, &Heard::default());
    wait_for("the speaker to block", || is_parked(&speaker));
    assert_eq!(comm.pending_speakers(), 1);
    assert_eq!(comm.pending_listeners(), 0);

    assert_eq!(comm.listen(), 5);
    assert_eq!(speaker.join(), 0);
    assert_eq!(comm.pending_speakers(), 0);
}

pub fn listener_blocks() {
    let comm = Arc::new(Communicator::new());
    let heard = Heard::default();
    let listener = spawn(Party::Listener, &comm, &heard);
    wait_for("the listener to block", || is_parked(&listener));
    assert_eq!(comm.pending_listeners(), 1);
    assert_eq!(count(&heard), 0);

    comm.speak(6);
    assert_eq!(listener.join(), 0);
    assert_eq!(take_sorted(&heard), [6]);
    assert_eq!(comm.pending_listeners(), 0);
}

/// `speak` returns only once the listener holds the word.
///
/// Only meaningful without preemption: the listener runs from `listen` to its
/// log entry without giving up the processor.
pub fn speak_returns_after_listen() {
    let comm = Arc::new(Communicator::new());
    let log = Arc::new(SpinLock::new(Vec::new()));
    let listener = {
        let (comm, log) = (comm.clone(), log.clone());
        ThreadBuilder::new("listener").spawn(move || {
            let word = comm.listen();
            let mut log = log.lock();
            log.push(("heard", word));
            log.unlock();
        })
    };

    comm.speak(42);
    let mut guard = log.lock();
    guard.push(("spoken", 42));
    let events = guard.clone();
    guard.unlock();
    assert_eq!(events, [("heard", 42), ("spoken", 42)]);
    assert_eq!(listener.join(), 0);
}

pub fn more_speakers() {
    let comm = Arc::new(Communicator::new());
    let heard = Heard::default();
    let speakers = [1, 2, 3].map(|word| spawn(Party::Speaker(word), &comm, &heard));
    wait_for("every speaker to block", || comm.pending_speakers() == 3);

    let first = comm.listen();
    assert!([1, 2, 3].contains(&first));
    // Exactly one speaker was matched.
    assert_eq!(comm.pending_speakers(), 2);
    wait_for("the other speakers to block", || {
        speakers.iter().filter(|s| is_parked(s)).count() == 2
    });

    let mut words = vec![first, comm.listen(), comm.listen()];
    words.sort_unstable();
    assert_eq!(words, [1, 2, 3]);
    for speaker in speakers {
        assert_eq!(speaker.join(), 0);
    }
    assert_eq!(comm.pending_speakers(), 0);
}

pub fn more_listeners() {
    let comm = Arc::new(Communicator::new());
    let heard = Heard::default();
    let listeners = [(); 3].map(|_| spawn(Party::Listener, &comm, &heard));
    wait_for("every listener to block", || comm.pending_listeners() == 3);

    comm.speak(9);
    // Exactly one listener was matched.
    assert_eq!(comm.pending_listeners(), 2);
    wait_for("the matched listener to finish", || count(&heard) == 1);
    wait_for("the other listeners to block", || {
        listeners.iter().filter(|l| is_parked(l)).count() == 2
    });

    comm.speak(10);
    comm.speak(11);
    for listener in listeners {
        assert_eq!(listener.join(), 0);
    }
    assert_eq!(take_sorted(&heard), [9, 10, 11]);
    assert_eq!(comm.pending_listeners(), 0);
}

/// Parties arrive in random order at random times; every word is heard
/// exactly once.
pub fn randomized() {
    const ROUNDS: usize = 8;
    const PAIRS: u32 = 12;
    let mut rng = StdRng::seed_from_u64(grading::seed());

    for _ in 0..ROUNDS {
        let comm = Arc::new(Communicator::new());
        let heard = Heard::default();
        let mut parties = (0..PAIRS)
            .flat_map(|word| [Party::Speaker(word), Party::Listener])
            .collect::<Vec<_>>();
        parties.shuffle(&mut rng);

        let handles = parties
            .into_iter()
            .map(|party| {
                let handle = spawn(party, &comm, &heard);
                settle(rng.gen_range(0..3));
                handle
            })
            .collect::<Vec<_>>();
        for handle in handles {
            assert_eq!(handle.join(), 0);
        }
        assert_eq!(take_sorted(&heard), (0..PAIRS).collect::<Vec<_>>());
        assert_eq!(comm.pending_speakers(), 0);
        assert_eq!(comm.pending_listeners(), 0);
    }
}

pub fn owned_payload() {
    let comm = Arc::new(Communicator::<String>::new());
    let heard = Heard::default();
    let listeners = (0..2)
        .map(|_| {
            let (comm, heard) = (comm.clone(), heard.clone());
            ThreadBuilder::new("listener").spawn(move || {
                let word = comm.listen();
                let mut heard = heard.lock();
                heard.push(word);
                heard.unlock();
            })
        })
        .collect::<Vec<_>>();

    comm.speak(String::from("hello"));
    comm.speak(String::from("world"));
    for listener in listeners {
        assert_eq!(listener.join(), 0);
    }
    assert_eq!(take_sorted(&heard), ["hello", "world"]);
}
