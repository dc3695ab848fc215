use super::*;
use crate::loom::{
    sync::{
        atomic::{AtomicUsize, Ordering::SeqCst},
        Arc,
    },
    thread,
};

const WAITERS: usize = 4;

#[test]
fn infinite_wait_released_by_set() {
    let _trace = crate::util::test::trace_init();
    let event = Arc::new(Event::new(Reset::Manual));

    let waiter = thread::spawn({
        let event = event.clone();
        move || event.wait(Timeout::Infinite)
    });

    thread::sleep(Duration::from_millis(20));
    assert!(!waiter.is_finished(), "waiter must block until the event is set");

    event.set();
    assert!(waiter.join().unwrap());
}

#[test]
fn manual_event_releases_all_waiters() {
    let _trace = crate::util::test::trace_init();
    let event = Arc::new(Event::new(Reset::Manual));
    let released = Arc::new(AtomicUsize::new(0));

    let waiters = (0..WAITERS)
        .map(|_| {
            let event = event.clone();
            let released = released.clone();
            thread::spawn(move || {
                assert!(event.wait(Timeout::Infinite));
                released.fetch_add(1, SeqCst);
            })
        })
        .collect::<Vec<_>>();

    event.set();
    for waiter in waiters {
        waiter.join().unwrap();
    }

    assert_eq!(released.load(SeqCst), WAITERS);
    // future waiters pass too.
    assert!(event.wait(Timeout::Immediate));
}

#[test]
fn automatic_event_releases_one_waiter_per_set() {
    let _trace = crate::util::test::trace_init();
    let event = Arc::new(Event::new(Reset::Automatic));
    let released = Arc::new(AtomicUsize::new(0));

    let waiters = (0..WAITERS)
        .map(|_| {
            let event = event.clone();
            let released = released.clone();
            thread::spawn(move || {
                assert!(event.wait(Timeout::Infinite));
                released.fetch_add(1, SeqCst);
            })
        })
        .collect::<Vec<_>>();

    for expected in 1..=WAITERS {
        event.set();
        // wait for the released waiter to record itself and for the signal
        // to have been consumed.
        while released.load(SeqCst) < expected {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(10));
        assert_eq!(test_dbg!(released.load(SeqCst)), expected);
    }

    for waiter in waiters {
        waiter.join().unwrap();
    }
    assert!(!event.is_signaled());
}

#[test]
fn timed_wait_released_by_set() {
    let _trace = crate::util::test::trace_init();
    let event = Arc::new(Event::new(Reset::Manual));

    let waiter = thread::spawn({
        let event = event.clone();
        move || event.wait(Duration::from_secs(5))
    });

    thread::sleep(Duration::from_millis(10));
    event.set();
    assert!(waiter.join().unwrap());
}
