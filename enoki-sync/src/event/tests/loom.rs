use super::*;
use crate::loom::{self, sync::Arc, thread};

#[test]
fn set_releases_waiter() {
    loom::model(|| {
        let event = Arc::new(Event::new(Reset::Manual));
        let waiter = thread::spawn({
            let event = event.clone();
            move || assert!(event.wait(Timeout::Infinite))
        });

        event.set();
        waiter.join().unwrap();
        assert!(event.is_signaled());
    });
}

#[test]
fn automatic_reset_releases_one() {
    loom::model(|| {
        let event = Arc::new(Event::new(Reset::Automatic));
        let waiter = thread::spawn({
            let event = event.clone();
            move || assert!(event.wait(Timeout::Infinite))
        });

        event.set();
        waiter.join().unwrap();

        // the signal was consumed by the waiter, unless `set` raced ahead
        // of it and the waiter consumed it afterwards; either way it's gone.
        assert!(!event.is_signaled());
    });
}

#[test]
fn poll_races_with_set() {
    loom::model(|| {
        let event = Arc::new(Event::new(Reset::Manual));
        let setter = thread::spawn({
            let event = event.clone();
            move || event.set()
        });

        // may or may not observe the signal, but must never block.
        let _ = event.wait(Timeout::Immediate);
        setter.join().unwrap();
        assert!(event.wait(Timeout::Immediate));
    });
}
