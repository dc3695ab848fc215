//! A binary gate that blocks threads until it is signaled.
//!
//! See the documentation for the [`Event`] type for details.
use crate::{
    loom::sync::{Condvar, Mutex, MutexGuard},
    Timeout, Waitable,
};
use core::fmt;
use std::{sync::PoisonError, time::Instant};

/// A gate that blocks waiting threads until it is signaled.
///
/// An `Event` is either *signaled* or *unsignaled*. Threads calling
/// [`wait`] on an unsignaled event block until another thread calls
/// [`set`], or until their [`Timeout`] elapses. What happens after a waiter
/// is released depends on the event's [`Reset`] mode:
///
/// - [`Reset::Manual`]: the signal stays set. Every thread that is waiting,
///   and every thread that waits later, passes through until [`reset`] is
///   called.
/// - [`Reset::Automatic`]: the first waiter to observe the signal clears it
///   again before returning, so each call to [`set`] releases exactly one
///   waiter.
///
/// # Examples
///
/// ```
/// use enoki_sync::{Event, Reset, Timeout};
/// use std::{sync::Arc, thread};
///
/// let event = Arc::new(Event::new(Reset::Manual));
/// assert!(!event.wait(Timeout::Immediate));
///
/// let waiter = thread::spawn({
///     let event = event.clone();
///     move || event.wait(Timeout::Infinite)
/// });
///
/// event.set();
/// assert!(waiter.join().unwrap());
/// // manual events stay signaled.
/// assert!(event.wait(Timeout::Immediate));
/// ```
///
/// [`wait`]: Self::wait
/// [`set`]: Self::set
/// [`reset`]: Self::reset
pub struct Event {
    signaled: Mutex<bool>,
    released: Condvar,
    reset: Reset,
}

/// Determines whether an [`Event`] clears its signal when a waiter passes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Reset {
    /// The event stays signaled until [`Event::reset`] is called.
    #[default]
    Manual,

    /// The event is cleared as soon as one waiter passes through it.
    Automatic,
}

// === impl Event ===

impl Event {
    /// Returns a new, unsignaled `Event` with the given [`Reset`] mode.
    #[must_use]
    pub fn new(reset: Reset) -> Self {
        Self::with_state(false, reset)
    }

    /// Returns a new `Event` with the given [`Reset`] mode that is already
    /// signaled.
    #[must_use]
    pub fn new_signaled(reset: Reset) -> Self {
        Self::with_state(true, reset)
    }

    fn with_state(signaled: bool, reset: Reset) -> Self {
        Self {
            signaled: Mutex::new(signaled),
            released: Condvar::new(),
            reset,
        }
    }

    /// Returns this event's [`Reset`] mode.
    #[must_use]
    #[inline]
    pub fn reset_mode(&self) -> Reset {
        self.reset
    }

    /// Returns `true` if this event clears itself when a waiter passes.
    #[must_use]
    #[inline]
    pub fn automatically_resets(&self) -> bool {
        self.reset == Reset::Automatic
    }

    /// Returns `true` if the event is currently signaled.
    ///
    /// Unlike a [`Timeout::Immediate`] [`wait`](Self::wait), this never
    /// consumes the signal of an automatically resetting event.
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        *self.lock()
    }

    /// Signals the event, releasing blocked waiters.
    ///
    /// A manually reset event releases every waiter; an automatically reset
    /// event releases one. Setting an event that is already signaled does
    /// nothing.
    pub fn set(&self) {
        let mut signaled = self.lock();
        if test_dbg!(*signaled) {
            return;
        }

        *signaled = true;
        trace!(event = ?self.reset, "Event::set");
        match self.reset {
            Reset::Manual => self.released.notify_all(),
            Reset::Automatic => self.released.notify_one(),
        }
    }

    /// Clears the signal, so that subsequent waiters block.
    pub fn reset(&self) {
        *self.lock() = false;
        trace!(event = ?self.reset, "Event::reset");
    }

    /// Blocks the calling thread until the event is signaled, or until
    /// `timeout` elapses.
    ///
    /// Returns `true` if the event was signaled before the timeout. If the
    /// event [resets automatically](Reset::Automatic), a successful wait
    /// clears the signal before returning.
    pub fn wait(&self, timeout: impl Into<Timeout>) -> bool {
        let timeout = timeout.into();
        let mut signaled = self.lock();

        match timeout.deadline(Instant::now()) {
            None => {
                while !*signaled {
                    signaled = self
                        .released
                        .wait(signaled)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            Some(deadline) => {
                while !*signaled {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }

                    let (guard, _) = self
                        .released
                        .wait_timeout(signaled, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    signaled = guard;
                }
            }
        }

        if !*signaled {
            test_debug!(?timeout, "Event::wait -> timed out");
            return false;
        }

        if self.reset == Reset::Automatic {
            *signaled = false;
        }

        true
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.signaled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Waitable for Event {
    #[inline]
    fn wait(&self, timeout: Timeout) -> bool {
        Event::wait(self, timeout)
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new(Reset::Manual)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("signaled", &self.is_signaled())
            .field("reset", &self.reset)
            .finish()
    }
}
