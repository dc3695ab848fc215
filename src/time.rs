//! Tasks that complete after a delay.
use crate::{
    kernel::{self, Completion, Outcome},
    queue::Queue,
    scheduler::Synchronous,
    task::Task,
};
use std::time::Duration;

/// Returns a started task that completes once `duration` has elapsed.
///
/// The delay is timed by the [global queue](Queue::global). No thread is
/// blocked while waiting; continuations of the returned task run on the
/// queue's worker when the delay elapses.
///
/// # Examples
///
/// ```
/// use enoki::scheduler::Synchronous;
/// use std::time::Duration;
///
/// let after = enoki::delay(Duration::from_millis(10))
///     .continue_with(&Synchronous, |_| Ok("later"));
/// assert_eq!(after.value().unwrap(), "later");
/// ```
pub fn delay(duration: Duration) -> Task<()> {
    delay_on(Queue::global(), duration)
}

/// Like [`delay`], but timed by `queue`, on which the task completes.
pub fn delay_on(queue: &Queue, duration: Duration) -> Task<()> {
    let queue = queue.clone();
    let task = Task::with_kernel(kernel::from_outcome_fn(move |_| {
        let completion = Completion::new();
        let remote = completion.clone();
        tracing::trace!(queue = %queue.name(), ?duration, "delaying");
        queue.run_after(duration, move || remote.complete(()));
        Outcome::Pending(completion)
    }));
    task.start_on(&Synchronous);
    task
}
