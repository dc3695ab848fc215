//! Schedulers decide where and when a task's kernel runs.
//!
//! A scheduler receives a started [`Task`] along with an [`Observer`], and
//! must report the [`Phase`]s of the run through the observer, in order:
//!
//! 1. [`Phase::Scheduled`], once the task has been accepted.
//! 2. [`Phase::Started`], right before the kernel executes.
//! 3. exactly one terminal phase: the [`Outcome`] of
//!    [`Task::execute`], converted with [`Phase::from`].
//!
//! This crate provides two schedulers: [`Synchronous`], which runs
//! everything inline on the thread that starts the task, and
//! [`QueueScheduler`], which dispatches kernels to a [`Queue`]. The
//! [`Scheduler`] enum selects between them at runtime, and is what most of
//! the crate's APIs use by default.
use crate::{
    error::BoxError,
    kernel::{Completion, Outcome},
    queue::Queue,
    task::Task,
    util::unpoison,
};
use core::fmt;
use once_cell::sync::Lazy;
use std::sync::RwLock;

mod queue;

pub use self::queue::QueueScheduler;

/// A policy for running tasks.
///
/// Schedulers are cheap handles: they are cloned into every continuation
/// that is registered to run on them.
pub trait Schedule: Clone + Send + Sync + 'static {
    /// Runs `task`, reporting its progress through `observer`.
    ///
    /// This may run the task inline, or arrange for it to run later on
    /// another thread.
    fn schedule<T: Send + 'static>(&self, task: &Task<T>, observer: Observer<T>);
}

/// A step in a task's execution, as reported by its scheduler.
pub enum Phase<T> {
    /// The scheduler accepted the task.
    Scheduled,
    /// The kernel is about to execute.
    Started,
    /// The kernel produced a value.
    Completed(T),
    /// The kernel failed.
    Failed(BoxError),
    /// The kernel deferred its result to a [`Completion`].
    Pending(Completion<T>),
}

/// The channel through which a scheduler reports a task's [`Phase`]s.
pub struct Observer<T> {
    task: Task<T>,
}

/// Runs every task inline on the thread that starts it.
///
/// A task started on this scheduler is final by the time
/// [`Task::start_on`] returns, unless its kernel defers its result.
#[derive(Copy, Clone, Debug, Default)]
pub struct Synchronous;

/// A runtime choice between the schedulers this crate provides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scheduler {
    /// See [`Synchronous`].
    Synchronous(Synchronous),
    /// See [`QueueScheduler`].
    Queue(QueueScheduler),
}

static DEFAULT: Lazy<RwLock<Scheduler>> = Lazy::new(|| RwLock::new(Scheduler::global()));

/// Reports [`Phase::Started`], executes `task`'s kernel on the calling
/// thread, and reports the outcome.
///
/// This is the common tail of every scheduler: once a scheduler has decided
/// where the task runs, it calls this there.
pub fn run<T: Send + 'static>(task: &Task<T>, observer: &Observer<T>) {
    observer.notify(Phase::Started);
    let outcome = task.execute();
    observer.notify(outcome.into());
}

// === impl Phase ===

impl<T> From<Outcome<T>> for Phase<T> {
    fn from(outcome: Outcome<T>) -> Self {
        match outcome {
            Outcome::Done(value) => Self::Completed(value),
            Outcome::Failed(error) => Self::Failed(error),
            Outcome::Pending(completion) => Self::Pending(completion),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Phase<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => f.write_str("Scheduled"),
            Self::Started => f.write_str("Started"),
            Self::Completed(value) => f.debug_tuple("Completed").field(value).finish(),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
            Self::Pending(completion) => f.debug_tuple("Pending").field(completion).finish(),
        }
    }
}

// === impl Observer ===

impl<T: Send + 'static> Observer<T> {
    pub(crate) fn new(task: Task<T>) -> Self {
        Self { task }
    }

    /// Reports `phase` to the observed task.
    ///
    /// Phases that would move the task's status backwards, and anything
    /// reported after the task finished, are ignored.
    pub fn notify(&self, phase: Phase<T>) {
        self.task.observe(phase)
    }
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            task: self.task.clone(),
        }
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("task", &self.task.id())
            .finish()
    }
}

// === impl Synchronous ===

impl Schedule for Synchronous {
    fn schedule<T: Send + 'static>(&self, task: &Task<T>, observer: Observer<T>) {
        observer.notify(Phase::Scheduled);
        run(task, &observer);
    }
}

// === impl Scheduler ===

impl Scheduler {
    /// Returns a scheduler that runs tasks inline.
    #[must_use]
    pub fn synchronous() -> Self {
        Self::Synchronous(Synchronous)
    }

    /// Returns a scheduler that dispatches tasks to `queue`.
    #[must_use]
    pub fn on(queue: &Queue) -> Self {
        Self::Queue(QueueScheduler::new(queue.clone()))
    }

    /// Returns a scheduler for the [global queue](Queue::global).
    #[must_use]
    pub fn global() -> Self {
        Self::on(Queue::global())
    }

    /// Returns a scheduler for the [main queue](Queue::main).
    #[must_use]
    pub fn main() -> Self {
        Self::on(Queue::main())
    }

    /// Replaces the process-wide default scheduler returned by
    /// [`Scheduler::default`].
    ///
    /// Tasks that were already started keep running where they were
    /// scheduled.
    pub fn set_default(scheduler: Scheduler) {
        tracing::debug!(?scheduler, "setting default scheduler");
        *unpoison(DEFAULT.write()) = scheduler;
    }
}

/// Returns the process-wide default scheduler.
///
/// Unless it was replaced with [`Scheduler::set_default`], this is
/// [`Scheduler::global`].
impl Default for Scheduler {
    fn default() -> Self {
        unpoison(DEFAULT.read()).clone()
    }
}

impl Schedule for Scheduler {
    fn schedule<T: Send + 'static>(&self, task: &Task<T>, observer: Observer<T>) {
        match self {
            Self::Synchronous(scheduler) => scheduler.schedule(task, observer),
            Self::Queue(scheduler) => scheduler.schedule(task, observer),
        }
    }
}

impl From<Synchronous> for Scheduler {
    fn from(scheduler: Synchronous) -> Self {
        Self::Synchronous(scheduler)
    }
}

impl From<QueueScheduler> for Scheduler {
    fn from(scheduler: QueueScheduler) -> Self {
        Self::Queue(scheduler)
    }
}

impl PartialEq for Synchronous {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl Eq for Synchronous {}
