//! Tasks: deferred units of work with an observable lifecycle.
//!
//! A [`Task`] wraps a [`Kernel`]. Starting the task hands it to a
//! [`Schedule`]r, which runs the kernel and reports each [`Phase`] of the
//! run back to the task. The task folds those reports into its [`Status`],
//! wakes anyone blocked in [`Task::value`] once it reaches a final status,
//! and then starts the continuations that were registered on it.
use crate::{
    cancel::{CancellationToken, Cancelled},
    error::{self, BoxError, Fault, Panicked, TaskError},
    kernel::{self, Completion, Kernel, Outcome},
    loom::sync::{Arc, Mutex, MutexGuard},
    options::TaskOptions,
    scheduler::{Observer, Phase, Schedule, Scheduler},
    status::{Status, StatusKind},
    util::unpoison,
};
use core::{fmt, mem, panic::AssertUnwindSafe};
use enoki_sync::{Event, Reset, Timeout, Waitable};
use std::{borrow::Cow, panic};

mod id;

pub use self::id::TaskId;

/// A handle to a deferred unit of work.
///
/// `Task` is a cheap, reference-counted handle: clones refer to the same
/// task. A task is created in [`Status::Created`] and does nothing until it
/// is started with [`start`](Self::start) or [`start_on`](Self::start_on).
///
/// # Examples
///
/// ```
/// use enoki::{scheduler::Synchronous, Task};
///
/// let task = Task::new(|_token| Ok(6 * 7));
/// task.start_on(&Synchronous);
/// assert_eq!(task.value().unwrap(), 42);
/// ```
pub struct Task<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    id: TaskId,
    name: Option<Cow<'static, str>>,
    options: TaskOptions,
    prefers_synchronous: bool,
    kernel: Mutex<Option<Box<dyn Kernel<T>>>>,
    token: Mutex<CancellationToken>,
    state: Mutex<State<T>>,
    /// Released once the task reaches a final status.
    finished: Event,
    span: tracing::Span,
}

struct State<T> {
    status: Status<T>,
    started: bool,
    continuations: Vec<Continuation>,
}

type Continuation = Box<dyn FnOnce() + Send>;

// === impl Task ===

impl<T: Send + 'static> Task<T> {
    /// Returns a new task that runs `f`.
    ///
    /// `f` receives the task's cancellation token. Returning an error faults
    /// the task, unless the error is a [`Cancelled`] carrying the task's own
    /// token, which cancels it.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&CancellationToken) -> Result<T, BoxError> + Send + 'static,
    {
        Self::with_kernel(kernel::from_fn(f))
    }

    /// Returns a new task that completes with `value`.
    pub fn from_value(value: T) -> Self {
        Self::with_kernel(kernel::value(value))
    }

    /// Returns a new task that faults with `error`.
    pub fn from_error(error: impl Into<BoxError>) -> Self {
        Self::with_kernel(kernel::error(error))
    }

    /// Returns a new task that executes `kernel`.
    pub fn with_kernel(kernel: impl Kernel<T> + 'static) -> Self {
        Self::build(
            Box::new(kernel),
            TaskOptions::DEFAULT,
            CancellationToken::NONE,
            None,
        )
    }

    pub(crate) fn build(
        kernel: Box<dyn Kernel<T>>,
        options: TaskOptions,
        token: CancellationToken,
        name: Option<Cow<'static, str>>,
    ) -> Self {
        let id = TaskId::next();
        let span = tracing::debug_span!(
            "task",
            task.id = id.as_u64(),
            task.name = name.as_deref()
        );
        let prefers_synchronous = kernel.prefers_synchronous();
        Self {
            inner: Arc::new(Inner {
                id,
                name,
                options,
                prefers_synchronous,
                kernel: Mutex::new(Some(kernel)),
                token: Mutex::new(token),
                state: Mutex::new(State {
                    status: Status::Created,
                    started: false,
                    continuations: Vec::new(),
                }),
                finished: Event::new(Reset::Manual),
                span,
            }),
        }
    }

    /// Starts the task on the default [`Scheduler`].
    ///
    /// See [`start_on`](Self::start_on).
    pub fn start(&self) {
        self.start_on(&Scheduler::default())
    }

    /// Starts the task on `scheduler`.
    ///
    /// A task is started at most once: if it was already started, this does
    /// nothing, even when called concurrently from several threads.
    pub fn start_on<S: Schedule>(&self, scheduler: &S) {
        let _span = self.inner.span.enter();
        {
            let mut state = self.lock_state();
            if state.started || !state.status.is_created() {
                tracing::debug!(status = %state.status.kind(), "task already started");
                return;
            }
            state.started = true;
        }

        tracing::debug!(options = ?self.inner.options, "starting task");
        scheduler.schedule(self, Observer::new(self.clone()));
    }

    /// Executes the task's kernel on the calling thread and returns its
    /// outcome.
    ///
    /// This is the hook through which a [`Schedule`] implementation runs a
    /// task; the outcome must be reported back through the [`Observer`] the
    /// scheduler was given. A panicking kernel produces a failed outcome
    /// carrying a [`Panicked`] error.
    ///
    /// # Panics
    ///
    /// If the kernel was already executed.
    #[track_caller]
    pub fn execute(&self) -> Outcome<T> {
        let kernel = unpoison(self.inner.kernel.lock()).take();
        let Some(kernel) = kernel else {
            panic!("the kernel of task {} was executed more than once", self.inner.id);
        };
        let token = self.cancellation_token();

        let _span = self.inner.span.enter();
        tracing::trace!("executing kernel");
        match panic::catch_unwind(AssertUnwindSafe(move || kernel.execute(&token))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let panicked = Panicked::from_payload(payload);
                tracing::warn!(%panicked, "task kernel panicked");
                Outcome::Failed(Box::new(panicked))
            }
        }
    }

    /// Registers a continuation that runs `handler` on `scheduler` once this
    /// task reaches a final status, and returns the continuation's task.
    ///
    /// `handler` receives this task, so it can inspect its status or
    /// retrieve its value. If this task is already final, the continuation
    /// is started before this method returns.
    ///
    /// Continuations registered before the task becomes final are started
    /// in registration order. A continuation registered once the task is
    /// final is started right away, even if continuations registered
    /// earlier are still waiting to be started by the thread that finished
    /// the task. This includes a continuation registered from inside
    /// another continuation's handler.
    pub fn continue_with<U, S, F>(&self, scheduler: &S, handler: F) -> Task<U>
    where
        U: Send + 'static,
        S: Schedule,
        F: FnOnce(&Task<T>) -> Result<U, BoxError> + Send + 'static,
    {
        self.continuation(
            scheduler,
            TaskOptions::DEFAULT,
            CancellationToken::NONE,
            None,
            handler,
        )
    }

    /// Like [`continue_with`](Self::continue_with), on the
    /// [main](Scheduler::main) scheduler.
    pub fn continue_on_main<U, F>(&self, handler: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(&Task<T>) -> Result<U, BoxError> + Send + 'static,
    {
        self.continue_with(&Scheduler::main(), handler)
    }

    /// Registers a continuation whose `handler` returns another task, and
    /// returns a task that finishes the way that inner task finishes.
    ///
    /// The inner task is started on the default scheduler if `handler`
    /// returns it unstarted. The continuation does not occupy a thread of
    /// `scheduler` while the inner task runs.
    pub fn continue_for<U, S, F>(&self, scheduler: &S, handler: F) -> Task<U>
    where
        U: Clone + Send + 'static,
        S: Schedule,
        F: FnOnce(&Task<T>) -> Result<Task<U>, BoxError> + Send + 'static,
    {
        self.flattened_continuation(
            scheduler,
            TaskOptions::DEFAULT,
            CancellationToken::NONE,
            None,
            handler,
        )
    }

    pub(crate) fn continuation<U, S, F>(
        &self,
        scheduler: &S,
        options: TaskOptions,
        token: CancellationToken,
        name: Option<Cow<'static, str>>,
        handler: F,
    ) -> Task<U>
    where
        U: Send + 'static,
        S: Schedule,
        F: FnOnce(&Task<T>) -> Result<U, BoxError> + Send + 'static,
    {
        let antecedent = self.clone();
        let kernel = kernel::from_fn(move |_| handler(&antecedent));
        self.chain(scheduler, Task::build(Box::new(kernel), options, token, name))
    }

    /// Like [`continuation`](Self::continuation), but `handler` returns an
    /// inner task and the continuation finishes the way the inner task
    /// does.
    pub(crate) fn flattened_continuation<U, S, F>(
        &self,
        scheduler: &S,
        options: TaskOptions,
        token: CancellationToken,
        name: Option<Cow<'static, str>>,
        handler: F,
    ) -> Task<U>
    where
        U: Clone + Send + 'static,
        S: Schedule,
        F: FnOnce(&Task<T>) -> Result<Task<U>, BoxError> + Send + 'static,
    {
        let antecedent = self.clone();
        let kernel = kernel::from_outcome_fn(move |_| match handler(&antecedent) {
            Ok(inner) => forward(inner),
            Err(error) => Outcome::Failed(error),
        });
        self.chain(scheduler, Task::build(Box::new(kernel), options, token, name))
    }

    fn chain<U: Send + 'static, S: Schedule>(&self, scheduler: &S, continuation: Task<U>) -> Task<U> {
        let _span = self.inner.span.enter();
        tracing::trace!(continuation.id = continuation.id().as_u64(), "adding continuation");
        let scheduler = scheduler.clone();
        let task = continuation.clone();
        self.add_continuation(Box::new(move || task.start_on(&scheduler)));
        continuation
    }

    /// Runs `continuation` once the task is final; immediately, if it
    /// already is.
    fn add_continuation(&self, continuation: Continuation) {
        let mut state = self.lock_state();
        if state.status.is_final() {
            drop(state);
            continuation();
        } else {
            state.continuations.push(continuation);
        }
    }

    /// Folds a phase reported by the task's scheduler into its status.
    pub(crate) fn observe(&self, phase: Phase<T>) {
        let _span = self.inner.span.enter();
        let status = match phase {
            Phase::Scheduled => return self.advance(Status::Scheduled),
            Phase::Started => return self.advance(Status::Running),
            Phase::Completed(value) => Status::Completed(value),
            Phase::Failed(error) => self.classify(error),
            Phase::Pending(completion) => {
                tracing::trace!("kernel will complete asynchronously");
                let task = self.clone();
                completion.on_complete(move |result| {
                    task.observe(match result {
                        Ok(value) => Phase::Completed(value),
                        Err(error) => Phase::Failed(error),
                    })
                });
                return;
            }
        };

        self.finalize(status);
    }

    fn advance(&self, status: Status<T>) {
        let mut state = self.lock_state();
        let (from, to) = (state.status.kind(), status.kind());
        if from.rank() < to.rank() {
            tracing::trace!(%from, %to, "task status changed");
            state.status = status;
        } else {
            tracing::trace!(%from, %to, "ignoring stale status transition");
        }
    }

    /// A failure is a cancellation only if it carries this task's own
    /// token.
    fn classify(&self, error: BoxError) -> Status<T> {
        let token = self.cancellation_token();
        if let Some(cancelled) = error::as_cancelled(&*error) {
            if test_dbg!(*cancelled.token() == token) {
                return Status::Cancelled;
            }
            tracing::debug!(
                ?token,
                observed = ?cancelled.token(),
                "kernel was cancelled through another token"
            );
        }

        Status::Faulted(Fault::from(error))
    }

    fn finalize(&self, status: Status<T>) {
        let kind = status.kind();
        let continuations = {
            let mut state = self.lock_state();
            if state.status.is_final() {
                tracing::warn!(
                    status = %state.status.kind(),
                    ignored = %kind,
                    "task already finished; ignoring result"
                );
                return;
            }
            state.status = status;
            mem::take(&mut state.continuations)
        };

        tracing::debug!(status = %kind, continuations = continuations.len(), "task finished");
        self.inner.finished.set();
        for continuation in continuations {
            continuation();
        }
    }
}

impl<T> Task<T> {
    /// Returns this task's unique ID.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Returns this task's name, if it was given one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Returns the scheduling hints this task was created with.
    #[must_use]
    pub fn options(&self) -> TaskOptions {
        self.inner.options
    }

    /// Returns `true` if this task's kernel prefers to run inline.
    #[must_use]
    pub fn prefers_synchronous(&self) -> bool {
        self.inner.prefers_synchronous
    }

    /// Returns this task's cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        unpoison(self.inner.token.lock()).clone()
    }

    /// Replaces this task's cancellation token.
    ///
    /// The kernel receives whichever token is set when it starts executing.
    pub fn set_cancellation_token(&self, token: CancellationToken) {
        *unpoison(self.inner.token.lock()) = token;
    }

    /// Returns the kind of this task's current status.
    #[must_use]
    pub fn status_kind(&self) -> StatusKind {
        self.lock_state().status.kind()
    }

    /// Returns `true` once the task has reached a final status.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.status_kind().is_final()
    }

    /// Returns a [`Waitable`] that releases its waiters once this task
    /// reaches a final status.
    #[must_use]
    pub fn awaiter(&self) -> &dyn Waitable {
        &self.inner.finished
    }

    fn lock_state(&self) -> MutexGuard<'_, State<T>> {
        unpoison(self.inner.state.lock())
    }
}

impl<T: Clone> Task<T> {
    /// Returns a snapshot of this task's status.
    #[must_use]
    pub fn status(&self) -> Status<T> {
        self.lock_state().status.clone()
    }

    /// Blocks until the task is final, then returns its value.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Faulted`] if the kernel failed.
    /// - [`TaskError::Cancelled`] carrying the task's token, if the task
    ///   was cancelled.
    pub fn value(&self) -> Result<T, TaskError> {
        self.value_within(Timeout::Infinite)
    }

    /// Like [`value`](Self::value), but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// As [`value`](Self::value), and [`TaskError::TimedOut`] if the task
    /// was not final before the timeout elapsed.
    pub fn value_within(&self, timeout: impl Into<Timeout>) -> Result<T, TaskError> {
        self.inner.finished.wait_for(timeout.into())?;
        self.result()
    }

    fn result(&self) -> Result<T, TaskError> {
        match self.status() {
            Status::Completed(value) => Ok(value),
            Status::Faulted(fault) => Err(TaskError::Faulted(fault)),
            Status::Cancelled => Err(Cancelled::new(self.cancellation_token()).into()),
            status => unreachable!(
                "task {} has no result while {}",
                self.inner.id,
                status.kind()
            ),
        }
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> PartialEq for Task<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for Task<T> {}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("status", &self.status_kind())
            .field("options", &self.inner.options)
            .finish()
    }
}

/// Hands back a completion that resolves once `inner` is final, with its
/// value or the error it finished with.
fn forward<U: Clone + Send + 'static>(inner: Task<U>) -> Outcome<U> {
    let completion = Completion::new();
    let remote = completion.clone();
    let finished = inner.clone();
    inner.add_continuation(Box::new(move || {
        remote.set_result(finished.result().map_err(BoxError::from))
    }));
    inner.start();
    Outcome::Pending(completion)
}
