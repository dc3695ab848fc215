use crate::{
    cancel::CancellationToken,
    error::BoxError,
    kernel::{self, Kernel},
    options::TaskOptions,
    scheduler::{Schedule, Scheduler},
    task::Task,
};
use std::borrow::Cow;

/// Builds tasks that share a scheduler, options and cancellation token.
///
/// # Examples
///
/// ```
/// use enoki::{scheduler::Synchronous, CancellationSource, TaskFactory};
///
/// let source = CancellationSource::new();
/// let factory = TaskFactory::new()
///     .scheduler(Synchronous)
///     .cancellation_token(source.token())
///     .name("lookup");
///
/// let task = factory.start(|token| {
///     token.checkpoint()?;
///     Ok(42)
/// });
/// assert_eq!(task.name(), Some("lookup"));
/// assert_eq!(task.value().unwrap(), 42);
/// ```
#[derive(Clone, Debug)]
pub struct TaskFactory<S = Scheduler> {
    scheduler: S,
    options: TaskOptions,
    token: CancellationToken,
    name: Option<Cow<'static, str>>,
}

impl TaskFactory<Scheduler> {
    /// Returns a factory for the default [`Scheduler`], with no options and
    /// no cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::with_scheduler(Scheduler::default())
    }
}

impl Default for TaskFactory<Scheduler> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schedule> TaskFactory<S> {
    /// Returns a factory for `scheduler`, with no options and no
    /// cancellation token.
    #[must_use]
    pub fn with_scheduler(scheduler: S) -> Self {
        Self {
            scheduler,
            options: TaskOptions::DEFAULT,
            token: CancellationToken::NONE,
            name: None,
        }
    }

    /// Sets the scheduler tasks are started on.
    #[must_use]
    pub fn scheduler<S2: Schedule>(self, scheduler: S2) -> TaskFactory<S2> {
        TaskFactory {
            scheduler,
            options: self.options,
            token: self.token,
            name: self.name,
        }
    }

    /// Sets the options of the tasks this factory makes.
    #[must_use]
    pub fn options(self, options: TaskOptions) -> Self {
        Self { options, ..self }
    }

    /// Sets the cancellation token of the tasks this factory makes.
    #[must_use]
    pub fn cancellation_token(self, token: CancellationToken) -> Self {
        Self { token, ..self }
    }

    /// Names the tasks this factory makes.
    #[must_use]
    pub fn name(self, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Returns a new, unstarted task executing `kernel`.
    pub fn make_with_kernel<T: Send + 'static>(&self, kernel: impl Kernel<T> + 'static) -> Task<T> {
        Task::build(
            Box::new(kernel),
            self.options,
            self.token.clone(),
            self.name.clone(),
        )
    }

    /// Returns a new, unstarted task running `f`.
    pub fn make<T, F>(&self, f: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancellationToken) -> Result<T, BoxError> + Send + 'static,
    {
        self.make_with_kernel(kernel::from_fn(f))
    }

    /// Returns a task executing `kernel`, started on this factory's
    /// scheduler.
    pub fn start_with_kernel<T: Send + 'static>(&self, kernel: impl Kernel<T> + 'static) -> Task<T> {
        let task = self.make_with_kernel(kernel);
        task.start_on(&self.scheduler);
        task
    }

    /// Returns a task running `f`, started on this factory's scheduler.
    pub fn start<T, F>(&self, f: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancellationToken) -> Result<T, BoxError> + Send + 'static,
    {
        self.start_with_kernel(kernel::from_fn(f))
    }

    /// Like [`Task::continue_with`], but the continuation is scheduled on
    /// this factory's scheduler and gets its options, token and name.
    pub fn continue_with<T, U, F>(&self, antecedent: &Task<T>, handler: F) -> Task<U>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: FnOnce(&Task<T>) -> Result<U, BoxError> + Send + 'static,
    {
        antecedent.continuation(
            &self.scheduler,
            self.options,
            self.token.clone(),
            self.name.clone(),
            handler,
        )
    }

    /// Like [`Task::continue_for`], but the continuation is scheduled on
    /// this factory's scheduler and gets its options, token and name.
    ///
    /// When the factory's token is shared with the inner task, cancelling
    /// the inner task cancels the continuation too.
    pub fn continue_for<T, U, F>(&self, antecedent: &Task<T>, handler: F) -> Task<U>
    where
        T: Send + 'static,
        U: Clone + Send + 'static,
        F: FnOnce(&Task<T>) -> Result<Task<U>, BoxError> + Send + 'static,
    {
        antecedent.flattened_continuation(
            &self.scheduler,
            self.options,
            self.token.clone(),
            self.name.clone(),
            handler,
        )
    }
}

/// Starts a task running `f` on the default [`Scheduler`].
///
/// Shorthand for `TaskFactory::new().start(f)`.
pub fn start<T, F>(f: F) -> Task<T>
where
    T: Send + 'static,
    F: FnOnce(&CancellationToken) -> Result<T, BoxError> + Send + 'static,
{
    TaskFactory::new().start(f)
}
