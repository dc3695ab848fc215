//! Type-erased access to tasks.
use crate::{
    cancel::CancellationToken,
    error::TaskError,
    options::TaskOptions,
    scheduler::Scheduler,
    status::StatusKind,
    task::{Task, TaskId},
};
use core::any::Any;
use enoki_sync::{Timeout, Waitable};

/// A [`Task`] whose result type has been erased.
///
/// This lets tasks with different result types be stored together, for
/// example to start them as a batch or wait for all of them:
///
/// ```
/// use enoki::{scheduler::Scheduler, Operation, Task, Timeout};
///
/// let operations: Vec<Box<dyn Operation>> = vec![
///     Box::new(Task::from_value(1u32)),
///     Box::new(Task::from_value("two")),
/// ];
/// for operation in &operations {
///     operation.start_on(&Scheduler::synchronous());
/// }
///
/// let first = operations[0].value_as::<u32>(Timeout::Infinite).unwrap();
/// assert_eq!(first, 1);
/// assert!(operations[1].value_as::<u32>(Timeout::Infinite).is_err());
/// ```
pub trait Operation: Send + Sync {
    /// Returns the task's ID.
    fn id(&self) -> TaskId;

    /// Returns the kind of the task's current status.
    fn status_kind(&self) -> StatusKind;

    /// Returns the task's scheduling hints.
    fn options(&self) -> TaskOptions;

    /// Returns the task's cancellation token.
    fn cancellation_token(&self) -> CancellationToken;

    /// Replaces the task's cancellation token.
    fn set_cancellation_token(&self, token: CancellationToken);

    /// Starts the task on `scheduler`, unless it was already started.
    fn start_on(&self, scheduler: &Scheduler);

    /// Starts the task on the default [`Scheduler`], unless it was already
    /// started.
    fn start(&self) {
        self.start_on(&Scheduler::default())
    }

    /// Returns a [`Waitable`] that releases its waiters once the task is
    /// final.
    fn awaiter(&self) -> &dyn Waitable;

    /// Waits up to `timeout` for the task to finish, and returns its value,
    /// boxed.
    ///
    /// # Errors
    ///
    /// As [`Task::value_within`].
    fn any_value(&self, timeout: Timeout) -> Result<Box<dyn Any + Send>, TaskError>;
}

impl<'a> dyn Operation + 'a {
    /// Waits up to `timeout` for the task to finish, and returns its value
    /// as a `U`.
    ///
    /// # Errors
    ///
    /// As [`Task::value_within`], and [`TaskError::ValueCastFailed`] if the
    /// task's value is not a `U`.
    pub fn value_as<U: Any>(&self, timeout: impl Into<Timeout>) -> Result<U, TaskError> {
        self.any_value(timeout.into())?
            .downcast::<U>()
            .map(|value| *value)
            .map_err(|_| TaskError::value_cast_failed::<U>())
    }
}

impl<T> Operation for Task<T>
where
    T: Clone + Send + 'static,
{
    fn id(&self) -> TaskId {
        Task::id(self)
    }

    fn status_kind(&self) -> StatusKind {
        Task::status_kind(self)
    }

    fn options(&self) -> TaskOptions {
        Task::options(self)
    }

    fn cancellation_token(&self) -> CancellationToken {
        Task::cancellation_token(self)
    }

    fn set_cancellation_token(&self, token: CancellationToken) {
        Task::set_cancellation_token(self, token)
    }

    fn start_on(&self, scheduler: &Scheduler) {
        Task::start_on(self, scheduler)
    }

    fn awaiter(&self) -> &dyn Waitable {
        Task::awaiter(self)
    }

    fn any_value(&self, timeout: Timeout) -> Result<Box<dyn Any + Send>, TaskError> {
        let value = self.value_within(timeout)?;
        Ok(Box::new(value))
    }
}
