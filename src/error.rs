//! Errors produced by tasks.
use crate::cancel::Cancelled;
use core::{any::Any, fmt};
use enoki_sync::TimedOut;
use std::{error::Error, sync::Arc};

/// A boxed, thread-safe error, as returned by failing kernels.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// The error a faulted task finished with.
///
/// A `Fault` is shared: every caller of [`Task::value`](crate::Task::value)
/// on a faulted task, and every continuation that propagates the failure,
/// observes the same underlying error. It displays as the error it wraps.
#[derive(Clone)]
pub struct Fault(Arc<dyn Error + Send + Sync + 'static>);

/// Errors returned when retrieving a task's result.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TaskError {
    /// The task did not finish before the wait timed out.
    #[error("timed out waiting for the task to finish")]
    TimedOut(#[from] TimedOut),

    /// The task was cancelled.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// The task's kernel failed.
    #[error(transparent)]
    Faulted(Fault),

    /// The task finished with a value, but it was not of the requested type.
    #[error("task result is not a `{expected}`")]
    ValueCastFailed {
        /// The name of the type the caller asked for.
        expected: &'static str,
    },
}

/// The fault recorded when a kernel panics.
#[derive(Debug, thiserror::Error)]
#[error("task kernel panicked: {message}")]
pub struct Panicked {
    message: String,
}

// === impl Fault ===

impl Fault {
    /// Wraps `error` in a new fault.
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self::from(error.into())
    }

    /// Returns a reference to the wrapped error.
    #[must_use]
    pub fn get_ref(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0
    }

    /// Returns `true` if the wrapped error is an `E`.
    #[must_use]
    pub fn is<E: Error + 'static>(&self) -> bool {
        self.0.is::<E>()
    }

    /// Returns a reference to the wrapped error if it is an `E`.
    #[must_use]
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Returns `true` if both faults share the same underlying error.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Converting a [`TaskError::Faulted`] unwraps the fault it carries, so that
/// a failure flowing through a chain of tasks stays one shared fault.
impl From<BoxError> for Fault {
    fn from(error: BoxError) -> Self {
        match error.downcast::<TaskError>() {
            Ok(error) => match *error {
                TaskError::Faulted(fault) => fault,
                error => Self(Arc::new(error)),
            },
            Err(error) => Self(Arc::from(error)),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Fault").field(&self.0).finish()
    }
}

impl Error for Fault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

// === impl TaskError ===

impl TaskError {
    /// Returns `true` if this error is [`TaskError::TimedOut`].
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    /// Returns `true` if this error is [`TaskError::Cancelled`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns `true` if this error is [`TaskError::Faulted`].
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted(_))
    }

    /// Returns the fault, if the task faulted.
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Faulted(fault) => Some(fault),
            _ => None,
        }
    }

    pub(crate) fn value_cast_failed<U>() -> Self {
        Self::ValueCastFailed {
            expected: core::any::type_name::<U>(),
        }
    }
}

impl From<Fault> for TaskError {
    fn from(fault: Fault) -> Self {
        Self::Faulted(fault)
    }
}

// === impl Panicked ===

impl Panicked {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast_ref::<&'static str>() {
                Some(message) => (*message).to_owned(),
                None => "<non-string panic payload>".to_owned(),
            },
        };
        Self { message }
    }

    /// Returns the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Returns the [`Cancelled`] error `error` reports, if any.
pub(crate) fn as_cancelled<'a>(error: &'a (dyn Error + Send + Sync + 'static)) -> Option<&'a Cancelled> {
    if let Some(cancelled) = error.downcast_ref::<Cancelled>() {
        return Some(cancelled);
    }

    match error.downcast_ref::<TaskError>() {
        Some(TaskError::Cancelled(cancelled)) => Some(cancelled),
        _ => None,
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::CancellationSource;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn fault_displays_wrapped_error() {
        let fault = Fault::new(Boom);
        assert_eq!(fault.to_string(), "boom");
        assert!(fault.is::<Boom>());
        assert!(fault.downcast_ref::<Boom>().is_some());
        assert_eq!(TaskError::Faulted(fault).to_string(), "boom");
    }

    #[test]
    fn faulted_task_error_unwraps_into_same_fault() {
        let fault = Fault::new("boom");
        let boxed: BoxError = Box::new(TaskError::Faulted(fault.clone()));
        let rewrapped = Fault::from(boxed);
        assert!(rewrapped.ptr_eq(&fault));
    }

    #[test]
    fn other_task_errors_are_wrapped() {
        let source = CancellationSource::new();
        let boxed: BoxError = Box::new(TaskError::from(Cancelled::new(source.token())));
        let fault = Fault::from(boxed);
        assert!(fault.is::<TaskError>());
        assert!(as_cancelled(fault.get_ref()).is_some());
    }

    #[test]
    fn finds_cancellation() {
        let token = CancellationSource::new().token();
        let direct: BoxError = Box::new(Cancelled::new(token.clone()));
        assert_eq!(as_cancelled(&*direct).map(Cancelled::token), Some(&token));

        let nested: BoxError = Box::new(TaskError::Cancelled(Cancelled::new(token.clone())));
        assert_eq!(as_cancelled(&*nested).map(Cancelled::token), Some(&token));

        let other: BoxError = "boom".into();
        assert!(as_cancelled(&*other).is_none());
    }

    #[test]
    fn panic_payloads() {
        let owned = Panicked::from_payload(Box::new(String::from("owned")));
        assert_eq!(owned.message(), "owned");
        let borrowed = Panicked::from_payload(Box::new("borrowed"));
        assert_eq!(borrowed.message(), "borrowed");
        let other = Panicked::from_payload(Box::new(7u8));
        assert_eq!(other.message(), "<non-string panic payload>");
    }
}
