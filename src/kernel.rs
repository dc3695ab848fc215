//! Task kernels: the units of work a [`Task`](crate::Task) executes.
//!
//! A kernel runs exactly once, and reports one of three [`Outcome`]s: it
//! produced a value, it failed, or it handed back a [`Completion`] that
//! will be resolved later, possibly from another thread.
//!
//! Most tasks are built from a closure with [`from_fn`] (or
//! [`Task::new`](crate::Task::new)). Kernels that bridge to callback-based
//! APIs use [`from_outcome_fn`] and return [`Outcome::Pending`].
use crate::{cancel::CancellationToken, error::BoxError};
use core::fmt;

mod completion;

pub use self::completion::Completion;

/// A unit of work that can be executed once.
pub trait Kernel<T>: Send {
    /// Runs the kernel.
    ///
    /// `token` is the cancellation token of the task executing the kernel.
    fn execute(self: Box<Self>, token: &CancellationToken) -> Outcome<T>;

    /// Returns `true` if the kernel is cheap enough that schedulers should
    /// run it inline rather than dispatching it elsewhere.
    fn prefers_synchronous(&self) -> bool {
        false
    }
}

/// The result of executing a [`Kernel`].
pub enum Outcome<T> {
    /// The kernel produced a value.
    Done(T),
    /// The kernel failed.
    Failed(BoxError),
    /// The kernel will finish later, by resolving this completion.
    Pending(Completion<T>),
}

/// A kernel that produces a value it already holds.
#[derive(Debug)]
pub struct ValueKernel<T>(T);

/// A kernel that fails with an error it already holds.
#[derive(Debug)]
pub struct ErrorKernel(BoxError);

/// A kernel that runs a closure returning a [`Result`].
///
/// Returned by [`from_fn`].
pub struct FnKernel<F>(F);

/// A kernel that runs a closure returning an [`Outcome`].
///
/// Returned by [`from_outcome_fn`].
pub struct OutcomeFnKernel<F>(F);

/// Returns a kernel that produces `value`.
///
/// The kernel prefers to run synchronously.
pub fn value<T: Send>(value: T) -> ValueKernel<T> {
    ValueKernel(value)
}

/// Returns a kernel that fails with `error`.
///
/// The kernel prefers to run synchronously.
pub fn error(error: impl Into<BoxError>) -> ErrorKernel {
    ErrorKernel(error.into())
}

/// Returns a kernel that calls `f`.
pub fn from_fn<T, F>(f: F) -> FnKernel<F>
where
    F: FnOnce(&CancellationToken) -> Result<T, BoxError> + Send,
{
    FnKernel(f)
}

/// Returns a kernel that calls `f`, which may defer its result by returning
/// [`Outcome::Pending`].
///
/// # Examples
///
/// ```
/// use enoki::{kernel::{self, Completion, Outcome}, Task};
/// use std::{thread, time::Duration};
///
/// let task = Task::with_kernel(kernel::from_outcome_fn(|_token| {
///     let completion = Completion::new();
///     let remote = completion.clone();
///     thread::spawn(move || {
///         thread::sleep(Duration::from_millis(10));
///         remote.complete("done");
///     });
///     Outcome::Pending(completion)
/// }));
///
/// task.start();
/// assert_eq!(task.value().unwrap(), "done");
/// ```
pub fn from_outcome_fn<T, F>(f: F) -> OutcomeFnKernel<F>
where
    F: FnOnce(&CancellationToken) -> Outcome<T> + Send,
{
    OutcomeFnKernel(f)
}

// === impl Outcome ===

impl<T> Outcome<T> {
    /// Returns `true` if this is [`Outcome::Pending`].
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T>
where
    E: Into<BoxError>,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Done(value),
            Err(error) => Self::Failed(error.into()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(value) => f.debug_tuple("Done").field(value).finish(),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
            Self::Pending(completion) => f.debug_tuple("Pending").field(completion).finish(),
        }
    }
}

// === impl ValueKernel ===

impl<T: Send> Kernel<T> for ValueKernel<T> {
    fn execute(self: Box<Self>, _: &CancellationToken) -> Outcome<T> {
        Outcome::Done(self.0)
    }

    fn prefers_synchronous(&self) -> bool {
        true
    }
}

// === impl ErrorKernel ===

impl<T> Kernel<T> for ErrorKernel {
    fn execute(self: Box<Self>, _: &CancellationToken) -> Outcome<T> {
        Outcome::Failed(self.0)
    }

    fn prefers_synchronous(&self) -> bool {
        true
    }
}

// === impl FnKernel ===

impl<T, F> Kernel<T> for FnKernel<F>
where
    F: FnOnce(&CancellationToken) -> Result<T, BoxError> + Send,
{
    fn execute(self: Box<Self>, token: &CancellationToken) -> Outcome<T> {
        (self.0)(token).into()
    }
}

impl<F> fmt::Debug for FnKernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnKernel")
            .field(&core::any::type_name::<F>())
            .finish()
    }
}

// === impl OutcomeFnKernel ===

impl<T, F> Kernel<T> for OutcomeFnKernel<F>
where
    F: FnOnce(&CancellationToken) -> Outcome<T> + Send,
{
    fn execute(self: Box<Self>, token: &CancellationToken) -> Outcome<T> {
        (self.0)(token)
    }
}

impl<F> fmt::Debug for OutcomeFnKernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OutcomeFnKernel")
            .field(&core::any::type_name::<F>())
            .finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::CancellationSource;

    fn run<T>(kernel: impl Kernel<T> + 'static) -> Outcome<T> {
        Box::new(kernel).execute(&CancellationToken::NONE)
    }

    #[test]
    fn value_and_error_kernels_prefer_sync() {
        assert!(Kernel::<i32>::prefers_synchronous(&value(1)));
        assert!(Kernel::<i32>::prefers_synchronous(&error("boom")));
        assert!(!Kernel::<i32>::prefers_synchronous(&from_fn(|_| Ok(1))));
    }

    #[test]
    fn value_kernel_produces_value() {
        assert!(matches!(run(value(42)), Outcome::Done(42)));
    }

    #[test]
    fn error_kernel_fails() {
        match run::<()>(error("boom")) {
            Outcome::Failed(error) => assert_eq!(error.to_string(), "boom"),
            outcome => panic!("unexpected outcome {outcome:?}"),
        }
    }

    #[test]
    fn fn_kernel_sees_token() {
        let source = CancellationSource::new();
        let token = source.token();
        source.cancel();
        let kernel = Box::new(from_fn(|token: &CancellationToken| {
            token.checkpoint()?;
            Ok(())
        }));
        match kernel.execute(&token) {
            Outcome::Failed(error) => {
                let cancelled = error.downcast_ref::<crate::Cancelled>().unwrap();
                assert_eq!(cancelled.token(), &token);
            }
            outcome => panic!("unexpected outcome {outcome:?}"),
        }
    }

    #[test]
    fn outcome_fn_may_defer() {
        let outcome = run(from_outcome_fn(|_| Outcome::Pending(Completion::<u8>::new())));
        assert!(outcome.is_pending());
    }
}
