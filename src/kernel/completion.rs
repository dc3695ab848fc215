use crate::{
    error::BoxError,
    loom::sync::{Arc, Mutex},
    util::unpoison,
};
use core::fmt;

/// A one-shot cell through which a kernel reports its result after it has
/// returned.
///
/// A kernel that cannot produce its result before returning creates a
/// `Completion`, hands a clone of it to whatever will finish the work, and
/// returns it in [`Outcome::Pending`](super::Outcome::Pending). The task
/// then finishes when the result is set.
///
/// # Panics
///
/// Setting the result of a `Completion` more than once panics.
pub struct Completion<T> {
    cell: Arc<Mutex<Cell<T>>>,
}

type Handler<T> = Box<dyn FnOnce(Result<T, BoxError>) + Send>;

struct Cell<T> {
    result: Option<Result<T, BoxError>>,
    handler: Option<Handler<T>>,
    is_complete: bool,
    has_handler: bool,
}

impl<T> Completion<T> {
    /// Returns a new, unresolved completion.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cell: Arc::new(Mutex::new(Cell {
                result: None,
                handler: None,
                is_complete: false,
                has_handler: false,
            })),
        }
    }

    /// Resolves this completion with a value.
    ///
    /// # Panics
    ///
    /// If the result was already set.
    #[track_caller]
    pub fn complete(&self, value: T) {
        self.set_result(Ok(value))
    }

    /// Resolves this completion with an error.
    ///
    /// # Panics
    ///
    /// If the result was already set.
    #[track_caller]
    pub fn fault(&self, error: impl Into<BoxError>) {
        self.set_result(Err(error.into()))
    }

    /// Resolves this completion with `result`.
    ///
    /// If the owning task is already waiting for the result, it finishes on
    /// the calling thread before this method returns.
    ///
    /// # Panics
    ///
    /// If the result was already set.
    #[track_caller]
    pub fn set_result(&self, result: Result<T, BoxError>) {
        let handler = {
            let mut cell = unpoison(self.cell.lock());
            assert!(
                !cell.is_complete,
                "the result of a `Completion` can only be set once"
            );
            cell.is_complete = true;
            match cell.handler.take() {
                Some(handler) => handler,
                None => {
                    cell.result = Some(result);
                    return;
                }
            }
        };

        handler(result);
    }

    /// Returns `true` once the result has been set.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        unpoison(self.cell.lock()).is_complete
    }

    /// Registers the function that receives the result.
    ///
    /// If the result is already available, `handler` runs immediately on the
    /// calling thread. Otherwise it runs on whichever thread sets the
    /// result.
    #[track_caller]
    pub(crate) fn on_complete(&self, handler: impl FnOnce(Result<T, BoxError>) + Send + 'static) {
        let result = {
            let mut cell = unpoison(self.cell.lock());
            assert!(
                !cell.has_handler,
                "a `Completion` can only be awaited by one task"
            );
            cell.has_handler = true;
            match cell.result.take() {
                Some(result) => result,
                None => {
                    cell.handler = Some(Box::new(handler));
                    return;
                }
            }
        };

        handler(result);
    }
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = unpoison(self.cell.lock());
        f.debug_struct("Completion")
            .field("is_complete", &cell.is_complete)
            .field("has_handler", &cell.has_handler)
            .finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn result_before_handler() {
        let completion = Completion::new();
        completion.complete(1);
        assert!(completion.is_complete());

        let (tx, rx) = mpsc::channel();
        completion.on_complete(move |result| tx.send(result.unwrap()).unwrap());
        assert_eq!(rx.try_recv().unwrap(), 1);
    }

    #[test]
    fn handler_before_result() {
        let completion = Completion::<u32>::new();
        let (tx, rx) = mpsc::channel();
        completion.on_complete(move |result| tx.send(result.unwrap_err().to_string()).unwrap());
        assert!(rx.try_recv().is_err());
        assert!(!completion.is_complete());

        completion.clone().fault("boom");
        assert_eq!(rx.try_recv().unwrap(), "boom");
    }

    #[test]
    #[should_panic(expected = "can only be set once")]
    fn double_completion_panics() {
        let completion = Completion::new();
        completion.complete(());
        completion.complete(());
    }

    #[test]
    #[should_panic(expected = "can only be awaited by one task")]
    fn double_handler_panics() {
        let completion = Completion::<()>::new();
        completion.on_complete(|_| {});
        completion.on_complete(|_| {});
    }
}
