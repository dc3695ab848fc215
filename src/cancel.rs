//! Cooperative cancellation.
//!
//! A [`CancellationSource`] owns a cancellation flag; the
//! [`CancellationToken`]s it hands out let task kernels observe that flag
//! without being able to raise it. Cancellation is purely cooperative: a
//! kernel notices a request by polling
//! [`CancellationToken::is_cancellation_requested`], or by calling
//! [`CancellationToken::checkpoint`] and propagating the resulting
//! [`Cancelled`] error out of the kernel. A task whose kernel fails with a
//! [`Cancelled`] error carrying the task's own token finishes as
//! [`Status::Cancelled`](crate::Status::Cancelled) rather than faulting.
use crate::loom::sync::{
    atomic::{AtomicBool, Ordering::*},
    Arc,
};
use core::{
    fmt,
    hash::{Hash, Hasher},
};

/// The owner of a cancellation flag.
///
/// Cloning a source produces another handle to the *same* flag: cancelling
/// through any clone cancels every token issued by any of them.
#[derive(Clone)]
pub struct CancellationSource {
    flag: Arc<Flag>,
}

/// A read-only view of a [`CancellationSource`]'s flag, or of no source at
/// all.
///
/// Two tokens are equal if and only if they were issued by the same source.
/// A token with no source ([`CancellationToken::NONE`]) is never equal to
/// anything, including another `NONE` token, so this type implements
/// [`PartialEq`] but not [`Eq`]. It does implement [`Hash`], consistently
/// with that equality. To key a map by token source, use
/// [`CancellationToken::source_id`].
#[derive(Clone, Default)]
pub struct CancellationToken {
    source: Option<Arc<Flag>>,
}

/// Identifies the [`CancellationSource`] that issued a token.
///
/// Unlike tokens, source IDs are [`Eq`], so they can be used as map keys.
/// An ID keeps its source's flag alive, so it is never reused for another
/// source.
#[derive(Clone)]
pub struct SourceId(Arc<Flag>);

/// The error a kernel returns when it stops because cancellation was
/// requested.
///
/// It carries the token whose cancellation was observed. The task only
/// treats the error as a cancellation if this token is equal to the task's
/// own token; otherwise, the task faults with this error.
#[derive(Clone, Debug, thiserror::Error)]
#[error("the operation was cancelled")]
pub struct Cancelled {
    token: CancellationToken,
}

struct Flag {
    cancelled: AtomicBool,
}

// === impl CancellationSource ===

impl CancellationSource {
    /// Returns a new source whose flag is not raised.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(Flag {
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Returns a token observing this source.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            source: Some(self.flag.clone()),
        }
    }

    /// Requests cancellation of every token issued by this source.
    ///
    /// Cancelling an already cancelled source does nothing.
    pub fn cancel(&self) {
        if !self.flag.cancelled.swap(true, AcqRel) {
            tracing::debug!(source = ?self, "cancellation requested");
        }
    }

    /// Returns `true` if [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.cancelled.load(Acquire)
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSource")
            .field("flag", &(&*self.flag as *const Flag))
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// === impl CancellationToken ===

impl CancellationToken {
    /// A token that is never cancelled and equals no other token.
    pub const NONE: Self = Self { source: None };

    /// Returns [`CancellationToken::NONE`].
    #[must_use]
    pub const fn none() -> Self {
        Self::NONE
    }

    /// Returns `true` if this token has no source.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.source.is_none()
    }

    /// Returns the ID of the source that issued this token, or `None` for
    /// [`CancellationToken::NONE`].
    #[must_use]
    pub fn source_id(&self) -> Option<SourceId> {
        self.source.clone().map(SourceId)
    }

    /// Returns `true` if this token's source has been cancelled.
    ///
    /// Always `false` for [`CancellationToken::NONE`].
    #[must_use]
    pub fn is_cancellation_requested(&self) -> bool {
        self.source
            .as_ref()
            .map(|flag| flag.cancelled.load(Acquire))
            .unwrap_or(false)
    }

    /// Returns a [`Cancelled`] error carrying this token if cancellation has
    /// been requested.
    ///
    /// Kernels call this at the points where they are willing to stop, and
    /// propagate the error with `?`:
    ///
    /// ```
    /// use enoki::{CancellationSource, Task};
    ///
    /// let source = CancellationSource::new();
    /// let task = Task::new(|token| {
    ///     token.checkpoint()?;
    ///     Ok("finished")
    /// });
    /// task.set_cancellation_token(source.token());
    /// source.cancel();
    ///
    /// task.start_on(&enoki::scheduler::Synchronous);
    /// assert!(task.status().is_cancelled());
    /// ```
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancellation_requested() {
            return Err(Cancelled::new(self.clone()));
        }

        Ok(())
    }
}

impl PartialEq for CancellationToken {
    fn eq(&self, other: &Self) -> bool {
        match (&self.source, &other.source) {
            (Some(this), Some(that)) => Arc::ptr_eq(this, that),
            _ => false,
        }
    }
}

impl Hash for CancellationToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.source {
            Some(ref flag) => flag_addr(flag).hash(state),
            None => 0usize.hash(state),
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Some(ref flag) => f
                .debug_struct("CancellationToken")
                .field("source", &(&**flag as *const Flag))
                .field("cancelled", &flag.cancelled.load(Acquire))
                .finish(),
            None => f.write_str("CancellationToken::NONE"),
        }
    }
}

impl From<&CancellationSource> for CancellationToken {
    fn from(source: &CancellationSource) -> Self {
        source.token()
    }
}

// === impl SourceId ===

impl PartialEq for SourceId {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SourceId {}

impl Hash for SourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        flag_addr(&self.0).hash(state)
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SourceId").field(&(&*self.0 as *const Flag)).finish()
    }
}

fn flag_addr(flag: &Arc<Flag>) -> usize {
    &**flag as *const Flag as usize
}

// === impl Cancelled ===

impl Cancelled {
    /// Returns a new error reporting that `token` was cancelled.
    #[must_use]
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Returns the token whose cancellation was observed.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
