use crate::error::Fault;
use core::fmt;

/// The lifecycle state of a [`Task`](crate::Task).
///
/// A task's status only ever moves forward:
///
/// ```text
/// Created -> Scheduled -> Running -> Completed | Faulted | Cancelled
/// ```
///
/// Once a task reaches one of the three *final* statuses, its status never
/// changes again.
#[derive(Clone)]
pub enum Status<T> {
    /// The task has been constructed but not started.
    Created,
    /// The task has been handed to its scheduler.
    Scheduled,
    /// The task's kernel is executing.
    Running,
    /// The task was cancelled through its own cancellation token.
    Cancelled,
    /// The task's kernel finished with a value.
    Completed(T),
    /// The task's kernel failed.
    Faulted(Fault),
}

/// A [`Status`] without its payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StatusKind {
    /// See [`Status::Created`].
    Created,
    /// See [`Status::Scheduled`].
    Scheduled,
    /// See [`Status::Running`].
    Running,
    /// See [`Status::Cancelled`].
    Cancelled,
    /// See [`Status::Completed`].
    Completed,
    /// See [`Status::Faulted`].
    Faulted,
}

// === impl Status ===

impl<T> Status<T> {
    /// Returns the kind of this status.
    #[must_use]
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Created => StatusKind::Created,
            Self::Scheduled => StatusKind::Scheduled,
            Self::Running => StatusKind::Running,
            Self::Cancelled => StatusKind::Cancelled,
            Self::Completed(_) => StatusKind::Completed,
            Self::Faulted(_) => StatusKind::Faulted,
        }
    }

    /// Returns `true` for [`Completed`](Self::Completed),
    /// [`Faulted`](Self::Faulted) and [`Cancelled`](Self::Cancelled).
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.kind().is_final()
    }

    /// Returns `true` if the task finished with a value or an error.
    #[must_use]
    pub fn is_result_available(&self) -> bool {
        self.kind().is_result_available()
    }

    /// Returns `true` if the task has not been started.
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created)
    }

    /// Returns `true` if the task is waiting for its scheduler to run it.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled)
    }

    /// Returns `true` if the task's kernel is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` if the task was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if the task finished with a value.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns `true` if the task's kernel failed.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted(_))
    }

    /// Returns the value of a completed task.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(&value))` if the status is [`Completed`](Self::Completed).
    /// - `Err(fault)` if the status is [`Faulted`](Self::Faulted).
    /// - `Ok(None)` for every other status.
    pub fn value(&self) -> Result<Option<&T>, Fault> {
        match self {
            Self::Completed(value) => Ok(Some(value)),
            Self::Faulted(fault) => Err(fault.clone()),
            _ => Ok(None),
        }
    }

    /// Like [`value`](Self::value), but consumes the status.
    pub fn into_value(self) -> Result<Option<T>, Fault> {
        match self {
            Self::Completed(value) => Ok(Some(value)),
            Self::Faulted(fault) => Err(fault),
            _ => Ok(None),
        }
    }

    /// Returns the fault of a faulted task.
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Faulted(fault) => Some(fault),
            _ => None,
        }
    }
}

impl<T> PartialEq<StatusKind> for Status<T> {
    fn eq(&self, kind: &StatusKind) -> bool {
        self.kind() == *kind
    }
}

impl<T: fmt::Debug> fmt::Debug for Status<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(value) => f.debug_tuple("Completed").field(value).finish(),
            Self::Faulted(fault) => f.debug_tuple("Faulted").field(fault).finish(),
            _ => fmt::Debug::fmt(&self.kind(), f),
        }
    }
}

// === impl StatusKind ===

impl StatusKind {
    /// Returns `true` for [`Completed`](Self::Completed),
    /// [`Faulted`](Self::Faulted) and [`Cancelled`](Self::Cancelled).
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Completed | Self::Faulted | Self::Cancelled)
    }

    /// Returns `true` for [`Completed`](Self::Completed) and
    /// [`Faulted`](Self::Faulted).
    #[must_use]
    pub fn is_result_available(self) -> bool {
        matches!(self, Self::Completed | Self::Faulted)
    }

    /// The position of this status in the task lifecycle. All final statuses
    /// share the last position.
    pub(crate) fn rank(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Scheduled => 1,
            Self::Running => 2,
            Self::Cancelled | Self::Completed | Self::Faulted => 3,
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Created => "created",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Faulted => "faulted",
        })
    }
}
