use core::fmt;

/// A unique identifier for a [`Task`](crate::Task).
///
/// Every task created during the lifetime of a program receives a distinct
/// `TaskId`, and IDs are never reused. A `TaskId` does not keep its task
/// alive.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        // Don't use loom atomics, since this has to go in a static.
        use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, Relaxed);

        debug_assert!(id > 0, "64-bit task ID counter should not overflow!");
        Self(id)
    }

    /// Returns the numeric value of this ID.
    #[must_use]
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TaskId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskId(")?;
        fmt::Debug::fmt(&self.0, f)?;
        f.write_str(")")
    }
}

impl fmt::Display for TaskId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
