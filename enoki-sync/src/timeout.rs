//! Timeouts for blocking waits.
use core::time::Duration;
use std::time::Instant;

/// How long a blocking wait may take before giving up.
///
/// Besides a finite [`Duration`], there are two sentinel values:
///
/// - [`Timeout::Infinite`] waits until released, however long that takes.
/// - [`Timeout::Immediate`] never blocks. It is used to *poll* whether a wait
///   would succeed right now.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Timeout {
    /// Block until released.
    #[default]
    Infinite,

    /// Do not block at all.
    Immediate,

    /// Block for at most the given duration.
    After(Duration),
}

/// An error indicating that a blocking wait timed out before the waited-on
/// object released the calling thread.
///
/// This error is returned by [`Waitable::wait_for`](crate::Waitable::wait_for).
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("timed out")]
pub struct TimedOut(());

// === impl Timeout ===

impl Timeout {
    /// Returns a timeout from a number of seconds.
    ///
    /// Any negative, NaN or infinite value is [`Timeout::Infinite`], as is any
    /// value too large to represent as a [`Duration`]. Zero is
    /// [`Timeout::Immediate`].
    ///
    /// # Examples
    ///
    /// ```
    /// use enoki_sync::Timeout;
    /// use std::time::Duration;
    ///
    /// assert_eq!(Timeout::from_secs_f64(-1.0), Timeout::Infinite);
    /// assert_eq!(Timeout::from_secs_f64(0.0), Timeout::Immediate);
    /// assert_eq!(
    ///     Timeout::from_secs_f64(1.5),
    ///     Timeout::After(Duration::from_millis(1500)),
    /// );
    /// ```
    #[must_use]
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() || secs < 0.0 || secs.is_infinite() {
            Self::Infinite
        } else if secs == 0.0 {
            Self::Immediate
        } else {
            Duration::try_from_secs_f64(secs)
                .map(Self::After)
                .unwrap_or(Self::Infinite)
        }
    }

    /// Returns `true` if this is [`Timeout::Infinite`].
    #[must_use]
    #[inline]
    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::Infinite)
    }

    /// Returns `true` if a wait with this timeout never blocks.
    #[must_use]
    #[inline]
    pub fn is_immediate(&self) -> bool {
        match self {
            Self::Immediate => true,
            Self::After(duration) => duration.is_zero(),
            Self::Infinite => false,
        }
    }

    /// Returns the instant at which a wait starting at `now` gives up, or
    /// `None` if it never does.
    ///
    /// A duration too large to represent as an [`Instant`] is treated as
    /// infinite.
    pub(crate) fn deadline(&self, now: Instant) -> Option<Instant> {
        match self {
            Self::Infinite => None,
            Self::Immediate => Some(now),
            Self::After(duration) => now.checked_add(*duration),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::Immediate
        } else {
            Self::After(duration)
        }
    }
}

// === impl TimedOut ===

impl TimedOut {
    pub(crate) const fn new() -> Self {
        Self(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_duration_is_immediate() {
        assert_eq!(Timeout::from(Duration::ZERO), Timeout::Immediate);
        assert!(Timeout::After(Duration::ZERO).is_immediate());
        assert!(!Timeout::Infinite.is_immediate());
    }

    #[test]
    fn huge_durations_never_expire() {
        let now = Instant::now();
        assert_eq!(Timeout::After(Duration::MAX).deadline(now), None);
        assert_eq!(Timeout::Infinite.deadline(now), None);
        assert_eq!(Timeout::Immediate.deadline(now), Some(now));
    }

    #[test]
    fn huge_finite_seconds_are_infinite() {
        assert_eq!(Timeout::from_secs_f64(1e20), Timeout::Infinite);
        assert_eq!(Timeout::from_secs_f64(f64::MAX), Timeout::Infinite);
        assert_eq!(
            Timeout::from_secs_f64(1e9),
            Timeout::After(Duration::from_secs(1_000_000_000))
        );
    }

    proptest! {
        #[test]
        fn negative_seconds_are_infinite(secs in f64::MIN..0.0f64) {
            prop_assert_eq!(Timeout::from_secs_f64(secs), Timeout::Infinite);
        }

        #[test]
        fn positive_seconds_are_finite(millis in 1u64..10_000_000) {
            let secs = millis as f64 / 1000.0;
            let timeout = Timeout::from_secs_f64(secs);
            prop_assert!(matches!(timeout, Timeout::After(d) if !d.is_zero()));
        }

        #[test]
        fn unrepresentable_seconds_are_infinite(secs in 1e20f64..f64::MAX) {
            prop_assert_eq!(Timeout::from_secs_f64(secs), Timeout::Infinite);
        }
    }
}
