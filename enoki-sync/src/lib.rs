#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg, doc_cfg_hide))]
#![cfg_attr(docsrs, doc(cfg_hide(docsrs, loom)))]
#![warn(missing_docs, missing_debug_implementations)]

#[macro_use]
pub(crate) mod util;
pub(crate) mod loom;

pub mod event;
pub mod timeout;

#[doc(inline)]
pub use self::event::{Event, Reset};
#[doc(inline)]
pub use self::timeout::{TimedOut, Timeout};

/// A synchronization object that threads can block on until it releases
/// them.
///
/// This trait is object safe, so that types owning a private gate can hand
/// out a `&dyn Waitable` without allowing callers to signal or reset it.
pub trait Waitable {
    /// Blocks the calling thread until this waitable releases it, or until
    /// `timeout` has elapsed.
    ///
    /// Pass [`Timeout::Immediate`] to test whether the waitable would block,
    /// and [`Timeout::Infinite`] to wait forever.
    ///
    /// # Returns
    ///
    /// - `true` if the waitable released the calling thread before the
    ///   timeout elapsed.
    /// - `false` if the timeout elapsed first.
    fn wait(&self, timeout: Timeout) -> bool;

    /// Like [`wait`](Self::wait), but returns a [`TimedOut`] error rather than
    /// `false`, so that it composes with `?`.
    fn wait_for(&self, timeout: Timeout) -> Result<(), TimedOut> {
        if self.wait(timeout) {
            Ok(())
        } else {
            Err(TimedOut::new())
        }
    }

    /// Returns `true` if waiting on this waitable would currently block.
    ///
    /// **Note**: this is a [`Timeout::Immediate`] wait, so on an
    /// automatically resetting [`Event`] a successful poll consumes the
    /// signal.
    fn is_blocking(&self) -> bool {
        !self.wait(Timeout::Immediate)
    }
}
