#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg, doc_cfg_hide))]
#![cfg_attr(docsrs, doc(cfg_hide(docsrs, loom)))]
#![warn(missing_docs, missing_debug_implementations)]

#[macro_use]
pub(crate) mod util;
pub(crate) mod loom;

pub mod cancel;
pub mod error;
mod factory;
pub mod kernel;
mod operation;
mod options;
pub mod queue;
pub mod scheduler;
mod status;
pub mod task;
mod time;

#[doc(inline)]
pub use self::{
    cancel::{CancellationSource, CancellationToken, Cancelled, SourceId},
    error::{BoxError, Fault, Panicked, TaskError},
    factory::{start, TaskFactory},
    kernel::{Completion, Kernel, Outcome},
    operation::Operation,
    options::TaskOptions,
    queue::{Queue, QueueKind},
    scheduler::{Schedule, Scheduler},
    status::{Status, StatusKind},
    task::{Task, TaskId},
    time::{delay, delay_on},
};
#[doc(no_inline)]
pub use enoki_sync::{Event, Reset, TimedOut, Timeout, Waitable};
