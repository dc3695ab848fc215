use super::{run, Observer, Phase, Schedule};
use crate::{
    options::TaskOptions,
    queue::{Queue, QueueKind},
    task::Task,
};

/// Runs tasks on a [`Queue`].
///
/// Task hints change where the kernel runs:
///
/// - Kernels that [prefer to run synchronously], and tasks created with
///   [`TaskOptions::EXECUTE_SYNCHRONOUSLY`], run inline on the thread that
///   starts them.
/// - Tasks created with [`TaskOptions::LONG_RUNNING`] get a dedicated
///   thread when the queue is [concurrent], so that they do not occupy one
///   of the queue's workers.
/// - Everything else is submitted to the queue.
///
/// [prefer to run synchronously]: crate::Kernel::prefers_synchronous
/// [concurrent]: QueueKind::Concurrent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueScheduler {
    queue: Queue,
}

impl QueueScheduler {
    /// Returns a scheduler for `queue`.
    #[must_use]
    pub fn new(queue: Queue) -> Self {
        Self { queue }
    }

    /// Returns the queue this scheduler submits work to.
    #[must_use]
    pub fn queue(&self) -> &Queue {
        &self.queue
    }
}

impl Schedule for QueueScheduler {
    fn schedule<T: Send + 'static>(&self, task: &Task<T>, observer: Observer<T>) {
        observer.notify(Phase::Scheduled);

        let options = task.options();
        if task.prefers_synchronous() || options.contains(TaskOptions::EXECUTE_SYNCHRONOUSLY) {
            tracing::trace!(queue = %self.queue.name(), "running task inline");
            run(task, &observer);
            return;
        }

        let task = task.clone();
        let work = move || run(&task, &observer);
        if options.contains(TaskOptions::LONG_RUNNING) && self.queue.kind() == QueueKind::Concurrent {
            self.queue.run_dedicated(work);
        } else {
            self.queue.run_async(work);
        }
    }
}

impl From<Queue> for QueueScheduler {
    fn from(queue: Queue) -> Self {
        Self::new(queue)
    }
}
