bitflags::bitflags! {
    /// Scheduling hints attached to a [`Task`](crate::Task).
    ///
    /// Schedulers are free to ignore hints they do not understand.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct TaskOptions: u32 {
        /// The kernel is expected to block for a long time.
        ///
        /// Queue schedulers run such kernels on a dedicated thread rather
        /// than occupying one of a concurrent queue's workers.
        const LONG_RUNNING = 1 << 1;

        /// Run the kernel inline on the thread that starts the task, even
        /// when the task is scheduled on a queue.
        const EXECUTE_SYNCHRONOUSLY = 1 << 2;
    }
}

impl TaskOptions {
    /// No hints.
    pub const DEFAULT: Self = Self::empty();
}
