//! Dispatch queues: named pools of worker threads that run submitted work.
//!
//! A [`Queue`] is either [serial](QueueKind::Serial), running one job at a
//! time in submission order on a single worker, or
//! [concurrent](QueueKind::Concurrent), spreading jobs across several
//! workers. Two process-wide queues are created on first use:
//! [`Queue::global`], a concurrent queue sized to the machine, and
//! [`Queue::main`], a serial queue standing in for a main thread.
//!
//! Queues are handles; clones submit to the same workers. When the last
//! handle to a queue is dropped, its workers finish the jobs already
//! submitted and exit, and delayed jobs that have not yet come due are
//! discarded.
use crate::{error::Panicked, util::unpoison};
use core::{cell::Cell, cmp, fmt};
use once_cell::sync::Lazy;
use std::{
    borrow::Cow,
    collections::{BinaryHeap, VecDeque},
    io,
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc, Condvar, Mutex, MutexGuard},
    thread,
    time::{Duration, Instant},
};

/// A handle to a pool of worker threads.
#[derive(Clone)]
pub struct Queue {
    handle: Arc<Handle>,
}

/// Whether a [`Queue`] runs jobs one at a time or in parallel.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum QueueKind {
    /// One worker runs jobs in submission order.
    #[default]
    Serial,
    /// Several workers run jobs in parallel.
    Concurrent,
}

/// Configures and builds a [`Queue`].
#[derive(Debug, Default)]
pub struct Builder {
    name: Option<Cow<'static, str>>,
    kind: QueueKind,
    workers: Option<usize>,
    stack_size: Option<usize>,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Owned by the user-facing handles only; dropping the last one shuts the
/// queue down.
struct Handle {
    shared: Arc<Shared>,
}

struct Shared {
    name: Cow<'static, str>,
    kind: QueueKind,
    stack_size: Option<usize>,
    run_queue: Mutex<RunQueue>,
    job_ready: Condvar,
    timers: Mutex<Timers>,
    timer_ready: Condvar,
}

struct RunQueue {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

struct Timers {
    pending: BinaryHeap<Timer>,
    next_seq: u64,
    thread_started: bool,
    shutdown: bool,
}

struct Timer {
    deadline: Instant,
    seq: u64,
    job: Job,
}

static GLOBAL: Lazy<Queue> = Lazy::new(|| {
    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    Builder::new()
        .name("enoki-global")
        .kind(QueueKind::Concurrent)
        .workers(workers)
        .build()
        .expect("failed to spawn the global queue's workers")
});

static MAIN: Lazy<Queue> = Lazy::new(|| {
    Builder::new()
        .name("enoki-main")
        .kind(QueueKind::Serial)
        .build()
        .expect("failed to spawn the main queue's worker")
});

// === impl Queue ===

impl Queue {
    /// Returns a new [`Builder`].
    #[must_use]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Returns the process-wide concurrent queue.
    ///
    /// It has one worker per available CPU.
    ///
    /// # Panics
    ///
    /// On first use, if its worker threads cannot be spawned.
    #[must_use]
    pub fn global() -> &'static Queue {
        &GLOBAL
    }

    /// Returns the process-wide serial queue.
    ///
    /// # Panics
    ///
    /// On first use, if its worker thread cannot be spawned.
    #[must_use]
    pub fn main() -> &'static Queue {
        &MAIN
    }

    /// Returns this queue's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.handle.shared.name
    }

    /// Returns whether this queue is serial or concurrent.
    #[must_use]
    pub fn kind(&self) -> QueueKind {
        self.handle.shared.kind
    }

    /// Submits `work` to run on one of the queue's workers.
    pub fn run_async(&self, work: impl FnOnce() + Send + 'static) {
        self.handle.shared.enqueue(Box::new(work));
    }

    /// Runs `work` on one of the queue's workers, blocks until it has
    /// finished, and returns its result.
    ///
    /// When called from one of this queue's own workers, `work` runs
    /// inline instead, so that a serial queue never waits on itself.
    ///
    /// # Panics
    ///
    /// If `work` panics, the panic is resumed on the calling thread.
    pub fn run_sync<R>(&self, work: impl FnOnce() -> R + Send + 'static) -> R
    where
        R: Send + 'static,
    {
        let shared = &self.handle.shared;
        if shared.is_current() {
            tracing::trace!(queue = %shared.name, "already on queue; running inline");
            return work();
        }

        let (tx, rx) = mpsc::sync_channel(1);
        shared.enqueue(Box::new(move || {
            let _ = tx.send(panic::catch_unwind(AssertUnwindSafe(work)));
        }));
        match rx.recv() {
            Ok(Ok(value)) => value,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => unreachable!("queue {} dropped a job without running it", shared.name),
        }
    }

    /// Submits `work` to run on the queue once `delay` has elapsed.
    ///
    /// Jobs whose delays elapse at the same instant run in the order they
    /// were submitted.
    pub fn run_after(&self, delay: Duration, work: impl FnOnce() + Send + 'static) {
        if delay.is_zero() {
            return self.run_async(work);
        }

        let Some(deadline) = Instant::now().checked_add(delay) else {
            tracing::debug!(queue = %self.name(), ?delay, "delay never elapses; dropping job");
            return;
        };
        let shared = &self.handle.shared;
        let mut timers = shared.lock_timers();
        let seq = timers.next_seq;
        timers.next_seq += 1;
        timers.pending.push(Timer {
            deadline,
            seq,
            job: Box::new(work),
        });
        tracing::trace!(queue = %self.name(), ?delay, seq, "added timer");

        if !timers.thread_started {
            match shared.spawn_timer_thread() {
                Ok(()) => timers.thread_started = true,
                Err(error) => {
                    tracing::error!(queue = %self.name(), %error, "failed to spawn timer thread");
                    let Some(timer) = timers.pending.pop() else {
                        return;
                    };
                    drop(timers);
                    self.run_async(move || {
                        thread::sleep(timer.deadline.saturating_duration_since(Instant::now()));
                        (timer.job)()
                    });
                    return;
                }
            }
        }
        shared.timer_ready.notify_one();
    }

    /// Runs `work` on a thread of its own, outside the queue's worker pool.
    pub(crate) fn run_dedicated(&self, work: impl FnOnce() + Send + 'static) {
        let shared = &self.handle.shared;
        let mut builder = thread::Builder::new().name(format!("{}-long-running", shared.name));
        if let Some(stack_size) = shared.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let job: Job = Box::new(work);
        let (tx, rx) = mpsc::sync_channel::<Job>(1);
        match builder.spawn(move || {
            if let Ok(job) = rx.recv() {
                job();
            }
        }) {
            Ok(_) => {
                tracing::trace!(queue = %shared.name, "spawned dedicated thread");
                // the receiver only goes away if the thread died before receiving
                let _ = tx.send(job);
            }
            Err(error) => {
                tracing::warn!(queue = %shared.name, %error, "failed to spawn dedicated thread; using the queue instead");
                shared.enqueue(job);
            }
        }
    }
}

impl PartialEq for Queue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.handle.shared, &other.handle.shared)
    }
}

impl Eq for Queue {}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        tracing::debug!(queue = %self.shared.name, "last queue handle dropped; shutting down");
        self.shared.shutdown();
    }
}

// === impl Builder ===

impl Builder {
    /// Returns a builder for a serial queue with a generated name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the queue. Worker threads are named after it.
    #[must_use]
    pub fn name(self, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets whether the queue is serial or concurrent.
    #[must_use]
    pub fn kind(self, kind: QueueKind) -> Self {
        Self { kind, ..self }
    }

    /// Sets the number of workers of a concurrent queue.
    ///
    /// Serial queues always have exactly one worker. A concurrent queue
    /// defaults to one worker per available CPU, and has at least one.
    #[must_use]
    pub fn workers(self, workers: usize) -> Self {
        Self {
            workers: Some(workers),
            ..self
        }
    }

    /// Sets the stack size of the queue's threads, in bytes.
    #[must_use]
    pub fn stack_size(self, stack_size: usize) -> Self {
        Self {
            stack_size: Some(stack_size),
            ..self
        }
    }

    /// Spawns the queue's workers.
    ///
    /// # Errors
    ///
    /// If a worker thread could not be spawned. Workers that were already
    /// spawned exit.
    pub fn build(self) -> io::Result<Queue> {
        let workers = match self.kind {
            QueueKind::Serial => 1,
            QueueKind::Concurrent => self
                .workers
                .unwrap_or_else(|| thread::available_parallelism().map(|n| n.get()).unwrap_or(4))
                .max(1),
        };
        let name = self.name.unwrap_or_else(|| {
            use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
            static NEXT: AtomicUsize = AtomicUsize::new(0);
            Cow::Owned(format!("enoki-queue-{}", NEXT.fetch_add(1, Relaxed)))
        });

        let shared = Arc::new(Shared {
            name,
            kind: self.kind,
            stack_size: self.stack_size,
            run_queue: Mutex::new(RunQueue {
                jobs: VecDeque::new(),
                shutdown: false,
            }),
            job_ready: Condvar::new(),
            timers: Mutex::new(Timers {
                pending: BinaryHeap::new(),
                next_seq: 0,
                thread_started: false,
                shutdown: false,
            }),
            timer_ready: Condvar::new(),
        });
        let queue = Queue {
            handle: Arc::new(Handle {
                shared: shared.clone(),
            }),
        };

        for worker in 0..workers {
            let thread_name = match shared.kind {
                QueueKind::Serial => shared.name.to_string(),
                QueueKind::Concurrent => format!("{}-{worker}", shared.name),
            };
            let mut builder = thread::Builder::new().name(thread_name);
            if let Some(stack_size) = shared.stack_size {
                builder = builder.stack_size(stack_size);
            }
            let shared = shared.clone();
            // dropping `queue` on error shuts down the workers spawned so far
            builder.spawn(move || shared.run_worker(worker))?;
        }

        tracing::debug!(queue = %shared.name, kind = ?shared.kind, workers, "queue started");
        Ok(queue)
    }
}

// === impl Shared ===

thread_local! {
    /// The address of the queue whose worker is running on this thread, or
    /// zero.
    static CURRENT_QUEUE: Cell<usize> = const { Cell::new(0) };
}

impl Shared {
    fn enqueue(&self, job: Job) {
        let mut run_queue = unpoison(self.run_queue.lock());
        run_queue.jobs.push_back(job);
        drop(run_queue);
        self.job_ready.notify_one();
    }

    fn next_job(&self) -> Option<Job> {
        let mut run_queue = unpoison(self.run_queue.lock());
        loop {
            if let Some(job) = run_queue.jobs.pop_front() {
                return Some(job);
            }
            if run_queue.shutdown {
                return None;
            }
            run_queue = unpoison(self.job_ready.wait(run_queue));
        }
    }

    fn run_worker(&self, worker: usize) {
        tracing::debug!(queue = %self.name, worker, "worker started");
        CURRENT_QUEUE.with(|current| current.set(self.addr()));
        while let Some(job) = self.next_job() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                let panicked = Panicked::from_payload(payload);
                tracing::error!(queue = %self.name, worker, panic = panicked.message(), "job panicked");
            }
        }
        tracing::debug!(queue = %self.name, worker, "worker exiting");
    }

    /// Returns `true` if the calling thread is one of this queue's workers.
    fn is_current(&self) -> bool {
        CURRENT_QUEUE.with(|current| current.get() == self.addr())
    }

    fn addr(&self) -> usize {
        self as *const Self as usize
    }

    fn lock_timers(&self) -> MutexGuard<'_, Timers> {
        unpoison(self.timers.lock())
    }

    fn spawn_timer_thread(self: &Arc<Self>) -> io::Result<()> {
        let shared = self.clone();
        thread::Builder::new()
            .name(format!("{}-timer", self.name))
            .spawn(move || shared.run_timers())
            .map(drop)
    }

    fn run_timers(&self) {
        tracing::debug!(queue = %self.name, "timer thread started");
        let mut timers = self.lock_timers();
        loop {
            if timers.shutdown {
                let discarded = timers.pending.len();
                timers.pending.clear();
                tracing::debug!(queue = %self.name, discarded, "timer thread exiting");
                return;
            }

            let now = Instant::now();
            let Some(deadline) = timers.pending.peek().map(|timer| timer.deadline) else {
                timers = unpoison(self.timer_ready.wait(timers));
                continue;
            };

            if deadline > now {
                timers = unpoison(self.timer_ready.wait_timeout(timers, deadline - now)).0;
                continue;
            }

            if let Some(timer) = timers.pending.pop() {
                drop(timers);
                tracing::trace!(queue = %self.name, seq = timer.seq, "timer fired");
                self.enqueue(timer.job);
                timers = self.lock_timers();
            }
        }
    }

    fn shutdown(&self) {
        unpoison(self.run_queue.lock()).shutdown = true;
        self.job_ready.notify_all();
        self.lock_timers().shutdown = true;
        self.timer_ready.notify_all();
    }
}

// === impl Timer ===

// `BinaryHeap` is a max-heap, so timers compare in reverse: the earliest
// deadline, then the earliest submission, is the greatest.
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == cmp::Ordering::Equal
    }
}

impl Eq for Timer {}
