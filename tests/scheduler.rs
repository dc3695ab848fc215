mod util;

use enoki::{
    kernel, Queue, QueueKind, Scheduler, StatusKind, Task, TaskFactory, TaskOptions,
};
use std::{
    sync::{Arc, Barrier},
    thread,
    time::{Duration, Instant},
};
use util::{trace_init, TIMEOUT};

fn current_thread_name() -> Option<String> {
    thread::current().name().map(String::from)
}

#[test]
fn queue_scheduler_runs_on_workers() {
    trace_init();
    let queue = Queue::builder().name("workers").build().unwrap();
    let task = Task::new(|_| Ok(current_thread_name()));
    task.start_on(&Scheduler::on(&queue));
    assert_eq!(task.value_within(TIMEOUT).unwrap().as_deref(), Some("workers"));
}

#[test]
fn execute_synchronously_runs_on_caller() {
    trace_init();
    let queue = Queue::builder().name("not-used").build().unwrap();
    let task = TaskFactory::new()
        .scheduler(Scheduler::on(&queue))
        .options(TaskOptions::EXECUTE_SYNCHRONOUSLY)
        .start(|_| Ok(thread::current().id()));
    assert_eq!(task.status_kind(), StatusKind::Completed);
    assert_eq!(task.value().unwrap(), thread::current().id());
}

#[test]
fn value_kernels_run_inline() {
    trace_init();
    let queue = Queue::builder().build().unwrap();
    let task = TaskFactory::new()
        .scheduler(Scheduler::on(&queue))
        .start_with_kernel(kernel::value(5));
    assert_eq!(task.status_kind(), StatusKind::Completed);
}

#[test]
fn long_running_gets_dedicated_thread() {
    trace_init();
    let queue = Queue::builder()
        .name("pool")
        .kind(QueueKind::Concurrent)
        .workers(1)
        .build()
        .unwrap();

    // occupy the only worker until the long-running task has run
    let gate = Arc::new(Barrier::new(2));
    queue.run_async({
        let gate = gate.clone();
        move || {
            gate.wait();
        }
    });

    let task = TaskFactory::new()
        .scheduler(Scheduler::on(&queue))
        .options(TaskOptions::LONG_RUNNING)
        .start(|_| Ok(current_thread_name()));
    let name = task.value_within(TIMEOUT).unwrap();
    gate.wait();
    assert_eq!(name.as_deref(), Some("pool-long-running"));
}

#[test]
fn long_running_on_serial_queue_stays_on_queue() {
    trace_init();
    let queue = Queue::builder().name("serial").build().unwrap();
    let task = TaskFactory::new()
        .scheduler(Scheduler::on(&queue))
        .options(TaskOptions::LONG_RUNNING)
        .start(|_| Ok(current_thread_name()));
    assert_eq!(task.value_within(TIMEOUT).unwrap().as_deref(), Some("serial"));
}

#[test]
fn serial_queue_runs_tasks_one_at_a_time() {
    trace_init();
    let queue = Queue::builder().build().unwrap();
    let scheduler = Scheduler::on(&queue);
    let running = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let tasks = (0..8)
        .map(|_| {
            let running = running.clone();
            let task = Task::new(move |_| {
                use std::sync::atomic::Ordering::SeqCst;
                let concurrent = running.fetch_add(1, SeqCst) + 1;
                thread::sleep(Duration::from_millis(2));
                running.fetch_sub(1, SeqCst);
                Ok(concurrent)
            });
            task.start_on(&scheduler);
            task
        })
        .collect::<Vec<_>>();

    for task in tasks {
        assert_eq!(task.value_within(TIMEOUT).unwrap(), 1);
    }
}

#[test]
fn delay_completes_after_duration() {
    trace_init();
    let start = Instant::now();
    let delayed = enoki::delay(Duration::from_millis(40)).continue_with(&Scheduler::synchronous(), |_| Ok(Instant::now()));
    let finished = delayed.value_within(TIMEOUT).unwrap();
    assert!(finished - start >= Duration::from_millis(40));
}

#[test]
fn delay_on_custom_queue() {
    trace_init();
    let queue = Queue::builder().name("timers").build().unwrap();
    let task = enoki::delay_on(&queue, Duration::from_millis(10));
    task.value_within(TIMEOUT).unwrap();
    assert_eq!(task.status_kind(), StatusKind::Completed);
}
