mod util;

use enoki::{
    scheduler::Synchronous, CancellationSource, Queue, Scheduler, StatusKind, Task, TaskFactory,
};
use proptest::prelude::*;
use std::{
    sync::{mpsc, Arc, Barrier, Mutex},
    thread,
};
use util::{queue, trace_init, TIMEOUT};

#[test]
fn continuation_sees_antecedent_value() {
    trace_init();
    let antecedent = Task::new(|_| Ok(10));
    let continuation = antecedent.continue_with(&Scheduler::global(), |antecedent| {
        Ok(antecedent.value()? + 5)
    });
    assert_eq!(continuation.status_kind(), StatusKind::Created);

    antecedent.start();
    assert_eq!(continuation.value_within(TIMEOUT).unwrap(), 15);
}

#[test]
fn continuation_of_finished_task_starts_immediately() {
    trace_init();
    let antecedent = Task::from_value("ready");
    antecedent.start_on(&Synchronous);

    let (tx, rx) = mpsc::channel();
    let continuation = antecedent.continue_with(&Synchronous, move |antecedent| {
        tx.send(antecedent.value()?)?;
        Ok(())
    });
    // already ran, before `continue_with` returned
    assert_eq!(rx.try_recv().unwrap(), "ready");
    assert_eq!(continuation.status_kind(), StatusKind::Completed);
}

#[test]
fn continuation_runs_after_fault() {
    trace_init();
    let antecedent = Task::<u32>::new(|_| Err("boom".into()));
    let continuation = antecedent.continue_with(&Synchronous, |antecedent| {
        Ok(antecedent.status().is_faulted())
    });
    antecedent.start_on(&Synchronous);
    assert!(continuation.value_within(TIMEOUT).unwrap());
}

#[test]
fn fault_propagates_through_chain() {
    trace_init();
    let first = Task::<u32>::new(|_| Err("boom".into()));
    let second = first.continue_with(&Scheduler::global(), |t| Ok(t.value()? + 1));
    let third = second.continue_with(&Scheduler::global(), |t| Ok(t.value()? + 1));
    first.start();

    let root = first.value_within(TIMEOUT).unwrap_err();
    let leaf = third.value_within(TIMEOUT).unwrap_err();
    assert_eq!(leaf.to_string(), "boom");
    assert!(leaf.fault().unwrap().ptr_eq(root.fault().unwrap()));
}

#[test]
fn continuation_waits_for_running_antecedent() {
    trace_init();
    let gate = Arc::new(Barrier::new(2));
    let antecedent = Task::new({
        let gate = gate.clone();
        move |_| {
            gate.wait();
            Ok(1)
        }
    });
    let queue = queue("running-antecedent", 2);
    let scheduler = Scheduler::on(&queue);
    antecedent.start_on(&scheduler);

    let continuation = antecedent.continue_with(&scheduler, |t| Ok(t.value()? * 3));
    assert!(!continuation.is_final());
    gate.wait();
    assert_eq!(continuation.value_within(TIMEOUT).unwrap(), 3);
}

#[test]
fn continue_for_flattens_inner_task() {
    trace_init();
    let antecedent = Task::new(|_| Ok(2));
    let outer = antecedent.continue_for(&Scheduler::global(), |antecedent| {
        let value = antecedent.value()?;
        let inner = Task::new(move |_| Ok(value * 21));
        inner.start();
        Ok(inner)
    });
    antecedent.start();
    assert_eq!(outer.value_within(TIMEOUT).unwrap(), 42);
}

#[test]
fn continue_for_does_not_hold_workers() {
    const WORKERS: usize = 4;
    trace_init();
    let queue = queue("flatten", WORKERS);
    let scheduler = Scheduler::on(&queue);
    // every worker is busy in an outer handler before any inner task is queued
    let all_busy = Arc::new(Barrier::new(WORKERS));
    let antecedent = Task::new(|_| Ok(()));
    let outers = (0..WORKERS)
        .map(|i| {
            let inner_scheduler = scheduler.clone();
            let all_busy = all_busy.clone();
            antecedent.continue_for(&scheduler, move |_| {
                all_busy.wait();
                let inner = Task::new(move |_| Ok(i));
                inner.start_on(&inner_scheduler);
                Ok(inner)
            })
        })
        .collect::<Vec<_>>();
    antecedent.start_on(&Synchronous);

    for (i, outer) in outers.iter().enumerate() {
        assert_eq!(outer.value_within(TIMEOUT).unwrap(), i);
    }
}

#[test]
fn continue_for_on_serial_queue_with_inner_on_same_queue() {
    trace_init();
    let queue = queue("flatten-serial", 1);
    let scheduler = Scheduler::on(&queue);
    let antecedent = Task::from_value(20);
    let inner_factory = TaskFactory::with_scheduler(scheduler.clone());
    let outer = antecedent.continue_for(&scheduler, move |t| {
        let value = t.value()?;
        Ok(inner_factory.start(move |_| Ok(value + 1)))
    });
    antecedent.start_on(&Synchronous);
    assert_eq!(outer.value_within(TIMEOUT).unwrap(), 21);
}

#[test]
fn continue_for_starts_unstarted_inner_task() {
    trace_init();
    let antecedent = Task::from_value(());
    let outer = antecedent.continue_for(&Synchronous, |_| Ok(Task::new(|_| Ok("inner"))));
    antecedent.start_on(&Synchronous);
    assert_eq!(outer.value_within(TIMEOUT).unwrap(), "inner");
}

#[test]
fn continue_for_inner_fault_faults_outer() {
    trace_init();
    let antecedent = Task::from_value(());
    let outer = antecedent.continue_for(&Synchronous, |_| Ok(Task::<u8>::from_error("inner failed")));
    antecedent.start_on(&Synchronous);
    let err = outer.value_within(TIMEOUT).unwrap_err();
    assert!(err.is_faulted());
    assert_eq!(err.to_string(), "inner failed");
}

#[test]
fn inner_cancellation_with_other_token_faults_outer() {
    trace_init();
    let source = CancellationSource::new();
    source.cancel();
    let antecedent = Task::from_value(());
    let outer = antecedent.continue_for(&Synchronous, move |_| {
        Ok(TaskFactory::new()
            .cancellation_token(source.token())
            .make(|token| {
                token.checkpoint()?;
                Ok(())
            }))
    });
    antecedent.start_on(&Synchronous);
    assert!(outer.value_within(TIMEOUT).unwrap_err().is_faulted());
}

#[test]
fn continue_on_main_runs_on_main_queue() {
    trace_init();
    let antecedent = Task::from_value(());
    let continuation = antecedent.continue_on_main(|_| {
        Ok(thread::current().name().map(String::from))
    });
    antecedent.start();
    let name = continuation.value_within(TIMEOUT).unwrap();
    assert_eq!(name.as_deref(), Some(Queue::main().name()));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn continuations_start_in_registration_order(count in 1usize..32) {
        trace_init();
        let queue = queue("registration-order", 1);
        let gate = Arc::new(Barrier::new(2));
        let antecedent = Task::new({
            let gate = gate.clone();
            move |_| {
                gate.wait();
                Ok(())
            }
        });
        antecedent.start_on(&Scheduler::on(&queue));

        let order = Arc::new(Mutex::new(Vec::new()));
        let continuations = (0..count)
            .map(|i| {
                let order = order.clone();
                antecedent.continue_with(&Synchronous, move |_| {
                    order.lock().unwrap().push(i);
                    Ok(())
                })
            })
            .collect::<Vec<_>>();

        gate.wait();
        for continuation in &continuations {
            continuation.value_within(TIMEOUT).unwrap();
        }
        prop_assert_eq!(order.lock().unwrap().clone(), (0..count).collect::<Vec<_>>());
    }
}
