mod common;

use coil::{Error, Fault, Stage, Task, yield_now};

use std::cell::Cell;
use std::future::poll_fn;
use std::rc::Rc;
use std::task::Poll;

#[test]
fn task_is_lazy_until_awaited() {
    let rt = common::runtime();
    let ran = Rc::new(Cell::new(false));

    let flag = ran.clone();
    let task = Task::new(async move {
        flag.set(true);
        5
    });

    assert_eq!(task.stage(), Stage::Created);
    assert!(!ran.get());

    let value = rt.block_on(task);

    assert!(ran.get());
    assert_eq!(value, 5);
}

#[test]
fn result_is_retrieved_exactly_once() {
    let rt = common::runtime();

    rt.block_on(async {
        let mut task = Task::new(async { 7 });
        poll_fn(|cx| task.poll_complete(cx)).await;

        assert!(task.is_complete());
        assert_eq!(task.result().unwrap(), 7);
        assert!(matches!(task.result(), Err(Error::ResultTaken)));
    });
}

#[test]
fn result_before_completion_is_a_usage_error() {
    let mut task = Task::new(async { 1 });

    assert!(matches!(task.result(), Err(Error::Incomplete)));
    assert!(matches!(task.try_result(), Err(Error::Incomplete)));
}

#[test]
fn stage_follows_the_life_cycle() {
    let rt = common::runtime();

    rt.block_on(async {
        let mut task = Task::new(async {
            yield_now().await;
            3
        });
        assert_eq!(task.stage(), Stage::Created);

        poll_fn(|cx| {
            assert!(task.poll_complete(cx).is_pending());
            Poll::Ready(())
        })
        .await;
        assert_eq!(task.stage(), Stage::Suspended);

        poll_fn(|cx| task.poll_complete(cx)).await;
        assert_eq!(task.stage(), Stage::Completed);
        assert_eq!(task.result().unwrap(), 3);
    });
}

#[test]
fn ready_and_fault_tasks_are_already_complete() {
    let mut ready = Task::ready("done");
    assert_eq!(ready.stage(), Stage::Completed);
    assert_eq!(ready.result().unwrap(), "done");

    let mut faulted = Task::<u8>::from_fault(Fault::from_message("boom"));
    match faulted.try_result() {
        Err(Error::Panicked(fault)) => assert_eq!(fault.message(), Some("boom")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn fault_is_captured_and_settled_by_an_ancestor() {
    let rt = common::runtime();

    let message = rt.block_on(async {
        let inner = Task::<u32>::new(async { panic!("inner failure") });
        let outer = Task::new(async move { inner.await + 1 });

        match outer.settle().await {
            Ok(_) => None,
            Err(fault) => fault.message().map(str::to_owned),
        }
    });

    assert_eq!(message.as_deref(), Some("inner failure"));
}

#[test]
#[should_panic(expected = "unhandled in root")]
fn fault_escaping_the_root_reaches_the_caller() {
    let rt = common::runtime();

    rt.block_on(async {
        let child = Task::<()>::new(async { panic!("unhandled in root") });
        child.await;
    });
}

#[test]
fn try_result_reports_a_fault_without_raising_it() {
    let rt = common::runtime();

    rt.block_on(async {
        let mut task = Task::<i32>::new(async { panic!("kept") });
        poll_fn(|cx| task.poll_complete(cx)).await;

        let err = task.try_result().unwrap_err();
        assert!(matches!(&err, Error::Panicked(f) if f.message() == Some("kept")));
        assert_eq!(err.to_string(), "task panicked: kept");

        assert!(matches!(task.try_result(), Err(Error::ResultTaken)));
    });
}

#[test]
fn and_then_sequences_two_tasks() {
    let rt = common::runtime();

    let value = rt.block_on(async {
        Task::new(async { 20 })
            .and_then(|v| Task::new(async move { v + 22 }))
            .await
    });

    assert_eq!(value, 42);
}

#[test]
fn dropping_an_unstarted_task_never_runs_it() {
    let ran = Rc::new(Cell::new(false));

    let flag = ran.clone();
    let task = Task::new(async move { flag.set(true) });
    drop(task);

    assert!(!ran.get());
}
