mod common;

use coil::time::sleep_for;
use coil::{Error, Handle, JoinHandle, Runtime, yield_now};

use std::cell::{Cell, RefCell};
use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn spawned_tasks_run_in_fifo_order() {
    let rt = common::runtime();
    let log = Rc::new(RefCell::new(Vec::new()));

    for i in 0..4 {
        let log = log.clone();
        rt.spawn(async move { log.borrow_mut().push(i) });
    }

    rt.run();
    assert_eq!(*log.borrow(), vec![0, 1, 2, 3]);
}

#[test]
fn tasks_woken_in_a_pass_run_in_wake_order() {
    let rt = common::runtime();
    let log = Rc::new(RefCell::new(Vec::new()));

    for name in ["a", "b"] {
        let log = log.clone();
        rt.spawn(async move {
            log.borrow_mut().push(format!("{name}1"));
            yield_now().await;
            log.borrow_mut().push(format!("{name}2"));
        });
    }

    rt.run();
    assert_eq!(*log.borrow(), vec!["a1", "b1", "a2", "b2"]);
}

#[test]
fn run_returns_immediately_when_idle() {
    let rt = common::runtime();
    let start = Instant::now();

    rt.run();

    assert!(start.elapsed() < Duration::from_millis(50));
    assert!(rt.handle().is_idle());
}

#[test]
fn block_on_returns_the_root_value_and_leaves_other_tasks_pending() {
    let rt = common::runtime();
    let finished = Rc::new(Cell::new(false));

    let flag = finished.clone();
    rt.spawn(async move {
        sleep_for(Duration::from_millis(20)).await;
        flag.set(true);
    });

    assert_eq!(rt.block_on(async { 11 }), 11);
    assert!(!finished.get());
    assert_eq!(rt.handle().live_tasks(), 1);

    rt.run();
    assert!(finished.get());
    assert_eq!(rt.handle().live_tasks(), 0);
}

#[test]
fn join_handle_yields_the_spawned_value() {
    let rt = common::runtime();

    let value = rt.block_on(async {
        let handle = coil::spawn(async {
            yield_now().await;
            "spawned"
        });
        handle.await
    });

    assert_eq!(value, "spawned");
}

#[test]
#[should_panic(expected = "spawned fault")]
fn awaiting_a_faulted_handle_re_raises() {
    let rt = common::runtime();

    rt.block_on(async {
        let handle: JoinHandle<()> = coil::spawn(async { panic!("spawned fault") });
        handle.await
    });
}

#[test]
fn abort_releases_the_timer_and_never_resumes() {
    let rt = common::runtime();
    let resumed = Rc::new(Cell::new(false));

    let flag = resumed.clone();
    let mut handle = rt.spawn(async move {
        sleep_for(Duration::from_secs(5)).await;
        flag.set(true);
    });

    // Let the task reach its sleep.
    rt.block_on(yield_now());
    assert_eq!(rt.handle().pending_timers(), 1);

    handle.abort();

    assert!(handle.is_finished());
    assert_eq!(rt.handle().pending_timers(), 0);
    assert_eq!(rt.handle().live_tasks(), 0);
    assert!(matches!(handle.try_result(), Err(Error::Aborted)));

    rt.run();
    assert!(!resumed.get());
}

#[test]
fn a_task_can_abort_itself() {
    let rt = common::runtime();
    let slot: Rc<RefCell<Option<JoinHandle<()>>>> = Rc::new(RefCell::new(None));
    let reached = Rc::new(Cell::new(false));

    let own = slot.clone();
    let flag = reached.clone();
    let handle = rt.spawn(async move {
        if let Some(handle) = own.borrow().as_ref() {
            handle.abort();
        }
        yield_now().await;
        flag.set(true);
    });
    *slot.borrow_mut() = Some(handle);

    rt.run();

    assert!(!reached.get());
    assert_eq!(rt.handle().live_tasks(), 0);
    assert!(slot.borrow().as_ref().is_some_and(JoinHandle::is_finished));
}

#[test]
fn dropping_a_handle_detaches_the_task() {
    let rt = common::runtime();
    let done = Rc::new(Cell::new(false));

    let flag = done.clone();
    drop(rt.spawn(async move {
        yield_now().await;
        flag.set(true);
    }));

    rt.run();
    assert!(done.get());
}

#[test]
fn dropping_the_runtime_destroys_unfinished_tasks() {
    struct SetOnDrop(Rc<Cell<bool>>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    let rt = common::runtime();
    let dropped = Rc::new(Cell::new(false));

    let guard = SetOnDrop(dropped.clone());
    rt.spawn(async move {
        let _guard = guard;
        sleep_for(Duration::from_secs(60)).await;
    });
    rt.block_on(yield_now());

    assert!(!dropped.get());
    drop(rt);
    assert!(dropped.get());
}

#[test]
fn wake_from_another_thread_interrupts_the_os_wait() {
    let rt = common::runtime();
    let ready = Arc::new(AtomicBool::new(false));
    let start = Instant::now();

    let flag = ready.clone();
    let mut started = false;
    rt.block_on(poll_fn(move |cx| {
        if flag.load(Ordering::Acquire) {
            return Poll::Ready(());
        }

        if !started {
            started = true;
            let flag = flag.clone();
            let waker = cx.waker().clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                flag.store(true, Ordering::Release);
                waker.wake();
            });
        }

        Poll::Pending
    }));

    assert!(ready.load(Ordering::Acquire));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn root_that_can_never_resume_is_reported_as_stalled() {
    let rt = common::runtime();
    let start = Instant::now();

    let result = rt.try_block_on(std::future::pending::<()>());

    assert!(matches!(result, Err(Error::Stalled)));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(rt.handle().live_tasks(), 0);
    assert!(rt.handle().is_idle());

    // The runtime stays usable.
    assert_eq!(rt.block_on(async { 3 }), 3);
}

#[test]
#[should_panic(expected = "the runtime is idle but the root task has not completed")]
fn block_on_a_pending_future_panics_instead_of_hanging() {
    let rt = common::runtime();

    rt.block_on(std::future::pending::<()>());
}

#[test]
fn stall_leaves_other_parked_tasks_alone() {
    let rt = common::runtime();

    let result = rt.try_block_on(async {
        let handle = coil::spawn(std::future::pending::<u8>());
        handle.await
    });

    assert!(matches!(result, Err(Error::Stalled)));
    // The root is gone; the task it spawned is still parked.
    assert_eq!(rt.handle().live_tasks(), 1);
}

#[test]
fn current_handle_is_only_available_while_driving() {
    let rt = common::runtime();

    assert!(matches!(Handle::try_current(), Err(Error::NoRuntime)));

    let inside = rt.block_on(async { Handle::try_current().is_ok() });
    assert!(inside);

    assert!(matches!(Handle::try_current(), Err(Error::NoRuntime)));
}

#[test]
#[should_panic(expected = "no runtime is driving the current thread")]
fn sleeping_outside_a_runtime_panics() {
    let mut sleep = sleep_for(Duration::from_secs(1));
    let mut cx = Context::from_waker(Waker::noop());

    let _ = Pin::new(&mut sleep).poll(&mut cx);
}

#[test]
#[should_panic(expected = "a runtime is already driving the current thread")]
fn nested_block_on_panics() {
    let outer = common::runtime();
    let inner = Runtime::new().expect("failed to build runtime");

    outer.block_on(async move {
        inner.block_on(async {});
    });
}
