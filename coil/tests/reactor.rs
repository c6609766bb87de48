mod common;

use coil::io::{self, Descriptor, Interest};
use coil::time::{sleep_for, timeout};
use coil::{Error, Handle, yield_now};

use std::future::{Future, poll_fn};
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::pin::Pin;
use std::rc::Rc;
use std::task::Poll;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn readable_after_a_write_from_another_thread() {
    let rt = common::runtime();
    let (a, mut b) = UnixStream::pair().expect("failed to create socket pair");
    Descriptor::set_nonblocking(&a).expect("failed to set non-blocking");

    let start = Instant::now();
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        b.write_all(b"ping").expect("failed to write");
        b
    });

    let (readiness, received) = rt.block_on(async move {
        let readiness = io::wait_readiness(&a, Interest::READABLE)
            .await
            .expect("wait failed");

        let mut buf = [0u8; 8];
        let n = (&a).read(&mut buf).expect("read after readiness failed");
        (readiness, buf[..n].to_vec())
    });

    let elapsed = start.elapsed();
    writer.join().expect("writer panicked");

    assert!(readiness.readable);
    assert_eq!(received, b"ping");
    assert!(elapsed >= Duration::from_millis(5));
    assert!(elapsed < Duration::from_millis(500));
    assert_eq!(rt.handle().registrations(), 0);
}

#[test]
fn fresh_socket_is_writable() {
    let rt = common::runtime();
    let (a, _b) = UnixStream::pair().expect("failed to create socket pair");

    let readiness = rt.block_on(async move {
        Handle::current()
            .wait_readiness(&a, Interest::WRITABLE)
            .await
            .expect("wait failed")
    });

    assert!(readiness.writable);
    assert!(!readiness.is_empty());
}

#[test]
fn peer_hangup_wakes_a_reader() {
    let rt = common::runtime();
    let (a, b) = UnixStream::pair().expect("failed to create socket pair");

    let readiness = rt.block_on(async move {
        coil::spawn(async move {
            yield_now().await;
            drop(b);
        });

        io::wait_readiness(&a, Interest::READABLE)
            .await
            .expect("wait failed")
    });

    assert!(readiness.readable || readiness.hangup);
}

#[test]
fn second_wait_on_a_descriptor_is_rejected() {
    let rt = common::runtime();
    let (a, _b) = UnixStream::pair().expect("failed to create socket pair");
    let fd = a.as_raw_fd();

    rt.block_on(async move {
        let handle = Handle::current();
        let mut first = io::wait_readiness(&a, Interest::READABLE);

        // Arm the first wait without completing it.
        poll_fn(|cx| {
            assert!(Pin::new(&mut first).poll(cx).is_pending());
            Poll::Ready(())
        })
        .await;
        assert_eq!(handle.registrations(), 1);

        match io::wait_readiness(&a, Interest::WRITABLE).await {
            Err(Error::AlreadyRegistered { fd: rejected }) => assert_eq!(rejected, fd),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(handle.registrations(), 1);

        drop(first);
        assert_eq!(handle.registrations(), 0);
        assert!(handle.is_idle());
    });
}

#[test]
fn invalid_descriptor_fails_without_suspending() {
    struct Closed;

    impl AsRawFd for Closed {
        fn as_raw_fd(&self) -> RawFd {
            -1
        }
    }

    let rt = common::runtime();

    let result = rt.block_on(async { io::wait_readiness(&Closed, Interest::READABLE).await });

    assert!(matches!(result, Err(Error::Reactor(_))));
    assert_eq!(rt.handle().registrations(), 0);
}

#[test]
fn timeout_abandons_the_wait() {
    let rt = common::runtime();
    let (a, _b) = UnixStream::pair().expect("failed to create socket pair");

    let result = rt.block_on(async move {
        timeout(Duration::from_millis(10), io::wait_readiness(&a, Interest::READABLE)).await
    });

    assert!(result.is_err());
    assert_eq!(rt.handle().registrations(), 0);
    assert!(rt.handle().is_idle());
}

#[test]
fn aborting_a_task_parked_on_io_removes_its_interest() {
    let rt = common::runtime();
    let (a, _b) = UnixStream::pair().expect("failed to create socket pair");

    let task = rt.spawn(async move {
        let _ = io::wait_readiness(&a, Interest::READABLE).await;
    });

    rt.block_on(async {
        while Handle::current().registrations() == 0 {
            yield_now().await;
        }
    });
    assert_eq!(rt.handle().registrations(), 1);

    task.abort();

    assert_eq!(rt.handle().registrations(), 0);
    assert_eq!(rt.handle().live_tasks(), 0);
}

#[test]
fn waits_and_sleeps_interleave() {
    let rt = common::runtime();
    let (a, mut b) = UnixStream::pair().expect("failed to create socket pair");

    let readiness = rt.block_on(async move {
        coil::spawn(async move {
            sleep_for(Duration::from_millis(10)).await;
            b.write_all(b"x").expect("failed to write");
            b
        });

        io::wait_readiness(&a, Interest::READABLE)
            .await
            .expect("wait failed")
    });

    assert!(readiness.readable);
}

#[test]
fn woken_task_can_rearm_a_descriptor_fired_in_the_same_batch() {
    let rt = common::runtime();
    let (a1, mut b1) = UnixStream::pair().expect("failed to create socket pair");
    let (a2, mut b2) = UnixStream::pair().expect("failed to create socket pair");
    let a2 = Rc::new(a2);

    let (first, second) = rt.block_on(async move {
        let shared = a2.clone();
        let first = coil::spawn(async move {
            let own = io::wait_readiness(&a1, Interest::READABLE).await;
            let other = io::wait_readiness(&*shared, Interest::READABLE).await;
            (own.expect("wait failed"), other.expect("wait failed"))
        });
        let second = coil::spawn(async move {
            io::wait_readiness(&*a2, Interest::READABLE)
                .await
                .expect("wait failed")
        });

        // Both waits are armed before either descriptor becomes readable.
        while Handle::current().registrations() < 2 {
            yield_now().await;
        }
        b1.write_all(b"1").expect("failed to write");
        b2.write_all(b"2").expect("failed to write");

        coil::join!(first, second)
    });

    assert!(first.0.readable && first.1.readable);
    assert!(second.readable);
    assert_eq!(rt.handle().registrations(), 0);
}
