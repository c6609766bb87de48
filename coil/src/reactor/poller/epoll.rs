//! Linux `epoll` backend.
//!
//! Interest is armed with `EPOLLONESHOT`, so a descriptor reports at most
//! once per registration. The reactor removes it from the set right after
//! it fires, which keeps the kernel set equal to the outstanding waits and
//! lets the next wait use `EPOLL_CTL_ADD` again.

use super::common::{Event, is_gone, push_event, timeout_millis};
use super::unix::cvt;
use crate::io::{Interest, Readiness};

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLONESHOT,
    EPOLLOUT, EPOLLRDHUP, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

/// Token of the notifier's eventfd. Registration tokens never reach it
/// because their sequence half is a `u32`.
const WAKE_TOKEN: u64 = u64::MAX;

/// Interrupts `epoll_wait` from any thread.
pub(crate) struct Notifier {
    eventfd: OwnedFd,
}

impl Notifier {
    pub(crate) fn notify(&self) {
        let buf: u64 = 1;
        unsafe {
            libc::write(
                self.eventfd.as_raw_fd(),
                &buf as *const u64 as *const libc::c_void,
                8,
            );
        }
    }

    fn drain(&self) {
        let mut buf: u64 = 0;
        unsafe {
            libc::read(
                self.eventfd.as_raw_fd(),
                &mut buf as *mut u64 as *mut libc::c_void,
                8,
            );
        }
    }
}

pub(crate) struct Poller {
    epoll: OwnedFd,
    events: Vec<epoll_event>,
    notifier: Arc<Notifier>,
}

impl Poller {
    /// Creates the epoll instance and registers the notifier's eventfd as a
    /// persistent wake source.
    pub(crate) fn new(capacity: usize) -> io::Result<Self> {
        let epoll = cvt(unsafe { epoll_create1(EPOLL_CLOEXEC) })?;
        let epoll = unsafe { OwnedFd::from_raw_fd(epoll) };

        let eventfd = cvt(unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) })?;
        let eventfd = unsafe { OwnedFd::from_raw_fd(eventfd) };

        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: WAKE_TOKEN,
        };
        cvt(unsafe {
            epoll_ctl(
                epoll.as_raw_fd(),
                EPOLL_CTL_ADD,
                eventfd.as_raw_fd(),
                &mut event,
            )
        })?;

        Ok(Self {
            epoll,
            events: Vec::with_capacity(capacity.max(1)),
            notifier: Arc::new(Notifier { eventfd }),
        })
    }

    pub(crate) fn notifier(&self) -> Arc<Notifier> {
        self.notifier.clone()
    }

    pub(crate) fn register(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        let mut flags = EPOLLONESHOT | EPOLLRDHUP;

        if interest.is_readable() {
            flags |= EPOLLIN;
        }
        if interest.is_writable() {
            flags |= EPOLLOUT;
        }

        let mut event = epoll_event {
            events: flags as u32,
            u64: token,
        };

        cvt(unsafe { epoll_ctl(self.epoll.as_raw_fd(), EPOLL_CTL_ADD, fd, &mut event) })?;
        Ok(())
    }

    pub(crate) fn deregister(&self, fd: RawFd, _interest: Interest) -> io::Result<()> {
        let rc = unsafe {
            epoll_ctl(
                self.epoll.as_raw_fd(),
                EPOLL_CTL_DEL,
                fd,
                std::ptr::null_mut(),
            )
        };

        match cvt(rc) {
            Err(err) if !is_gone(&err) => Err(err),
            _ => Ok(()),
        }
    }

    /// Waits for readiness events.
    ///
    /// Returns with an empty batch on a notifier wake-up, on timeout or when
    /// interrupted by a signal.
    pub(crate) fn poll(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        events.clear();
        self.events.clear();

        let n = unsafe {
            epoll_wait(
                self.epoll.as_raw_fd(),
                self.events.as_mut_ptr(),
                self.events.capacity() as i32,
                timeout_millis(timeout),
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        // SAFETY: the kernel initialized the first `n` entries.
        unsafe {
            self.events.set_len(n as usize);
        }

        for ev in &self.events {
            let token = ev.u64;

            if token == WAKE_TOKEN {
                self.notifier.drain();
                continue;
            }

            let bits = ev.events;
            let readiness = Readiness {
                readable: bits & (EPOLLIN as u32) != 0,
                writable: bits & (EPOLLOUT as u32) != 0,
                error: bits & (EPOLLERR as u32) != 0,
                hangup: bits & ((EPOLLHUP | EPOLLRDHUP) as u32) != 0,
            };

            push_event(events, token, readiness);
        }

        Ok(())
    }
}
