//! BSD / macOS `kqueue` backend.
//!
//! Read and write interest map to two `EV_ONESHOT` filters carrying the
//! same token; when both fire in one batch their readiness is merged. The
//! notifier is an `EVFILT_USER` event on the kqueue itself.

use super::common::{Event, is_gone, push_event};
use super::unix::cvt;
use crate::io::{Interest, Readiness};

use libc::{
    EV_ADD, EV_CLEAR, EV_DELETE, EV_EOF, EV_ERROR, EV_ONESHOT, EVFILT_READ, EVFILT_USER,
    EVFILT_WRITE, NOTE_TRIGGER, kevent, kqueue, timespec,
};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

/// Identifier of the `EVFILT_USER` wake event.
const WAKE_IDENT: usize = 0;

/// Token reported for the wake event. Registration tokens never reach it
/// because their sequence half is a `u32`.
const WAKE_TOKEN: u64 = u64::MAX;

fn change(ident: usize, filter: i16, flags: u16, fflags: u32, token: u64) -> kevent {
    // SAFETY: `kevent` is a plain C struct for which all-zero is valid.
    let mut ev: kevent = unsafe { std::mem::zeroed() };
    ev.ident = ident as _;
    ev.filter = filter as _;
    ev.flags = flags as _;
    ev.fflags = fflags as _;
    ev.udata = token as usize as _;
    ev
}

fn apply(kq: RawFd, changes: &[kevent]) -> io::Result<()> {
    let rc = unsafe {
        kevent(
            kq,
            changes.as_ptr(),
            changes.len() as _,
            std::ptr::null_mut(),
            0,
            std::ptr::null(),
        )
    };

    cvt(rc).map(|_| ())
}

/// Interrupts `kevent` from any thread.
///
/// Owns the kqueue descriptor, so a waker that outlives the runtime never
/// writes to a recycled descriptor.
pub(crate) struct Notifier {
    kq: OwnedFd,
}

impl Notifier {
    pub(crate) fn notify(&self) {
        let ev = change(WAKE_IDENT, EVFILT_USER, 0, NOTE_TRIGGER, WAKE_TOKEN);
        let _ = apply(self.kq.as_raw_fd(), &[ev]);
    }
}

pub(crate) struct Poller {
    events: Vec<kevent>,
    notifier: Arc<Notifier>,
}

impl Poller {
    pub(crate) fn new(capacity: usize) -> io::Result<Self> {
        let kq = cvt(unsafe { kqueue() })?;
        let kq = unsafe { OwnedFd::from_raw_fd(kq) };

        cvt(unsafe { libc::fcntl(kq.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) })?;

        let wake = change(WAKE_IDENT, EVFILT_USER, EV_ADD | EV_CLEAR, 0, WAKE_TOKEN);
        apply(kq.as_raw_fd(), &[wake])?;

        Ok(Self {
            events: Vec::with_capacity(capacity.max(1)),
            notifier: Arc::new(Notifier { kq }),
        })
    }

    fn kq(&self) -> RawFd {
        self.notifier.kq.as_raw_fd()
    }

    pub(crate) fn notifier(&self) -> Arc<Notifier> {
        self.notifier.clone()
    }

    pub(crate) fn register(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        let mut changes = Vec::with_capacity(2);

        if interest.is_readable() {
            changes.push(change(fd as usize, EVFILT_READ, EV_ADD | EV_ONESHOT, 0, token));
        }
        if interest.is_writable() {
            changes.push(change(fd as usize, EVFILT_WRITE, EV_ADD | EV_ONESHOT, 0, token));
        }

        apply(self.kq(), &changes)
    }

    /// Deletes the filters of `interest` that have not fired yet.
    pub(crate) fn deregister(&self, fd: RawFd, interest: Interest) -> io::Result<()> {
        let mut filters = Vec::with_capacity(2);

        if interest.is_readable() {
            filters.push(EVFILT_READ);
        }
        if interest.is_writable() {
            filters.push(EVFILT_WRITE);
        }

        for filter in filters {
            let ev = change(fd as usize, filter, EV_DELETE, 0, 0);

            match apply(self.kq(), &[ev]) {
                Err(err) if !is_gone(&err) => return Err(err),
                _ => {}
            }
        }

        Ok(())
    }

    pub(crate) fn poll(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        events.clear();
        self.events.clear();

        let ts = timeout.map(|t| timespec {
            tv_sec: t.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_nsec: t.subsec_nanos() as _,
        });
        let ts_ptr = ts
            .as_ref()
            .map_or(std::ptr::null(), |t| t as *const timespec);

        let n = unsafe {
            kevent(
                self.kq(),
                std::ptr::null(),
                0,
                self.events.as_mut_ptr(),
                self.events.capacity() as _,
                ts_ptr,
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
            let token = ev.udata as usize as u64;

            if ev.filter == EVFILT_USER || token == WAKE_TOKEN {
                continue;
            }

            let flags = ev.flags;
            let readiness = Readiness {
                readable: ev.filter == EVFILT_READ,
                writable: ev.filter == EVFILT_WRITE,
                error: flags & EV_ERROR != 0,
                hangup: flags & EV_EOF != 0,
            };

            push_event(events, token, readiness);
        }

        Ok(())
    }
}
