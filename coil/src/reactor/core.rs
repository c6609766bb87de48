use super::poller::{Event, Notifier, Poller};
use crate::error::{Error, Result};
use crate::io::{Interest, Readiness};
use crate::utils::Slab;

use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::task::Waker;
use std::time::Duration;
use tracing::{debug, trace};

/// Identity of a reactor registration.
///
/// `token` is the user-data word handed to the OS: the slab index in the low
/// half and a sequence number in the high half, so an event for a slot that
/// has since been reused is recognized as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RegistrationKey {
    index: usize,
    token: u64,
}

enum State {
    /// Interest is armed in the OS.
    Armed,

    /// Readiness (or a failure) was delivered and awaits pickup.
    Fired(io::Result<Readiness>),
}

struct Registration {
    fd: RawFd,
    interest: Interest,
    /// User-data word handed to the OS for this registration.
    token: u64,
    /// Woken when the interest fires.
    waker: Waker,
    state: State,
}

/// Turns OS readiness notifications into wake-ups.
///
/// Each registration is one-shot: it is armed once, fires at most once and
/// is then kept only until the waiting future collects the readiness.
pub(crate) struct Reactor {
    /// The OS readiness primitive.
    poller: Poller,
    /// Every registration not yet collected, armed or fired.
    registrations: Slab<Registration>,
    /// Descriptors with armed interest, mapped to their registration.
    descriptors: HashMap<RawFd, usize>,
    /// Batch buffer reused across polls.
    events: Vec<Event>,
    /// Sequence half of the next token.
    next_seq: u32,
}

impl Reactor {
    /// Creates the OS instance. `event_capacity` bounds the events fetched
    /// per poll.
    pub(crate) fn new(event_capacity: usize, registration_capacity: usize) -> io::Result<Self> {
        Ok(Self {
            poller: Poller::new(event_capacity)?,
            registrations: Slab::new(registration_capacity),
            descriptors: HashMap::new(),
            events: Vec::with_capacity(event_capacity),
            next_seq: 0,
        })
    }

    /// The notifier that interrupts a blocking [`poll`](Self::poll).
    pub(crate) fn notifier(&self) -> Arc<Notifier> {
        self.poller.notifier()
    }

    /// Arms one-shot `interest` on `fd`; `waker` is woken when it fires.
    pub(crate) fn register(&mut self, fd: RawFd, interest: Interest, waker: Waker) -> Result<RegistrationKey> {
        if self.descriptors.contains_key(&fd) {
            return Err(Error::AlreadyRegistered { fd });
        }

        self.next_seq = self.next_seq.wrapping_add(1);
        let index = self.registrations.insert(Registration {
            fd,
            interest,
            token: 0,
            waker,
            state: State::Armed,
        });
        let token = (u64::from(self.next_seq) << 32) | index as u64;

        if let Err(err) = self.poller.register(fd, token, interest) {
            debug!(fd, error = %err, "registration failed");
            self.registrations.remove(index);
            return Err(Error::Reactor(err));
        }

        if let Some(registration) = self.registrations.get_mut(index) {
            registration.token = token;
        }
        self.descriptors.insert(fd, index);

        trace!(fd, token, "interest armed");
        Ok(RegistrationKey { index, token })
    }

    /// Collects the readiness of a fired registration, releasing it.
    ///
    /// Returns `None` while the registration is still armed, after
    /// refreshing its waker.
    pub(crate) fn take(&mut self, key: RegistrationKey, waker: &Waker) -> Option<io::Result<Readiness>> {
        let registration = match self.registrations.get_mut(key.index) {
            Some(r) if r.token == key.token => r,
            _ => return Some(Err(io::Error::other("registration no longer exists"))),
        };

        if let State::Armed = registration.state {
            if !registration.waker.will_wake(waker) {
                registration.waker = waker.clone();
            }
            return None;
        }

        match self.registrations.remove(key.index) {
            Some(Registration {
                state: State::Fired(result),
                ..
            }) => Some(result),
            _ => None,
        }
    }

    /// Drops a registration, removing its interest from the OS if it never
    /// fired. Stale keys are ignored.
    pub(crate) fn cancel(&mut self, key: RegistrationKey) {
        if !matches!(self.registrations.get(key.index), Some(r) if r.token == key.token) {
            return;
        }

        if let Some(registration) = self.registrations.remove(key.index)
            && let State::Armed = registration.state
        {
            self.disarm(registration.fd, registration.interest);
            trace!(fd = registration.fd, "interest cancelled");
        }
    }

    /// Waits up to `timeout` for readiness and returns the wakers to resume.
    ///
    /// Every matched registration receives its readiness before any waker is
    /// returned; the caller wakes them once the reactor is no longer
    /// borrowed.
    pub(crate) fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<Waker>> {
        self.poller.poll(&mut self.events, timeout)?;

        let mut wakers = Vec::with_capacity(self.events.len());

        for i in 0..self.events.len() {
            let Event { token, readiness } = self.events[i];
            let index = (token & u64::from(u32::MAX)) as usize;

            let Some(registration) = self.registrations.get_mut(index) else {
                continue;
            };

            if registration.token != token {
                continue;
            }

            // Both halves of a kqueue registration may fire in one batch.
            let first = match &mut registration.state {
                State::Armed => true,
                State::Fired(Ok(seen)) => {
                    *seen |= readiness;
                    false
                }
                State::Fired(Err(_)) => false,
            };

            if first {
                registration.state = State::Fired(Ok(readiness));
                wakers.push(registration.waker.clone());

                let (fd, interest) = (registration.fd, registration.interest);
                self.disarm(fd, interest);
            }
        }

        if !wakers.is_empty() {
            trace!(events = self.events.len(), woken = wakers.len(), "reactor batch");
        }

        Ok(wakers)
    }

    /// Completes every armed registration with `err`.
    ///
    /// Used when the OS wait itself fails, so that the failure surfaces at
    /// each wait point instead of leaving them suspended forever.
    pub(crate) fn fail_all(&mut self, err: &io::Error) -> Vec<Waker> {
        debug!(error = %err, armed = self.descriptors.len(), "reactor poll failed");

        let armed: Vec<(RawFd, usize)> = self.descriptors.drain().collect();
        let mut wakers = Vec::with_capacity(armed.len());

        for (fd, index) in armed {
            if let Some(registration) = self.registrations.get_mut(index) {
                registration.state = State::Fired(Err(duplicate(err)));
                wakers.push(registration.waker.clone());

                if let Err(err) = self.poller.deregister(fd, registration.interest) {
                    debug!(fd, error = %err, "failed to remove interest");
                }
            }
        }

        wakers
    }

    /// Number of registrations whose interest is still armed.
    pub(crate) fn outstanding(&self) -> usize {
        self.descriptors.len()
    }

    /// Forgets the armed interest of `fd` and removes it from the OS set.
    fn disarm(&mut self, fd: RawFd, interest: Interest) {
        self.descriptors.remove(&fd);

        if let Err(err) = self.poller.deregister(fd, interest) {
            debug!(fd, error = %err, "failed to remove interest");
        }
    }
}

fn duplicate(err: &io::Error) -> io::Error {
    match err.raw_os_error() {
        Some(code) => io::Error::from_raw_os_error(code),
        None => io::Error::new(err.kind(), err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::Reactor;
    use crate::error::Error;
    use crate::io::Interest;

    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::task::Waker;
    use std::time::Duration;

    fn reactor() -> Reactor {
        Reactor::new(16, 4).expect("failed to create reactor")
    }

    #[test]
    fn fires_once_and_releases_the_descriptor() {
        let mut reactor = reactor();
        let (a, mut b) = UnixStream::pair().unwrap();

        let key = reactor
            .register(a.as_raw_fd(), Interest::READABLE, Waker::noop().clone())
            .unwrap();
        assert_eq!(reactor.outstanding(), 1);
        assert!(reactor.take(key, Waker::noop()).is_none());

        b.write_all(b"x").unwrap();
        let woken = reactor.poll(Some(Duration::from_secs(1))).unwrap();

        assert_eq!(woken.len(), 1);
        assert_eq!(reactor.outstanding(), 0);

        let readiness = reactor.take(key, Waker::noop()).unwrap().unwrap();
        assert!(readiness.readable);

        // Fired and collected: nothing is left to report.
        let woken = reactor.poll(Some(Duration::ZERO)).unwrap();
        assert!(woken.is_empty());
    }

    #[test]
    fn second_wait_on_a_descriptor_is_rejected() {
        let mut reactor = reactor();
        let (a, _b) = UnixStream::pair().unwrap();
        let fd = a.as_raw_fd();

        reactor
            .register(fd, Interest::READABLE, Waker::noop().clone())
            .unwrap();
        let err = reactor
            .register(fd, Interest::WRITABLE, Waker::noop().clone())
            .unwrap_err();

        assert!(matches!(err, Error::AlreadyRegistered { fd: f } if f == fd));
    }

    #[test]
    fn cancel_removes_armed_interest() {
        let mut reactor = reactor();
        let (a, mut b) = UnixStream::pair().unwrap();

        let key = reactor
            .register(a.as_raw_fd(), Interest::READABLE, Waker::noop().clone())
            .unwrap();
        reactor.cancel(key);
        assert_eq!(reactor.outstanding(), 0);

        b.write_all(b"x").unwrap();
        let woken = reactor.poll(Some(Duration::from_millis(20))).unwrap();
        assert!(woken.is_empty());

        // The descriptor can be waited on again.
        reactor
            .register(a.as_raw_fd(), Interest::READABLE, Waker::noop().clone())
            .unwrap();
        let woken = reactor.poll(Some(Duration::from_secs(1))).unwrap();
        assert_eq!(woken.len(), 1);
    }

    #[test]
    fn one_batch_fires_every_registration_before_any_wake() {
        let mut reactor = reactor();
        let (a1, mut b1) = UnixStream::pair().unwrap();
        let (a2, mut b2) = UnixStream::pair().unwrap();

        let first = reactor
            .register(a1.as_raw_fd(), Interest::READABLE, Waker::noop().clone())
            .unwrap();
        let second = reactor
            .register(a2.as_raw_fd(), Interest::READABLE, Waker::noop().clone())
            .unwrap();

        b1.write_all(b"1").unwrap();
        b2.write_all(b"2").unwrap();

        let woken = reactor.poll(Some(Duration::from_secs(1))).unwrap();
        assert_eq!(woken.len(), 2);
        assert_eq!(reactor.outstanding(), 0);

        // The first waiter re-arms on the second descriptor before the
        // second waiter has collected its readiness.
        assert!(reactor.take(first, Waker::noop()).unwrap().unwrap().readable);
        let rearmed = reactor
            .register(a2.as_raw_fd(), Interest::READABLE, Waker::noop().clone())
            .unwrap();
        assert_eq!(reactor.outstanding(), 1);

        assert!(reactor.take(second, Waker::noop()).unwrap().unwrap().readable);
        assert!(reactor.take(rearmed, Waker::noop()).is_none());

        // Unread data keeps the descriptor readable for the new wait.
        let woken = reactor.poll(Some(Duration::from_secs(1))).unwrap();
        assert_eq!(woken.len(), 1);
        assert!(reactor.take(rearmed, Waker::noop()).unwrap().unwrap().readable);
    }

    #[test]
    fn invalid_descriptor_reports_a_reactor_error() {
        let mut reactor = reactor();

        let err = reactor
            .register(-1, Interest::READABLE, Waker::noop().clone())
            .unwrap_err();

        assert!(matches!(err, Error::Reactor(_)));
        assert_eq!(reactor.outstanding(), 0);
    }

    #[test]
    fn fail_all_completes_armed_registrations() {
        let mut reactor = reactor();
        let (a, _b) = UnixStream::pair().unwrap();

        let key = reactor
            .register(a.as_raw_fd(), Interest::READABLE, Waker::noop().clone())
            .unwrap();
        let err = std::io::Error::from_raw_os_error(libc::EINVAL);

        assert_eq!(reactor.fail_all(&err).len(), 1);
        assert_eq!(reactor.outstanding(), 0);

        let result = reactor.take(key, Waker::noop()).unwrap();
        assert_eq!(result.unwrap_err().raw_os_error(), Some(libc::EINVAL));
    }
}
