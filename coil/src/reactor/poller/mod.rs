//! OS readiness backends.
//!
//! Both backends expose the same surface to the reactor:
//!
//! - `Poller::new(capacity)` creates the OS instance and its notifier,
//! - `register(fd, token, interest)` arms one-shot interest,
//! - `deregister(fd, interest)` removes it (a descriptor that is already
//!   gone is not an error),
//! - `poll(events, timeout)` waits for at least one event.
//!
//! The [`Notifier`] interrupts a blocking `poll` from any thread.

mod common;
mod unix;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod epoll;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
mod kqueue;

pub(crate) use common::Event;
pub(crate) use unix::set_nonblocking;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use epoll::{Notifier, Poller};

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
pub(crate) use kqueue::{Notifier, Poller};
