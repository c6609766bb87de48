//! Timers and I/O readiness.
//!
//! The two leaves the scheduler composes: an expiry-ordered timer queue and
//! a reactor over the OS readiness primitive. Neither knows about the other
//! or about tasks; both only hold wakers.

mod core;
mod future;
mod timer;

pub(crate) mod poller;

pub(crate) use self::core::{Reactor, RegistrationKey};
pub(crate) use poller::Notifier;
pub(crate) use timer::TimerQueue;

pub use future::WaitReadiness;
pub use timer::TimerKey;
