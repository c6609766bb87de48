//! Time utilities.
//!
//! - [`sleep_for`] and [`sleep_until`] suspend the calling task,
//! - [`timeout`] bounds how long a future may take.
//!
//! All of them are backed by the runtime's timer queue and must be polled
//! from a task.

mod sleep;
mod timeout;

#[doc(inline)]
pub use sleep::{Sleep, sleep_for, sleep_until};

pub(crate) use sleep::deadline_after;

#[doc(inline)]
pub use timeout::{Elapsed, Timeout, timeout};
