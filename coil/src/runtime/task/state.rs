use super::Fault;
use crate::error::{Error, Result};

use std::mem;

/// Completion record of a task.
///
/// At most one of value and fault is ever held, and once the task has
/// completed exactly one of them is, until the result is retrieved.
pub(crate) enum Outcome<T> {
    /// The task has not completed.
    Pending,

    /// The task returned a value.
    Value(T),

    /// The task body panicked.
    Fault(Fault),

    /// The result was already retrieved.
    Taken,
}

impl<T> Outcome<T> {
    /// Returns `true` once the task has completed, retrieved or not.
    pub(crate) fn is_complete(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }

    /// Records the result of a poll that ran the body to its end.
    pub(crate) fn complete(&mut self, result: std::result::Result<T, Fault>) {
        *self = match result {
            Ok(value) => Outcome::Value(value),
            Err(fault) => Outcome::Fault(fault),
        };
    }

    /// Moves the completed result out, leaving `Taken` behind.
    ///
    /// The outer `Result` reports usage errors (`Incomplete`, `ResultTaken`),
    /// the inner one carries the body's own outcome.
    pub(crate) fn take(&mut self) -> Result<std::result::Result<T, Fault>> {
        match self {
            Outcome::Pending => Err(Error::Incomplete),
            Outcome::Taken => Err(Error::ResultTaken),
            _ => match mem::replace(self, Outcome::Taken) {
                Outcome::Value(value) => Ok(Ok(value)),
                Outcome::Fault(fault) => Ok(Err(fault)),
                Outcome::Pending | Outcome::Taken => unreachable!(),
            },
        }
    }
}

/// Observable position of a [`Task`](super::Task) in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Not started yet: the body has never been polled.
    Created,

    /// Started and parked at a suspension point.
    Suspended,

    /// Ran to its end, with a value or a fault.
    Completed,
}
