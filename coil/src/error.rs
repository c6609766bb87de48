use crate::runtime::task::Fault;

use std::io;
use std::os::fd::RawFd;

/// Errors reported by the runtime.
///
/// Faults raised inside task bodies are not errors by themselves: they are
/// captured as a [`Fault`] and re-raised where the task's result is
/// retrieved. They only appear here when a caller explicitly asks for them
/// through `try_result`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The task body panicked.
    #[error("task panicked: {0}")]
    Panicked(Fault),

    /// The result of a completed task was already retrieved.
    #[error("task result already retrieved")]
    ResultTaken,

    /// The task has not completed yet.
    #[error("task has not completed")]
    Incomplete,

    /// The task was destroyed before it completed.
    #[error("task was aborted before completion")]
    Aborted,

    /// The OS readiness primitive failed for this wait.
    #[error("reactor failure: {0}")]
    Reactor(#[from] io::Error),

    /// The descriptor already has an outstanding readiness wait.
    #[error("descriptor {fd} already has an outstanding readiness wait")]
    AlreadyRegistered { fd: RawFd },

    /// A runtime-owned future was polled while no runtime was driving.
    #[error("no runtime is driving the current thread")]
    NoRuntime,

    /// A runtime was started while another one drives the current thread.
    #[error("a runtime is already driving the current thread")]
    NestedRuntime,

    /// The runtime went idle while the root task of `block_on` was still
    /// pending, so nothing could ever resume it.
    #[error("the runtime is idle but the root task has not completed")]
    Stalled,

    /// `race_first` was given no tasks.
    #[error("race_first requires at least one task")]
    EmptyRace,
}

/// Result type used throughout the runtime.
pub type Result<T, E = Error> = std::result::Result<T, E>;
