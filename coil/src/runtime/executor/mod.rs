//! Single-threaded scheduler.
//!
//! Tasks live in a table owned by the scheduler and are addressed by key.
//! Wakers only carry a [`Header`], so waking a task (from any thread)
//! appends its key to the ready queue and never touches the task itself.

mod core;
mod queue;

pub(crate) use self::core::Core;
pub(crate) use queue::Header;
