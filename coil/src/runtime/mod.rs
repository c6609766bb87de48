//! The runtime: tasks, the scheduler and its context.
//!
//! A [`Runtime`] owns one scheduler. The scheduler holds the task table and
//! a FIFO ready queue, and composes the timer queue and the reactor into a
//! single driving loop. A [`Handle`] is the explicit context object through
//! which tasks reach their scheduler; while a runtime drives, its handle is
//! also available from [`Handle::current`].

mod core;
mod executor;

pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod handle;
pub(crate) mod yield_now;

pub mod task;

pub use self::core::Runtime;
pub use handle::Handle;
