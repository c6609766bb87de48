//! Tasks and their completion protocol.
//!
//! A [`Task`] is a lazy computation plus the record of how it ended. It runs
//! when awaited, and its result can be retrieved exactly once. A task handed
//! to [`spawn`] becomes a top-level task driven by the scheduler and
//! observed through a [`JoinHandle`].

mod core;
mod fault;
mod handle;
mod state;

pub(crate) mod waker;

pub use self::core::{Settle, Task};
pub use fault::Fault;
pub use handle::JoinHandle;
pub use state::Stage;

use crate::runtime::Handle;

use std::future::Future;

/// Spawns `future` on the runtime driving the current thread.
///
/// The task is appended to the tail of the ready queue and starts running
/// on a later pass; the caller keeps running.
///
/// # Panics
///
/// Panics if called outside of a running runtime.
///
/// # Examples
///
/// ```rust,ignore
/// let handle = coil::spawn(async { 21 * 2 });
/// assert_eq!(handle.await, 42);
/// ```
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    Handle::current().spawn(future)
}
