use super::builder::{Config, RuntimeBuilder};
use super::context;
use super::executor::Core;
use super::task::JoinHandle;
use super::Handle;
use crate::error::{Error, Result};

use std::future::Future;
use std::rc::Rc;
use tracing::debug;

/// A single-threaded runtime.
///
/// `Runtime` owns the scheduler, the timer queue and the reactor. Tasks run
/// only while the runtime is driven by [`run`](Self::run) or
/// [`block_on`](Self::block_on), one at a time, switching only at their
/// suspension points.
///
/// Dropping the runtime destroys every task that has not completed.
pub struct Runtime {
    handle: Handle,
}

impl Runtime {
    /// Creates a runtime with the default configuration.
    pub fn new() -> Result<Self> {
        RuntimeBuilder::new().build()
    }

    pub(crate) fn with_config(config: Config) -> Result<Self> {
        let core = Core::new(config)?;

        Ok(Self {
            handle: Handle::new(Rc::new(core)),
        })
    }

    /// A handle to this runtime.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawns a top-level task. It starts running once the runtime is
    /// driven.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        self.handle.spawn(future)
    }

    /// Drives the runtime until it is idle: no task ready, no timer pending
    /// and no readiness wait armed.
    ///
    /// # Panics
    ///
    /// Panics if another runtime is already driving the current thread.
    pub fn run(&self) {
        let _guard = self.enter();
        self.handle.core().drive(&|| false, false);
    }

    /// Runs `future` to completion as the root task, blocking the current
    /// thread.
    ///
    /// Other tasks progress while the root runs. When the root completes,
    /// the call returns even if other tasks are still pending; they resume
    /// the next time the runtime is driven.
    ///
    /// # Panics
    ///
    /// Re-raises the root task's fault. Panics with [`Error::Stalled`] if
    /// the runtime goes idle before the root completes (see
    /// [`try_block_on`](Self::try_block_on)), and panics if another runtime
    /// is already driving the current thread.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let runtime = Runtime::new()?;
    /// let value = runtime.block_on(async { 42 });
    /// assert_eq!(value, 42);
    /// ```
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        match self.try_block_on(future) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`block_on`](Self::block_on), but reports a root that can no
    /// longer make progress as [`Error::Stalled`] instead of panicking.
    ///
    /// The root is stalled once no task is ready, no timer is pending and
    /// no readiness wait is armed. Before giving up, the driver waits up to
    /// `max_poll_wait` for a wake coming from another thread. A stalled
    /// root is destroyed before this returns.
    ///
    /// # Panics
    ///
    /// Re-raises the root task's fault, and panics if another runtime is
    /// already driving the current thread.
    pub fn try_block_on<F>(&self, future: F) -> Result<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let _guard = self.enter();

        let mut root = self.handle.spawn(future);
        self.handle.core().drive(&|| root.is_finished(), true);

        if !root.is_finished() {
            debug!(live_tasks = self.handle.live_tasks(), "root task stalled");
            root.abort();
            return Err(Error::Stalled);
        }

        match root.try_result() {
            Ok(value) => Ok(value),
            Err(Error::Panicked(fault)) => fault.resume(),
            Err(err) => Err(err),
        }
    }

    fn enter(&self) -> context::EnterGuard {
        match context::enter(self.handle.clone()) {
            Ok(guard) => guard,
            Err(err) => panic!("{err}"),
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.handle.core().shutdown();
    }
}
