use super::context;
use super::executor::Core;
use super::task::{JoinHandle, Task};
use crate::error::{Error, Result};
use crate::io::{Descriptor, Interest, Readiness};
use crate::reactor::{RegistrationKey, TimerKey, WaitReadiness};
use crate::time::{Sleep, deadline_after};

use std::fmt;
use std::future::Future;
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::task::Waker;
use std::time::{Duration, Instant};

/// A reference to one runtime instance.
///
/// Handles are cheap to clone and tied to the thread that created the
/// runtime. Everything a task can ask of the scheduler goes through one:
/// spawning, timers, readiness waits and the counters used to observe the
/// scheduler from tests and hosts.
#[derive(Clone)]
pub struct Handle {
    core: Rc<Core>,
}

impl Handle {
    pub(crate) fn new(core: Rc<Core>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Rc<Core> {
        &self.core
    }

    /// The runtime driving the current thread.
    ///
    /// # Panics
    ///
    /// Panics if no runtime is driving the current thread.
    pub fn current() -> Self {
        match Self::try_current() {
            Ok(handle) => handle,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`current`](Self::current), but reports [`Error::NoRuntime`]
    /// instead of panicking.
    pub fn try_current() -> Result<Self> {
        context::current().ok_or(Error::NoRuntime)
    }

    /// Spawns `future` as a top-level task at the tail of the ready queue.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        JoinHandle::spawn(&self.core, Task::new(future))
    }

    /// Schedules `waker` to be woken once `deadline` has passed.
    pub fn add_timer(&self, deadline: Instant, waker: Waker) -> TimerKey {
        self.core.add_timer(deadline, waker)
    }

    /// Removes a pending timer entry.
    ///
    /// Returns `false`, and does nothing, if the entry already fired or was
    /// already removed.
    pub fn cancel_timer(&self, key: TimerKey) -> bool {
        self.core.cancel_timer(key)
    }

    pub(crate) fn update_timer_waker(&self, key: TimerKey, waker: &Waker) {
        self.core.update_timer_waker(key, waker);
    }

    /// Like [`time::sleep_for`](crate::time::sleep_for), bound to this
    /// runtime.
    pub fn sleep_for(&self, duration: Duration) -> Sleep {
        Sleep::new(deadline_after(duration), Some(self.clone()))
    }

    /// Like [`time::sleep_until`](crate::time::sleep_until), bound to this
    /// runtime.
    pub fn sleep_until(&self, deadline: Instant) -> Sleep {
        Sleep::new(deadline, Some(self.clone()))
    }

    /// Like [`io::wait_readiness`](crate::io::wait_readiness), bound to this
    /// runtime.
    pub fn wait_readiness<D>(&self, descriptor: &D, interest: Interest) -> WaitReadiness
    where
        D: Descriptor + ?Sized,
    {
        WaitReadiness::new(descriptor.raw_fd(), interest, Some(self.clone()))
    }

    pub(crate) fn register(&self, fd: RawFd, interest: Interest, waker: Waker) -> Result<RegistrationKey> {
        self.core.register(fd, interest, waker)
    }

    pub(crate) fn take_readiness(&self, key: RegistrationKey, waker: &Waker) -> Option<io::Result<Readiness>> {
        self.core.take_readiness(key, waker)
    }

    pub(crate) fn cancel_registration(&self, key: RegistrationKey) {
        self.core.cancel_registration(key);
    }

    /// Number of timer entries that have neither fired nor been removed.
    pub fn pending_timers(&self) -> usize {
        self.core.pending_timers()
    }

    /// Number of readiness waits whose interest is still armed.
    pub fn registrations(&self) -> usize {
        self.core.registrations()
    }

    /// Number of top-level tasks that have not completed.
    pub fn live_tasks(&self) -> usize {
        self.core.live_tasks()
    }

    /// Returns `true` if no task is ready, no timer is pending and no
    /// interest is armed.
    pub fn is_idle(&self) -> bool {
        self.core.is_idle()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("live_tasks", &self.live_tasks())
            .field("pending_timers", &self.pending_timers())
            .field("registrations", &self.registrations())
            .finish()
    }
}
