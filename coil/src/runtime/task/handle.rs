use super::Task;
use super::state::Outcome;
use crate::error::{Error, Result};
use crate::runtime::executor::Core;

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker, ready};

/// Where a top-level task reports its completion.
pub(crate) struct JoinState<T> {
    outcome: Outcome<T>,
    waiter: Option<Waker>,
    aborted: bool,
}

impl<T> JoinState<T> {
    fn finished(&self) -> bool {
        self.outcome.is_complete() || self.aborted
    }

    fn take(&mut self) -> Result<std::result::Result<T, super::Fault>> {
        match self.outcome.take() {
            Err(Error::Incomplete) if self.aborted => Err(Error::Aborted),
            other => other,
        }
    }
}

/// The future the scheduler runs for a spawned task.
///
/// Drives the task and moves its outcome into the shared [`JoinState`].
/// Dropping it before completion marks the task as aborted.
pub(crate) struct Harness<T> {
    task: Task<T>,
    state: Rc<RefCell<JoinState<T>>>,
}

impl<T> Future for Harness<T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        ready!(this.task.poll_complete(cx));

        let outcome = this.task.take_outcome();
        let waiter = {
            let mut state = this.state.borrow_mut();
            state.outcome = outcome;
            state.waiter.take()
        };

        if let Some(waiter) = waiter {
            waiter.wake();
        }

        Poll::Ready(())
    }
}

impl<T> Drop for Harness<T> {
    fn drop(&mut self) {
        let waiter = {
            let mut state = self.state.borrow_mut();

            if state.outcome.is_complete() {
                None
            } else {
                state.aborted = true;
                state.waiter.take()
            }
        };

        if let Some(waiter) = waiter {
            waiter.wake();
        }
    }
}

/// An owned permission to retrieve the result of a spawned task.
///
/// Awaiting a `JoinHandle` yields the task's value, or re-raises its fault
/// in the awaiting task.
///
/// Dropping a `JoinHandle` detaches the task: it keeps running, and its
/// result is discarded. Use [`abort`](Self::abort) to destroy it instead.
pub struct JoinHandle<T> {
    state: Rc<RefCell<JoinState<T>>>,
    key: usize,
    id: u64,
    core: Weak<Core>,
}

impl<T: 'static> JoinHandle<T> {
    /// Spawns `task` on `core`.
    pub(crate) fn spawn(core: &Rc<Core>, task: Task<T>) -> Self {
        let state = Rc::new(RefCell::new(JoinState {
            outcome: Outcome::Pending,
            waiter: None,
            aborted: false,
        }));

        let harness = Harness {
            task,
            state: state.clone(),
        };
        let (key, id) = core.spawn(Box::pin(harness));

        Self {
            state,
            key,
            id,
            core: Rc::downgrade(core),
        }
    }
}

impl<T> JoinHandle<T> {
    /// Returns `true` once the task has completed or was aborted.
    pub fn is_finished(&self) -> bool {
        self.state.borrow().finished()
    }

    /// Destroys the task if it has not completed yet.
    ///
    /// Its body is dropped right away, releasing any timer or readiness
    /// wait it was parked on. If the task aborts itself, the body is dropped
    /// as soon as the current poll returns. Aborting a finished task does
    /// nothing.
    pub fn abort(&self) {
        if self.is_finished() {
            return;
        }

        if let Some(core) = self.core.upgrade() {
            core.abort(self.key, self.id);
        }
    }

    /// Retrieves the result of the finished task.
    ///
    /// Reports [`Error::Incomplete`] while it runs, [`Error::Aborted`] if it
    /// was aborted and [`Error::ResultTaken`] after the result was already
    /// retrieved.
    ///
    /// # Panics
    ///
    /// Re-raises the task's fault if its body panicked.
    pub fn result(&mut self) -> Result<T> {
        match self.state.borrow_mut().take()? {
            Ok(value) => Ok(value),
            Err(fault) => fault.resume(),
        }
    }

    /// Like [`result`](Self::result), but reports a fault as
    /// [`Error::Panicked`].
    pub fn try_result(&mut self) -> Result<T> {
        self.state.borrow_mut().take()?.map_err(Error::Panicked)
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();

        {
            let mut state = this.state.borrow_mut();

            if !state.finished() {
                match &state.waiter {
                    Some(waiter) if waiter.will_wake(cx.waker()) => {}
                    _ => state.waiter = Some(cx.waker().clone()),
                }
                return Poll::Pending;
            }
        }

        match this.result() {
            Ok(value) => Poll::Ready(value),
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}
