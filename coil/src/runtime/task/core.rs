use super::fault::{Fault, poll_guarded};
use super::state::{Outcome, Stage};
use crate::error::{Error, Result};

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// A lazy unit of asynchronous work.
///
/// A `Task` owns a computation and the record of how it ended. Nothing runs
/// at construction: the body is first polled when the task is awaited (or
/// when it is handed to a combinator or spawned). Awaiting a task suspends
/// the awaiting computation until the task completes, then yields its value
/// or re-raises its fault in the awaiting computation.
///
/// Dropping a task that has not completed drops its body, which releases
/// any timer entry or reactor registration it was parked on. It is never
/// resumed afterwards.
///
/// # Examples
///
/// ```rust,ignore
/// use coil::Task;
///
/// let task = Task::new(async { 40 }).and_then(|v| Task::ready(v + 2));
/// assert_eq!(task.await, 42);
/// ```
pub struct Task<T> {
    body: Option<Pin<Box<dyn Future<Output = T>>>>,
    outcome: Outcome<T>,
    started: bool,
}

// The body is boxed and the outcome is never pinned.
impl<T> Unpin for Task<T> {}

impl<T: 'static> Task<T> {
    /// Wraps a future into a task without polling it.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = T> + 'static,
    {
        Self {
            body: Some(Box::pin(future)),
            outcome: Outcome::Pending,
            started: false,
        }
    }

    /// Runs `self`, then the task produced from its value.
    ///
    /// A fault in either step propagates to whoever awaits the result.
    pub fn and_then<U, F>(self, f: F) -> Task<U>
    where
        U: 'static,
        F: FnOnce(T) -> Task<U> + 'static,
    {
        Task::new(async move {
            let value = self.await;
            f(value).await
        })
    }
}

impl<T> Task<T> {
    /// A task that has already completed with `value`.
    pub fn ready(value: T) -> Self {
        Self {
            body: None,
            outcome: Outcome::Value(value),
            started: true,
        }
    }

    /// A task that has already completed with `fault`.
    pub fn from_fault(fault: Fault) -> Self {
        Self {
            body: None,
            outcome: Outcome::Fault(fault),
            started: true,
        }
    }

    /// Where the task is in its life cycle.
    ///
    /// A task is [`Stage::Suspended`] from its first poll until its body
    /// returns or panics.
    pub fn stage(&self) -> Stage {
        if self.outcome.is_complete() {
            Stage::Completed
        } else if self.started {
            Stage::Suspended
        } else {
            Stage::Created
        }
    }

    /// Returns `true` once the body has run to its end.
    pub fn is_complete(&self) -> bool {
        self.outcome.is_complete()
    }

    /// Drives the body one step without retrieving its result.
    ///
    /// Returns `Poll::Ready(())` once the task has completed. A panic in the
    /// body is captured as the task's fault instead of unwinding through the
    /// caller.
    pub fn poll_complete(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if self.outcome.is_complete() {
            return Poll::Ready(());
        }

        let Some(body) = self.body.as_mut() else {
            return Poll::Ready(());
        };

        self.started = true;
        let result = ready!(poll_guarded(body.as_mut(), cx));

        // The body is finished; release whatever it still holds.
        self.body = None;
        self.outcome.complete(result);

        Poll::Ready(())
    }

    /// Retrieves the result of a completed task.
    ///
    /// Returns the value exactly once; any later call reports
    /// [`Error::ResultTaken`]. Calling it before completion reports
    /// [`Error::Incomplete`].
    ///
    /// # Panics
    ///
    /// Re-raises the task's fault if the body panicked.
    pub fn result(&mut self) -> Result<T> {
        match self.outcome.take()? {
            Ok(value) => Ok(value),
            Err(fault) => fault.resume(),
        }
    }

    /// Like [`result`](Self::result), but reports a fault as
    /// [`Error::Panicked`] instead of re-raising it.
    pub fn try_result(&mut self) -> Result<T> {
        self.outcome.take()?.map_err(Error::Panicked)
    }

    /// A future resolving to the task's value or its captured fault.
    pub fn settle(self) -> Settle<T> {
        Settle { task: self }
    }

    pub(crate) fn take_outcome(&mut self) -> Outcome<T> {
        std::mem::replace(&mut self.outcome, Outcome::Taken)
    }
}

impl<T> Future for Task<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        ready!(this.poll_complete(cx));

        match this.result() {
            Ok(value) => Poll::Ready(value),
            Err(err) => panic!("{err}"),
        }
    }
}

/// Future returned by [`Task::settle`].
pub struct Settle<T> {
    task: Task<T>,
}

impl<T> Future for Settle<T> {
    type Output = std::result::Result<T, Fault>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        ready!(this.task.poll_complete(cx));

        match this.task.outcome.take() {
            Ok(result) => Poll::Ready(result),
            Err(err) => Poll::Ready(Err(Fault::from_message(err.to_string()))),
        }
    }
}
