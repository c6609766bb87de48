use crate::reactor::TimerKey;
use crate::runtime::Handle;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Roughly 30 years: the deadline used when `now + duration` does not fit
/// in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The instant `duration` from now, saturated to [`FAR_FUTURE`].
pub(crate) fn deadline_after(duration: Duration) -> Instant {
    let now = Instant::now();

    now.checked_add(duration).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Creates a future that completes once `duration` has elapsed.
///
/// The deadline is fixed when this function is called, not when the future
/// is first polled. Durations too large to represent, such as
/// `Duration::MAX`, sleep for about 30 years.
///
/// # Panics
///
/// The returned future panics if polled outside of a running runtime.
///
/// # Examples
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// coil::time::sleep_for(Duration::from_millis(10)).await;
/// ```
pub fn sleep_for(duration: Duration) -> Sleep {
    Sleep::new(deadline_after(duration), None)
}

/// Creates a future that completes once `deadline` has passed.
///
/// A deadline in the past completes on first poll without touching the
/// timer queue.
pub fn sleep_until(deadline: Instant) -> Sleep {
    Sleep::new(deadline, None)
}

/// A future that completes once a deadline is reached.
///
/// The timer entry is inserted on first poll. Dropping the future before
/// the deadline removes the entry, so the task is never woken for it.
#[must_use = "futures do nothing unless polled"]
pub struct Sleep {
    deadline: Instant,
    handle: Option<Handle>,
    key: Option<TimerKey>,
}

impl Sleep {
    pub(crate) fn new(deadline: Instant, handle: Option<Handle>) -> Self {
        Self {
            deadline,
            handle,
            key: None,
        }
    }

    /// The instant this sleep completes at.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns `true` once the deadline has passed.
    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn cancel(&mut self) {
        if let (Some(handle), Some(key)) = (&self.handle, self.key.take()) {
            handle.cancel_timer(key);
        }
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.is_elapsed() {
            // The entry may still be queued if we were polled for another
            // reason right at the deadline.
            this.cancel();
            return Poll::Ready(());
        }

        let handle = this.handle.get_or_insert_with(Handle::current);

        match this.key {
            Some(key) => handle.update_timer_waker(key, cx.waker()),
            None => this.key = Some(handle.add_timer(this.deadline, cx.waker().clone())),
        }

        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        self.cancel();
    }
}
