use super::sleep::{Sleep, sleep_for};

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Error returned by [`timeout`] when the deadline passes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline has elapsed")]
pub struct Elapsed(());

/// Bounds the time `future` may take.
///
/// Resolves to `Ok(output)` if `future` completes first, or to
/// `Err(Elapsed)` once `duration` has passed, in which case `future` is
/// dropped along with any wait it was parked on. `Duration::MAX` means no
/// practical limit.
///
/// # Examples
///
/// ```rust,ignore
/// use coil::time::{sleep_for, timeout};
/// use std::time::Duration;
///
/// let slow = sleep_for(Duration::from_secs(10));
/// assert!(timeout(Duration::from_millis(5), slow).await.is_err());
/// ```
pub fn timeout<F>(duration: Duration, future: F) -> Timeout<F>
where
    F: Future,
{
    Timeout {
        future,
        sleep: sleep_for(duration),
    }
}

/// Future returned by [`timeout`].
#[must_use = "futures do nothing unless polled"]
pub struct Timeout<F> {
    future: F,
    sleep: Sleep,
}

impl<F> Future for Timeout<F>
where
    F: Future,
{
    type Output = Result<F::Output, Elapsed>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // SAFETY: `future` is never moved out of `self`, and `sleep` is
        // `Unpin`.
        let this = unsafe { self.get_unchecked_mut() };

        let future = unsafe { Pin::new_unchecked(&mut this.future) };
        if let Poll::Ready(value) = future.poll(cx) {
            return Poll::Ready(Ok(value));
        }

        if let Poll::Ready(()) = Pin::new(&mut this.sleep).poll(cx) {
            return Poll::Ready(Err(Elapsed(())));
        }

        Poll::Pending
    }
}
