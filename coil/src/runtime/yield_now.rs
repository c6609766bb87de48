use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that yields back to the scheduler exactly once.
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    /// On the first poll the task re-queues itself at the tail of the ready
    /// queue and suspends. On the second poll it completes.
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.0 {
            self.0 = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }

        Poll::Ready(())
    }
}

/// Yields execution back to the scheduler.
///
/// Every task that is already ready runs before the caller resumes, in a
/// later pass of the driving loop.
///
/// # Examples
///
/// ```rust,ignore
/// async fn crunch() {
///     for chunk in work() {
///         process(chunk);
///         coil::yield_now().await;
///     }
/// }
/// ```
pub async fn yield_now() {
    YieldOnce(false).await
}
