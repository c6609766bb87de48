use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A panic captured at a task boundary.
///
/// When a task body panics, the unwind is stopped at the task and the
/// payload is stored as the task's fault. Retrieving the task's result
/// re-raises it with [`resume`](Self::resume), so the panic continues in
/// whichever task retrieves it and propagates up the await chain until some
/// ancestor handles it or it reaches the code driving the runtime.
pub struct Fault {
    payload: Box<dyn Any + Send + 'static>,
}

impl Fault {
    /// Wraps a panic payload.
    pub fn new(payload: Box<dyn Any + Send + 'static>) -> Self {
        Self { payload }
    }

    /// Builds a fault carrying a message, as `panic!("{message}")` would.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::new(Box::new(message.into()))
    }

    /// The panic message, when the payload is a string.
    pub fn message(&self) -> Option<&str> {
        if let Some(s) = self.payload.downcast_ref::<&'static str>() {
            return Some(s);
        }

        self.payload.downcast_ref::<String>().map(String::as_str)
    }

    /// Returns `true` if the payload is of type `E`.
    pub fn is<E: Any>(&self) -> bool {
        self.payload.is::<E>()
    }

    /// Borrows the payload as `E`, if it has that type.
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    /// Consumes the fault and returns the raw payload.
    pub fn into_panic(self) -> Box<dyn Any + Send + 'static> {
        self.payload
    }

    /// Re-raises the captured panic in the current thread.
    pub fn resume(self) -> ! {
        panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("message", &self.message().unwrap_or("<non-string payload>"))
            .finish()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message().unwrap_or("<non-string payload>"))
    }
}

/// Polls `future`, turning a panic during the poll into a [`Fault`].
pub(crate) fn poll_guarded<F>(future: Pin<&mut F>, cx: &mut Context<'_>) -> Poll<Result<F::Output, Fault>>
where
    F: Future + ?Sized,
{
    match panic::catch_unwind(AssertUnwindSafe(|| future.poll(cx))) {
        Ok(Poll::Pending) => Poll::Pending,
        Ok(Poll::Ready(value)) => Poll::Ready(Ok(value)),
        Err(payload) => Poll::Ready(Err(Fault::new(payload))),
    }
}
