use super::core::RegistrationKey;
use crate::error::Result;
use crate::io::{Interest, Readiness};
use crate::runtime::Handle;

use std::future::Future;
use std::os::fd::RawFd;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future returned by [`io::wait_readiness`](crate::io::wait_readiness).
///
/// Interest is armed on first poll. Dropping the future before it resolves
/// removes the interest from the OS.
#[must_use = "futures do nothing unless polled"]
pub struct WaitReadiness {
    fd: RawFd,
    interest: Interest,
    handle: Option<Handle>,
    key: Option<RegistrationKey>,
    done: bool,
}

impl WaitReadiness {
    pub(crate) fn new(fd: RawFd, interest: Interest, handle: Option<Handle>) -> Self {
        Self {
            fd,
            interest,
            handle,
            key: None,
            done: false,
        }
    }
}

impl Future for WaitReadiness {
    type Output = Result<Readiness>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        assert!(!this.done, "`WaitReadiness` polled after completion");

        let handle = this.handle.get_or_insert_with(Handle::current);

        let result = match this.key {
            None => match handle.register(this.fd, this.interest, cx.waker().clone()) {
                Ok(key) => {
                    this.key = Some(key);
                    return Poll::Pending;
                }
                Err(err) => Err(err),
            },
            Some(key) => match handle.take_readiness(key, cx.waker()) {
                None => return Poll::Pending,
                Some(result) => {
                    this.key = None;
                    result.map_err(Into::into)
                }
            },
        };

        this.done = true;
        Poll::Ready(result)
    }
}

impl Drop for WaitReadiness {
    fn drop(&mut self) {
        if let (Some(handle), Some(key)) = (&self.handle, self.key.take()) {
            handle.cancel_registration(key);
        }
    }
}
