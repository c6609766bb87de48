use super::Handle;
use crate::error::{Error, Result};

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

thread_local! {
    /// The runtime driving this thread.
    ///
    /// Only set for the duration of `Runtime::run` / `Runtime::block_on`, so
    /// runtime-owned futures can find their scheduler without a handle being
    /// threaded through every call.
    static CURRENT: RefCell<Option<Handle>> = const { RefCell::new(None) };
}

/// Restores the empty context when the driving call returns or unwinds.
pub(crate) struct EnterGuard {
    _not_send: PhantomData<Rc<()>>,
}

/// Installs `handle` as the current runtime.
///
/// Fails with [`Error::NestedRuntime`] if another runtime is already
/// driving this thread.
pub(crate) fn enter(handle: Handle) -> Result<EnterGuard> {
    CURRENT.with(|current| {
        let mut current = current.borrow_mut();

        if current.is_some() {
            return Err(Error::NestedRuntime);
        }

        *current = Some(handle);
        Ok(EnterGuard {
            _not_send: PhantomData,
        })
    })
}

/// The runtime driving this thread, if any.
pub(crate) fn current() -> Option<Handle> {
    CURRENT.try_with(|current| current.borrow().clone()).ok().flatten()
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let previous = CURRENT
            .try_with(|current| current.borrow_mut().take())
            .ok()
            .flatten();

        drop(previous);
    }
}
