use crate::runtime::executor::Header;

use std::mem;
use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

/// Vtable for wakers backed by an `Arc<Header>`.
///
/// Every function must keep the reference count of the header balanced:
/// `clone` adds one, `wake` and `drop` release the one owned by the waker,
/// `wake_by_ref` leaves it untouched.
static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

/// Creates a [`Waker`] that re-queues the task described by `header`.
pub(crate) fn make_waker(header: Arc<Header>) -> Waker {
    // SAFETY: the pointer comes from `Arc::into_raw` and every vtable entry
    // treats it as an `Arc<Header>`.
    unsafe { Waker::from_raw(RawWaker::new(Arc::into_raw(header) as *const (), &VTABLE)) }
}

fn clone_raw(ptr: *const ()) -> RawWaker {
    let arc = unsafe { Arc::<Header>::from_raw(ptr as *const Header) };
    let cloned = arc.clone();
    mem::forget(arc);

    RawWaker::new(Arc::into_raw(cloned) as *const (), &VTABLE)
}

fn wake_raw(ptr: *const ()) {
    let arc = unsafe { Arc::<Header>::from_raw(ptr as *const Header) };
    arc.schedule();
}

fn wake_by_ref_raw(ptr: *const ()) {
    let arc = unsafe { Arc::<Header>::from_raw(ptr as *const Header) };
    arc.schedule();
    mem::forget(arc);
}

fn drop_raw(ptr: *const ()) {
    drop(unsafe { Arc::<Header>::from_raw(ptr as *const Header) });
}
