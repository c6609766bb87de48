use crate::reactor::Notifier;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// State shared between the driver and every waker it hands out.
///
/// Wakers must be `Send + Sync`, so this is the only part of the runtime
/// that is reachable from other threads.
pub(crate) struct Shared {
    /// FIFO of tasks eligible to run.
    ready: Mutex<VecDeque<Arc<Header>>>,

    /// Set while the driver is blocked in the OS wait.
    parked: AtomicBool,

    /// Interrupts the OS wait.
    notifier: Arc<Notifier>,
}

impl Shared {
    /// Creates an empty queue that interrupts the OS wait through
    /// `notifier`.
    pub(crate) fn new(notifier: Arc<Notifier>) -> Self {
        Self {
            ready: Mutex::new(VecDeque::new()),
            parked: AtomicBool::new(false),
            notifier,
        }
    }

    /// Appends a task at the tail, waking the driver if it is parked.
    pub(crate) fn push(&self, header: Arc<Header>) {
        self.ready.lock().push_back(header);

        if self.parked.load(Ordering::SeqCst) {
            self.notifier.notify();
        }
    }

    /// Removes the entries present right now, leaving later pushes for the
    /// next pass.
    pub(crate) fn take_batch(&self) -> Vec<Arc<Header>> {
        self.ready.lock().drain(..).collect()
    }

    /// Returns `true` if some task is waiting to be polled.
    pub(crate) fn has_ready(&self) -> bool {
        !self.ready.lock().is_empty()
    }

    /// Marks the driver as parked and reports whether it may block.
    ///
    /// The flag is raised before the queue is checked, so a wake racing with
    /// the driver either is seen here or triggers the notifier.
    pub(crate) fn park(&self) -> bool {
        self.parked.store(true, Ordering::SeqCst);
        !self.has_ready()
    }

    /// Clears the parked flag once the OS wait has returned.
    pub(crate) fn unpark(&self) {
        self.parked.store(false, Ordering::SeqCst);
    }
}

/// Identity of a spawned task, shared by its wakers.
pub(crate) struct Header {
    /// Slot of the task in the task table.
    pub(crate) key: usize,

    /// Unique id; a slot reused by another task carries a different one.
    pub(crate) id: u64,

    /// Set while the task sits in the ready queue.
    queued: AtomicBool,

    /// The queue this task is pushed onto when woken.
    shared: Arc<Shared>,
}

impl Header {
    /// Creates the header of the task stored at `key`, not yet queued.
    pub(crate) fn new(key: usize, id: u64, shared: Arc<Shared>) -> Self {
        Self {
            key,
            id,
            queued: AtomicBool::new(false),
            shared,
        }
    }

    /// Appends the task to the ready queue unless it is already there.
    pub(crate) fn schedule(self: &Arc<Self>) {
        if !self.queued.swap(true, Ordering::AcqRel) {
            self.shared.push(self.clone());
        }
    }

    /// Called when the task leaves the ready queue to be polled.
    pub(crate) fn dequeue(&self) {
        self.queued.store(false, Ordering::Release);
    }
}
