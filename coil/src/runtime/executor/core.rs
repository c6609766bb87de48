use super::queue::{Header, Shared};
use crate::error::Result;
use crate::io::{Interest, Readiness};
use crate::reactor::{Reactor, RegistrationKey, TimerKey, TimerQueue};
use crate::runtime::builder::Config;
use crate::runtime::task::waker::make_waker;
use crate::utils::Slab;

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::io;
use std::os::fd::RawFd;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

type BoxFuture = Pin<Box<dyn Future<Output = ()>>>;

struct TaskSlot {
    /// Identity shared with the task's wakers.
    header: Arc<Header>,

    /// `None` while the task is being polled.
    future: Option<BoxFuture>,

    /// Abort requested while the task was being polled.
    aborted: bool,
}

/// The scheduler: ready queue, task table, timer queue and reactor.
///
/// Every method takes `&self` and keeps its `RefCell` borrows short. No
/// borrow is held while a task runs or while a future is dropped, since
/// both may call back into the scheduler.
pub(crate) struct Core {
    /// Top-level tasks that have not completed, keyed by `Header::key`.
    tasks: RefCell<Slab<TaskSlot>>,
    /// Sleeping continuations.
    timers: RefCell<TimerQueue>,
    /// Readiness waits and the OS primitive behind them.
    reactor: RefCell<Reactor>,
    /// Ready queue, reachable from wakers on any thread.
    shared: Arc<Shared>,
    config: Config,
    /// Id handed to the next spawned task.
    next_id: Cell<u64>,
    /// Id of the task being polled.
    running: Cell<Option<u64>>,
}

impl Core {
    /// Creates the scheduler and its reactor.
    pub(crate) fn new(config: Config) -> Result<Self> {
        let reactor = Reactor::new(config.event_capacity, config.registration_capacity)?;
        let shared = Arc::new(Shared::new(reactor.notifier()));

        Ok(Self {
            tasks: RefCell::new(Slab::new(config.task_capacity)),
            timers: RefCell::new(TimerQueue::new()),
            reactor: RefCell::new(reactor),
            shared,
            config,
            next_id: Cell::new(1),
            running: Cell::new(None),
        })
    }

    /// Adds a task to the table and appends it to the ready queue.
    pub(crate) fn spawn(&self, future: BoxFuture) -> (usize, u64) {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let header = {
            let mut tasks = self.tasks.borrow_mut();
            let header = Arc::new(Header::new(tasks.vacant_key(), id, self.shared.clone()));

            tasks.insert(TaskSlot {
                header: header.clone(),
                future: Some(future),
                aborted: false,
            });

            header
        };

        trace!(task = id, "task spawned");
        header.schedule();

        (header.key, id)
    }

    /// Destroys a task before it completes.
    ///
    /// The task currently being polled is destroyed as soon as its poll
    /// returns.
    pub(crate) fn abort(&self, key: usize, id: u64) {
        let released = {
            let mut tasks = self.tasks.borrow_mut();

            match tasks.get_mut(key) {
                Some(slot) if slot.header.id == id => {
                    if self.running.get() == Some(id) {
                        slot.aborted = true;
                        None
                    } else {
                        tasks.remove(key)
                    }
                }
                _ => None,
            }
        };

        if released.is_some() {
            debug!(task = id, "task aborted");
        }
    }

    /// Polls every task that was ready when the pass started. Returns how
    /// many were taken from the queue.
    fn run_ready(&self) -> usize {
        let batch = self.shared.take_batch();
        let count = batch.len();

        for header in batch {
            header.dequeue();
            self.poll_task(&header);
        }

        count
    }

    /// Polls one task, then stores it back, or drops it once it completed
    /// or was aborted during the poll.
    fn poll_task(&self, header: &Arc<Header>) {
        let future = {
            let mut tasks = self.tasks.borrow_mut();

            match tasks.get_mut(header.key) {
                Some(slot) if slot.header.id == header.id => slot.future.take(),
                _ => None,
            }
        };

        // Completed or aborted since it was queued.
        let Some(mut future) = future else {
            return;
        };

        let waker = make_waker(header.clone());
        let mut cx = Context::from_waker(&waker);

        self.running.set(Some(header.id));
        let poll = future.as_mut().poll(&mut cx);
        self.running.set(None);

        let mut tasks = self.tasks.borrow_mut();
        let ours = match tasks.get_mut(header.key) {
            Some(slot) if slot.header.id == header.id && !slot.aborted && poll.is_pending() => {
                slot.future = Some(future);
                return;
            }
            Some(slot) => slot.header.id == header.id,
            None => false,
        };

        let slot = if ours { tasks.remove(header.key) } else { None };
        drop(tasks);

        match poll {
            Poll::Ready(()) => trace!(task = header.id, "task completed"),
            Poll::Pending => debug!(task = header.id, "task aborted"),
        }

        drop(slot);
        drop(future);
    }

    /// Wakes every timer due now. Returns how many fired.
    fn fire_timers(&self) -> usize {
        let wakers = self.timers.borrow_mut().pop_expired(Instant::now());
        let count = wakers.len();

        if count > 0 {
            trace!(count, "timers fired");
        }

        for waker in wakers {
            waker.wake();
        }

        count
    }

    /// Blocks in the OS wait for at most `timeout`, then wakes whatever
    /// became ready.
    fn park(&self, timeout: Duration) {
        let timeout = if self.shared.park() {
            timeout
        } else {
            Duration::ZERO
        };

        let result = self.reactor.borrow_mut().poll(Some(timeout));
        self.shared.unpark();

        let wakers = match result {
            Ok(wakers) => wakers,
            Err(err) => self.reactor.borrow_mut().fail_all(&err),
        };

        for waker in wakers {
            waker.wake();
        }
    }

    /// The driving loop.
    ///
    /// Each pass runs the ready batch, then fires due timers, then waits for
    /// I/O. The wait is zero while tasks are ready, otherwise bounded by the
    /// next deadline and by `max_poll_wait`.
    ///
    /// Returns once `finished` holds, or once no task is ready, no timer is
    /// pending and no interest is armed. With `idle_grace`, an idle loop
    /// first waits up to `max_poll_wait` for a wake from another thread, and
    /// waits again after each pass that ran a task.
    pub(crate) fn drive(&self, finished: &dyn Fn() -> bool, idle_grace: bool) {
        let mut grace = idle_grace;

        loop {
            if self.run_ready() > 0 {
                grace = idle_grace;
            }

            if finished() {
                return;
            }

            if self.fire_timers() > 0 {
                continue;
            }

            let cap = self.config.max_poll_wait;
            let next_deadline = self.timers.borrow_mut().peek_deadline();

            let timeout = if self.shared.has_ready() {
                Duration::ZERO
            } else if let Some(deadline) = next_deadline {
                deadline.saturating_duration_since(Instant::now()).min(cap)
            } else if self.reactor.borrow().outstanding() > 0 {
                cap
            } else if grace {
                grace = false;
                trace!("scheduler idle, waiting for an outside wake");
                cap
            } else {
                trace!(live_tasks = self.live_tasks(), "scheduler idle");
                return;
            };

            self.park(timeout);
        }
    }

    /// Destroys every remaining task, breaking the reference cycles between
    /// the task table and the handles captured by task bodies.
    pub(crate) fn shutdown(&self) {
        loop {
            let queued = self.shared.take_batch();
            let slots = self.tasks.borrow_mut().drain();

            if slots.is_empty() && queued.is_empty() {
                break;
            }

            debug!(tasks = slots.len(), "dropping unfinished tasks");
            drop(queued);
            drop(slots);
        }
    }

    pub(crate) fn add_timer(&self, deadline: Instant, waker: Waker) -> TimerKey {
        self.timers.borrow_mut().insert(deadline, waker)
    }

    pub(crate) fn cancel_timer(&self, key: TimerKey) -> bool {
        self.timers.borrow_mut().remove(key)
    }

    pub(crate) fn update_timer_waker(&self, key: TimerKey, waker: &Waker) {
        self.timers.borrow_mut().update_waker(key, waker);
    }

    pub(crate) fn register(&self, fd: RawFd, interest: Interest, waker: Waker) -> Result<RegistrationKey> {
        self.reactor.borrow_mut().register(fd, interest, waker)
    }

    pub(crate) fn take_readiness(&self, key: RegistrationKey, waker: &Waker) -> Option<io::Result<Readiness>> {
        self.reactor.borrow_mut().take(key, waker)
    }

    pub(crate) fn cancel_registration(&self, key: RegistrationKey) {
        self.reactor.borrow_mut().cancel(key);
    }

    /// Live timer entries.
    pub(crate) fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Armed readiness waits.
    pub(crate) fn registrations(&self) -> usize {
        self.reactor.borrow().outstanding()
    }

    /// Top-level tasks that have not completed.
    pub(crate) fn live_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub(crate) fn is_idle(&self) -> bool {
        !self.shared.has_ready() && self.timers.borrow().is_empty() && self.registrations() == 0
    }
}
