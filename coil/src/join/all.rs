use crate::runtime::Handle;
use crate::runtime::task::{Fault, JoinHandle, Task};

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use tracing::trace;

/// Shared by a [`JoinAll`] and its helpers.
struct AllControl<T> {
    /// Children that have not completed yet.
    remaining: Cell<usize>,
    results: RefCell<Vec<Option<T>>>,
    /// First fault captured; later ones are discarded.
    fault: RefCell<Option<Fault>>,
    parent: RefCell<Option<Waker>>,
}

impl<T> AllControl<T> {
    fn complete(&self, index: usize, outcome: Result<T, Fault>) {
        match outcome {
            Ok(value) => self.results.borrow_mut()[index] = Some(value),
            Err(fault) => {
                let mut slot = self.fault.borrow_mut();
                if slot.is_none() {
                    *slot = Some(fault);
                }
            }
        }

        let remaining = self.remaining.get() - 1;
        self.remaining.set(remaining);

        // Only the last child resumes the parent.
        if remaining == 0 {
            let parent = self.parent.borrow_mut().take();
            if let Some(parent) = parent {
                parent.wake();
            }
        }
    }
}

enum State<T> {
    Idle(Vec<Task<T>>),
    Running {
        control: Rc<AllControl<T>>,
        helpers: Vec<JoinHandle<()>>,
    },
    Done,
}

/// Future returned by [`join_all`].
#[must_use = "futures do nothing unless polled"]
pub struct JoinAll<T> {
    state: State<T>,
}

/// Runs every task concurrently and waits for all of them.
///
/// Resolves to the values in argument order, whatever order the tasks
/// complete in. The awaiting task is resumed once, after the last child has
/// completed. If any child panicked, the first captured fault is re-raised
/// in the awaiting task after all children have completed.
///
/// An empty input resolves immediately to an empty vector.
///
/// Dropping the future before it resolves destroys every child still
/// running.
///
/// # Examples
///
/// ```rust,ignore
/// use coil::{Task, join_all};
///
/// let tasks = (0..3).map(|i| Task::new(async move { i * 10 }));
/// assert_eq!(join_all(tasks).await, vec![0, 10, 20]);
/// ```
pub fn join_all<T, I>(tasks: I) -> JoinAll<T>
where
    I: IntoIterator<Item = Task<T>>,
{
    JoinAll {
        state: State::Idle(tasks.into_iter().collect()),
    }
}

impl<T: 'static> JoinAll<T> {
    fn start(tasks: Vec<Task<T>>, cx: &Context<'_>) -> State<T> {
        let handle = Handle::current();
        let count = tasks.len();

        let control = Rc::new(AllControl {
            remaining: Cell::new(count),
            results: RefCell::new((0..count).map(|_| None).collect()),
            fault: RefCell::new(None),
            parent: RefCell::new(Some(cx.waker().clone())),
        });

        let helpers = tasks
            .into_iter()
            .enumerate()
            .map(|(index, child)| {
                let control = control.clone();
                handle.spawn(async move {
                    let outcome = child.settle().await;
                    control.complete(index, outcome);
                })
            })
            .collect();

        trace!(children = count, "join_all started");
        State::Running { control, helpers }
    }
}

impl<T: 'static> Future for JoinAll<T> {
    type Output = Vec<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match std::mem::replace(&mut this.state, State::Done) {
            State::Idle(tasks) if tasks.is_empty() => Poll::Ready(Vec::new()),
            State::Idle(tasks) => {
                this.state = Self::start(tasks, cx);
                Poll::Pending
            }
            State::Running { control, helpers } => {
                if control.remaining.get() > 0 {
                    *control.parent.borrow_mut() = Some(cx.waker().clone());
                    this.state = State::Running { control, helpers };
                    return Poll::Pending;
                }

                let fault = control.fault.borrow_mut().take();
                if let Some(fault) = fault {
                    fault.resume();
                }

                let results = control.results.take();
                Poll::Ready(results.into_iter().flatten().collect())
            }
            State::Done => panic!("`JoinAll` polled after completion"),
        }
    }
}

impl<T> Drop for JoinAll<T> {
    fn drop(&mut self) {
        if let State::Running { helpers, .. } = &self.state {
            for helper in helpers {
                helper.abort();
            }
        }
    }
}
