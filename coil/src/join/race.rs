use crate::error::Error;
use crate::runtime::Handle;
use crate::runtime::task::{Fault, JoinHandle, Task};

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};
use tracing::trace;

/// No child has committed yet.
const NO_WINNER: usize = usize::MAX;

/// Shared by a [`RaceFirst`] and its helpers.
struct RaceControl<T> {
    /// Index of the first child to complete.
    winner: AtomicUsize,
    value: RefCell<Option<T>>,
    fault: RefCell<Option<Fault>>,
    parent: RefCell<Option<Waker>>,
}

impl<T> RaceControl<T> {
    fn has_winner(&self) -> bool {
        self.winner.load(Ordering::Acquire) != NO_WINNER
    }

    /// Commits `index` as the winner unless another child already did.
    /// Losers' outcomes are dropped here.
    fn complete(&self, index: usize, outcome: Result<T, Fault>) {
        if self
            .winner
            .compare_exchange(NO_WINNER, index, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!(index, "race loser discarded");
            return;
        }

        match outcome {
            Ok(value) => *self.value.borrow_mut() = Some(value),
            Err(fault) => *self.fault.borrow_mut() = Some(fault),
        }

        let parent = self.parent.borrow_mut().take();
        if let Some(parent) = parent {
            parent.wake();
        }
    }
}

enum State<T> {
    Idle(Vec<Task<T>>),
    Running {
        control: Rc<RaceControl<T>>,
        helpers: Vec<JoinHandle<()>>,
    },
    Done,
}

/// Future returned by [`race_first`].
#[must_use = "futures do nothing unless polled"]
pub struct RaceFirst<T> {
    state: State<T>,
}

/// Runs every task concurrently and resolves with the first to complete.
///
/// Resolves to the winner's position and value as soon as it completes,
/// without waiting for the others. If the winner panicked, its fault is
/// re-raised in the awaiting task. Tasks that complete later still run to
/// completion, but their values and faults are discarded.
///
/// Dropping the future before a winner is known destroys every child.
///
/// # Panics
///
/// An empty input has no winner: awaiting it panics with
/// [`Error::EmptyRace`] on first poll.
pub fn race_first<T, I>(tasks: I) -> RaceFirst<T>
where
    I: IntoIterator<Item = Task<T>>,
{
    RaceFirst {
        state: State::Idle(tasks.into_iter().collect()),
    }
}

impl<T: 'static> RaceFirst<T> {
    fn start(tasks: Vec<Task<T>>, cx: &Context<'_>) -> State<T> {
        let handle = Handle::current();

        let control = Rc::new(RaceControl {
            winner: AtomicUsize::new(NO_WINNER),
            value: RefCell::new(None),
            fault: RefCell::new(None),
            parent: RefCell::new(Some(cx.waker().clone())),
        });

        trace!(children = tasks.len(), "race_first started");

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

        State::Running { control, helpers }
    }
}

impl<T: 'static> Future for RaceFirst<T> {
    type Output = (usize, T);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match std::mem::replace(&mut this.state, State::Done) {
            State::Idle(tasks) if tasks.is_empty() => panic!("{}", Error::EmptyRace),
            State::Idle(tasks) => {
                this.state = Self::start(tasks, cx);
                Poll::Pending
            }
            State::Running { control, helpers } => {
                if !control.has_winner() {
                    *control.parent.borrow_mut() = Some(cx.waker().clone());
                    this.state = State::Running { control, helpers };
                    return Poll::Pending;
                }

                // Losers still running are detached with `helpers`.
                drop(helpers);

                let fault = control.fault.borrow_mut().take();
                if let Some(fault) = fault {
                    fault.resume();
                }

                let index = control.winner.load(Ordering::Acquire);
                match control.value.borrow_mut().take() {
                    Some(value) => Poll::Ready((index, value)),
                    None => unreachable!("race winner committed without a value"),
                }
            }
            State::Done => panic!("`RaceFirst` polled after completion"),
        }
    }
}

impl<T> Drop for RaceFirst<T> {
    fn drop(&mut self) {
        if let State::Running { helpers, .. } = &self.state {
            for helper in helpers {
                helper.abort();
            }
        }
    }
}
