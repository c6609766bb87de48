use super::{JoinAll, RaceFirst, join_all, race_first};
use crate::runtime::task::Task;

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

type Erased = Box<dyn Any>;

/// Wraps a branch so that branches of different types share one task type.
fn erase<F>(future: F) -> Task<Erased>
where
    F: Future + 'static,
    F::Output: 'static,
{
    Task::new(async move { Box::new(future.await) as Erased })
}

fn unerase<T: 'static>(value: Option<Erased>) -> T {
    match value.map(|v| v.downcast::<T>()) {
        Some(Ok(value)) => *value,
        _ => unreachable!("branch output does not match its position"),
    }
}

/// Tuples of futures accepted by [`join`].
pub trait Join {
    type Output;

    fn into_join(self) -> JoinTuple<Self::Output>;
}

/// Tuples of futures accepted by [`race`].
pub trait Race {
    type Output;

    fn into_race(self) -> RaceTuple<Self::Output>;
}

/// Future returned by [`join`].
#[must_use = "futures do nothing unless polled"]
pub struct JoinTuple<O> {
    inner: JoinAll<Erased>,
    unpack: fn(Vec<Erased>) -> O,
}

impl<O> Future for JoinTuple<O> {
    type Output = O;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<O> {
        let this = self.get_mut();
        let values = ready!(Pin::new(&mut this.inner).poll(cx));

        Poll::Ready((this.unpack)(values))
    }
}

/// Future returned by [`race`].
#[must_use = "futures do nothing unless polled"]
pub struct RaceTuple<O> {
    inner: RaceFirst<Erased>,
    pack: fn(usize, Erased) -> O,
}

impl<O> Future for RaceTuple<O> {
    type Output = O;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<O> {
        let this = self.get_mut();
        let (index, value) = ready!(Pin::new(&mut this.inner).poll(cx));

        Poll::Ready((this.pack)(index, value))
    }
}

/// Runs a tuple of futures concurrently and waits for all of them.
///
/// The heterogeneous counterpart of [`join_all`]: the output is the tuple
/// of the branches' outputs, in position order. Up to eight branches.
///
/// # Examples
///
/// ```rust,ignore
/// let (a, b) = coil::join((async { 1 }, async { "two" })).await;
/// ```
pub fn join<J: Join>(futures: J) -> JoinTuple<J::Output> {
    futures.into_join()
}

/// Runs a tuple of futures concurrently and resolves with the first to
/// complete, tagged with its position.
///
/// The heterogeneous counterpart of [`race_first`]. Up to eight branches.
///
/// # Examples
///
/// ```rust,ignore
/// use coil::join::OneOf2;
///
/// match coil::race((fetch(), sleep_for(timeout))).await {
///     OneOf2::V0(reply) => handle(reply),
///     OneOf2::V1(()) => give_up(),
/// }
/// ```
pub fn race<R: Race>(futures: R) -> RaceTuple<R::Output> {
    futures.into_race()
}

macro_rules! tuples {
    ($($name:ident => ($($F:ident $V:ident $idx:tt),+);)+) => {$(
        /// Result of a race, tagged with the position of the winner.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name<$($F),+> {
            $($V($F),)+
        }

        impl<$($F),+> $name<$($F),+> {
            /// Position of the winning branch.
            pub fn index(&self) -> usize {
                match self {
                    $(Self::$V(_) => $idx,)+
                }
            }
        }

        impl<$($F),+> Join for ($($F,)+)
        where
            $($F: Future + 'static, $F::Output: 'static,)+
        {
            type Output = ($($F::Output,)+);

            fn into_join(self) -> JoinTuple<Self::Output> {
                JoinTuple {
                    inner: join_all(vec![$(erase(self.$idx)),+]),
                    unpack: |values| {
                        let mut values = values.into_iter();
                        ($(unerase::<$F::Output>(values.next()),)+)
                    },
                }
            }
        }

        impl<$($F),+> Race for ($($F,)+)
        where
            $($F: Future + 'static, $F::Output: 'static,)+
        {
            type Output = $name<$($F::Output),+>;

            fn into_race(self) -> RaceTuple<Self::Output> {
                RaceTuple {
                    inner: race_first(vec![$(erase(self.$idx)),+]),
                    pack: |index, value| match index {
                        $($idx => $name::$V(unerase::<$F::Output>(Some(value))),)+
                        _ => unreachable!("race winner out of range"),
                    },
                }
            }
        }
    )+};
}

tuples! {
    OneOf1 => (F0 V0 0);
    OneOf2 => (F0 V0 0, F1 V1 1);
    OneOf3 => (F0 V0 0, F1 V1 1, F2 V2 2);
    OneOf4 => (F0 V0 0, F1 V1 1, F2 V2 2, F3 V3 3);
    OneOf5 => (F0 V0 0, F1 V1 1, F2 V2 2, F3 V3 3, F4 V4 4);
    OneOf6 => (F0 V0 0, F1 V1 1, F2 V2 2, F3 V3 3, F4 V4 4, F5 V5 5);
    OneOf7 => (F0 V0 0, F1 V1 1, F2 V2 2, F3 V3 3, F4 V4 4, F5 V5 5, F6 V6 6);
    OneOf8 => (F0 V0 0, F1 V1 1, F2 V2 2, F3 V3 3, F4 V4 4, F5 V5 5, F6 V6 6, F7 V7 7);
}
