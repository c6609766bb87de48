//! Structured-concurrency combinators.
//!
//! Each combinator spawns one helper task per child on first poll. Helpers
//! report into a control block shared with the combinator, and the awaiting
//! task is resumed once: after the last child for the join family, after
//! the first for the race family.
//!
//! - [`join_all`] / [`race_first`] take homogeneous [`Task`](crate::Task)s,
//! - [`join`] / [`race`] take tuples of futures of different types.
//!
//! A combinator dropped before it resolves destroys its children. After a
//! race resolves, the children still running are left to complete and
//! their results are discarded.

mod all;
mod race;
mod tuple;

pub use all::{JoinAll, join_all};
pub use race::{RaceFirst, race_first};
pub use tuple::{
    Join, JoinTuple, OneOf1, OneOf2, OneOf3, OneOf4, OneOf5, OneOf6, OneOf7, OneOf8, Race,
    RaceTuple, join, race,
};
