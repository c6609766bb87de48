//! Internal data structures.
//!
//! The [`Slab`] arena is the one storage primitive shared by the task
//! table, the timer queue and the reactor registration table.

mod slab;

pub(crate) use slab::Slab;
