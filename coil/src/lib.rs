//! # Coil
//!
//! **Coil** is a single-threaded cooperative task runtime.
//!
//! Application logic is written as ordinary `async` code that suspends at
//! I/O waits, timer waits or on child tasks, and one OS thread interleaves
//! all of it. Coil is built from four pieces:
//!
//! - [`Task`]: a lazy computation with a retrieve-once result; a panic in
//!   its body is captured and re-raised where the result is retrieved,
//! - a scheduler with a FIFO ready queue, driven by [`Runtime`],
//! - a timer queue and a one-shot I/O reactor (`epoll` on Linux, `kqueue`
//!   on macOS and the BSDs),
//! - the [`join`] combinators, which fan out to child tasks and resume the
//!   caller exactly once.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use coil::time::sleep_for;
//! use std::time::Duration;
//!
//! #[coil::main]
//! async fn main() {
//!     let handle = coil::spawn(async {
//!         sleep_for(Duration::from_millis(100)).await;
//!         "done"
//!     });
//!
//!     let (a, b) = coil::join!(handle, async { 42 });
//!     assert_eq!((a, b), ("done", 42));
//! }
//! ```
//!
//! ## Modules
//!
//! - [`time`]: sleeping and timeouts
//! - [`io`]: readiness waits on descriptors
//! - [`join`]: `join_all`, `race_first` and their tuple forms
//! - [`task`]: tasks, join handles and faults

mod error;
mod reactor;
mod runtime;
mod utils;

pub mod io;
pub mod join;
pub mod time;

pub use error::{Error, Result};
pub use join::{join, join_all, race, race_first};
pub use reactor::{TimerKey, WaitReadiness};
pub use runtime::builder::RuntimeBuilder;
pub use runtime::task::{self, Fault, JoinHandle, Stage, Task, spawn};
pub use runtime::yield_now::yield_now;
pub use runtime::{Handle, Runtime};

pub use coil_macros::*;
