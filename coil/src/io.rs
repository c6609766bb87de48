//! Readiness-based I/O.
//!
//! The runtime does not read or write on behalf of the application. It only
//! tells a task when a descriptor it owns is ready, after which the task
//! performs the non-blocking operation itself:
//!
//! ```rust,ignore
//! use coil::io::{self, Descriptor, Interest};
//! use std::io::Read;
//!
//! Descriptor::set_nonblocking(&stream)?;
//! let readiness = io::wait_readiness(&stream, Interest::READABLE).await?;
//! if readiness.readable {
//!     let n = (&stream).read(&mut buf)?;
//! }
//! ```
//!
//! Waits are one-shot: each call arms interest once, and a descriptor can
//! have at most one outstanding wait at a time.

use crate::reactor::{WaitReadiness, poller};

use std::io;
use std::ops::{BitOr, BitOrAssign};
use std::os::fd::{AsRawFd, RawFd};

/// The readiness a wait is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    read: bool,
    write: bool,
}

impl Interest {
    pub const READABLE: Interest = Interest {
        read: true,
        write: false,
    };

    pub const WRITABLE: Interest = Interest {
        read: false,
        write: true,
    };

    pub const BOTH: Interest = Interest {
        read: true,
        write: true,
    };

    pub fn is_readable(self) -> bool {
        self.read
    }

    pub fn is_writable(self) -> bool {
        self.write
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest {
            read: self.read || rhs.read,
            write: self.write || rhs.write,
        }
    }
}

/// The readiness observed by the OS for one wait.
///
/// `error` and `hangup` are reported regardless of the requested interest;
/// the next read or write on the descriptor surfaces the actual condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
    pub hangup: bool,
}

impl Readiness {
    /// Returns `true` if no bit is set.
    pub fn is_empty(self) -> bool {
        !(self.readable || self.writable || self.error || self.hangup)
    }
}

impl BitOrAssign for Readiness {
    fn bitor_assign(&mut self, rhs: Readiness) {
        self.readable |= rhs.readable;
        self.writable |= rhs.writable;
        self.error |= rhs.error;
        self.hangup |= rhs.hangup;
    }
}

/// An OS handle the reactor can wait on.
///
/// The reactor only ever stores the numeric descriptor; ownership stays
/// with the implementor, which must outlive any wait on it.
pub trait Descriptor {
    fn raw_fd(&self) -> RawFd;

    /// Switches the descriptor to non-blocking mode.
    fn set_nonblocking(&self) -> io::Result<()> {
        poller::set_nonblocking(self.raw_fd())
    }
}

impl<T: AsRawFd + ?Sized> Descriptor for T {
    fn raw_fd(&self) -> RawFd {
        self.as_raw_fd()
    }
}

/// Waits until `descriptor` is ready for `interest`.
///
/// Resolves to the readiness observed by the OS. Registration failures
/// resolve immediately with the error instead of suspending.
///
/// Dropping the returned future before it resolves removes the interest
/// from the OS.
///
/// # Panics
///
/// Panics if polled outside of a running runtime.
pub fn wait_readiness<D>(descriptor: &D, interest: Interest) -> WaitReadiness
where
    D: Descriptor + ?Sized,
{
    WaitReadiness::new(descriptor.raw_fd(), interest, None)
}
