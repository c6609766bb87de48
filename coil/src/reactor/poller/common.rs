use crate::io::Readiness;

use std::io;
use std::time::Duration;

/// One readiness notification, keyed by the token given at registration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Event {
    pub(crate) token: u64,
    pub(crate) readiness: Readiness,
}

/// Pushes `readiness` for `token`, merging with an event already collected
/// for the same token in this batch.
pub(super) fn push_event(events: &mut Vec<Event>, token: u64, readiness: Readiness) {
    if let Some(event) = events.iter_mut().find(|e| e.token == token) {
        event.readiness |= readiness;
    } else {
        events.push(Event { token, readiness });
    }
}

/// Returns `true` for removal errors meaning the interest is already gone.
pub(super) fn is_gone(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::ENOENT) | Some(libc::EBADF))
}

/// Converts a timeout to whole milliseconds, rounding up so that a wait
/// never returns before a sub-millisecond deadline.
pub(super) fn timeout_millis(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => -1,
        Some(t) => {
            let millis = t.as_nanos().div_ceil(1_000_000);
            i32::try_from(millis).unwrap_or(i32::MAX)
        }
    }
}
