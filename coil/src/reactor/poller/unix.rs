use libc::{F_GETFL, F_SETFL, O_NONBLOCK, fcntl};
use std::io;
use std::os::fd::RawFd;

/// Sets a file descriptor to non-blocking mode.
pub(crate) fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = cvt(unsafe { fcntl(fd, F_GETFL) })?;

    if flags & O_NONBLOCK == 0 {
        cvt(unsafe { fcntl(fd, F_SETFL, flags | O_NONBLOCK) })?;
    }

    Ok(())
}

/// Maps a negative libc return value to the current `errno`.
pub(super) fn cvt(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}
