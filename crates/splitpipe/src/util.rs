//! Small descriptor and clock helpers.

use crate::error::PipeError;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use std::os::fd::{AsFd, AsRawFd};
use std::time::{SystemTime, UNIX_EPOCH};

/// Puts a descriptor into non-blocking mode.
pub fn set_nonblocking<F: AsFd>(fd: &F, context: &str) -> Result<(), PipeError> {
    let raw_fd = fd.as_fd().as_raw_fd();
    let flags = fcntl(raw_fd, FcntlArg::F_GETFL)
        .map_err(|e| PipeError::io(context.to_string(), e.into()))?;
    let flags = OFlag::from_bits_retain(flags) | OFlag::O_NONBLOCK;
    fcntl(raw_fd, FcntlArg::F_SETFL(flags))
        .map_err(|e| PipeError::io(context.to_string(), e.into()))?;
    Ok(())
}

/// Seconds since the epoch, truncated to the 32 bits the wire carries.
pub fn epoch_seconds() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
