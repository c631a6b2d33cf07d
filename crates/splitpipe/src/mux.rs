//! Readiness multiplexer for the producer loop.
//!
//! A thin wrapper over level-triggered `poll(2)`: each loop iteration the
//! pipeline registers the descriptors it currently cares about, waits for
//! readiness or a short tick, and services whatever became ready. The tick
//! bounds idle time so the status renderer refreshes and the break flag is
//! observed promptly even when nothing is flowing.

use crate::error::PipeError;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::fd::BorrowedFd;

/// Descriptors the pipeline wants to observe this iteration.
///
/// Interest is conditional on state: standard input only while the ring has
/// room and input has not hit EOF, the child's stdin only while there are
/// bytes to push, the terminal only while an operator answer is awaited.
#[derive(Default)]
pub struct Interest<'fd> {
    pub stdin: Option<BorrowedFd<'fd>>,
    pub child_stdin: Option<BorrowedFd<'fd>>,
    pub child_stdout: Option<BorrowedFd<'fd>>,
    pub child_stderr: Option<BorrowedFd<'fd>>,
    pub tty: Option<BorrowedFd<'fd>>,
}

/// Which of the registered descriptors are ready.
///
/// Hang-ups and errors on read descriptors are reported as readable: the
/// subsequent read observes the EOF or the errno, which is where the
/// condition is actually handled.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ready {
    pub stdin: bool,
    pub child_stdin: bool,
    pub child_stdout: bool,
    pub child_stderr: bool,
    pub tty: bool,
}

#[derive(Clone, Copy)]
enum Slot {
    Stdin,
    ChildStdin,
    ChildStdout,
    ChildStderr,
    Tty,
}

/// Level-triggered readiness wait with a bounded tick.
#[derive(Debug)]
pub struct Multiplexer {
    tick: PollTimeout,
}

impl Multiplexer {
    /// Default tick between forced wakeups.
    pub const TICK_MS: u8 = 10;

    pub fn new() -> Self {
        Self {
            tick: PollTimeout::from(Self::TICK_MS),
        }
    }

    /// Waits until at least one registered descriptor is ready or the tick
    /// elapses. An interrupted wait is retried; the caller observes its
    /// break flag at the top of the loop, not here.
    pub fn wait(&self, interest: &Interest<'_>) -> Result<Ready, PipeError> {
        let read = PollFlags::POLLIN;
        let write = PollFlags::POLLOUT;

        let mut slots = Vec::with_capacity(5);
        let mut fds = Vec::with_capacity(5);

        if let Some(fd) = interest.child_stdout {
            slots.push(Slot::ChildStdout);
            fds.push(PollFd::new(fd, read));
        }
        if let Some(fd) = interest.child_stderr {
            slots.push(Slot::ChildStderr);
            fds.push(PollFd::new(fd, read));
        }
        if let Some(fd) = interest.tty {
            slots.push(Slot::Tty);
            fds.push(PollFd::new(fd, read));
        }
        if let Some(fd) = interest.stdin {
            slots.push(Slot::Stdin);
            fds.push(PollFd::new(fd, read));
        }
        if let Some(fd) = interest.child_stdin {
            slots.push(Slot::ChildStdin);
            fds.push(PollFd::new(fd, write));
        }

        loop {
            match poll(&mut fds, self.tick) {
                Ok(_) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    return Err(PipeError::io("readiness wait", e.into()));
                }
            }
        }

        let mut ready = Ready::default();
        for (slot, fd) in slots.iter().zip(fds.iter()) {
            let revents = fd.revents().unwrap_or(PollFlags::empty());
            // A hung-up or errored descriptor must still be serviced.
            let hot = revents
                .intersects(PollFlags::POLLIN | PollFlags::POLLOUT | PollFlags::POLLHUP | PollFlags::POLLERR);
            if !hot {
                continue;
            }
            match slot {
                Slot::Stdin => ready.stdin = true,
                Slot::ChildStdin => ready.child_stdin = true,
                Slot::ChildStdout => ready.child_stdout = true,
                Slot::ChildStderr => ready.child_stderr = true,
                Slot::Tty => ready.tty = true,
            }
        }
        Ok(ready)
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}
