//! The spawned writer command.
//!
//! Each volume is one invocation of the operator's writer command, evaluated
//! by `/bin/sh -c`. The framed volume bytes go down its stdin; whatever it
//! prints on stdout or stderr is captured and forwarded to the status sink.
//! All three pipes run non-blocking — retrying is the multiplexer's job, so
//! no descriptor ever flips between blocking modes.

use crate::error::PipeError;
use crate::util::set_nonblocking;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

/// A live writer command with its three pipes.
///
/// Exactly one `ChildWriter` exists per volume. The next one must not be
/// spawned until this one has been observed to exit and both diagnostic
/// pipes have returned EOF ([`diag_eof`](Self::diag_eof)).
#[derive(Debug)]
pub struct ChildWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
    stderr: ChildStderr,
    stdout_eof: bool,
    stderr_eof: bool,
    exit: Option<ExitStatus>,
}

impl ChildWriter {
    /// Spawns `command` via `/bin/sh -c` with all three pipes non-blocking.
    ///
    /// The command string is a single argv element handed to the shell;
    /// quoting inside it is the shell's business.
    pub fn spawn(command: &str) -> Result<Self, PipeError> {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PipeError::io("launch of the writer command", e))?;

        let stdin = child.stdin.take().expect("stdin was requested piped");
        let stdout = child.stdout.take().expect("stdout was requested piped");
        let stderr = child.stderr.take().expect("stderr was requested piped");

        set_nonblocking(&stdin, "setting the writer pipe to nonblocking")?;
        set_nonblocking(&stdout, "setting the writer stdout to nonblocking")?;
        set_nonblocking(&stderr, "setting the writer stderr to nonblocking")?;

        tracing::debug!(pid = child.id(), %command, "writer command spawned");

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout,
            stderr,
            stdout_eof: false,
            stderr_eof: false,
            exit: None,
        })
    }

    // ---------------------------------------------------------------------
    // INPUT SIDE
    // ---------------------------------------------------------------------

    /// Writes bytes to the child's stdin.
    ///
    /// Returns `Ok(Some(n))` for a short or full write, `Ok(None)` when the
    /// pipe is full (come back after the next readiness wait), and
    /// [`PipeError::ChildClosedEarly`] on an unexpected zero-length write.
    pub fn write_payload(&mut self, bytes: &[u8]) -> Result<Option<usize>, PipeError> {
        let stdin = self.stdin.as_mut().ok_or(PipeError::ChildClosedEarly)?;
        match stdin.write(bytes) {
            Ok(0) => Err(PipeError::ChildClosedEarly),
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(PipeError::io("writing to the writer command", e)),
        }
    }

    /// Closes the child's stdin, signalling end-of-volume.
    pub fn close_input(&mut self) {
        self.stdin = None;
    }

    /// True while the input pipe is still open.
    #[inline]
    pub fn input_open(&self) -> bool {
        self.stdin.is_some()
    }

    // ---------------------------------------------------------------------
    // DIAGNOSTIC SIDE
    // ---------------------------------------------------------------------

    /// Drains whatever the child has printed, handing each chunk to `sink`.
    ///
    /// Reads until both pipes would block or reach EOF; the EOF state is
    /// remembered so the lifecycle check in [`diag_eof`](Self::diag_eof) is
    /// cheap.
    pub fn drain_diag(&mut self, mut sink: impl FnMut(&[u8])) -> Result<(), PipeError> {
        let mut buf = [0u8; 4096];

        while !self.stdout_eof {
            match self.stdout.read(&mut buf) {
                Ok(0) => self.stdout_eof = true,
                Ok(n) => sink(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(PipeError::io("reading the writer command's output", e)),
            }
        }
        while !self.stderr_eof {
            match self.stderr.read(&mut buf) {
                Ok(0) => self.stderr_eof = true,
                Ok(n) => sink(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(PipeError::io("reading the writer command's errors", e)),
            }
        }
        Ok(())
    }

    /// True once both diagnostic pipes have returned EOF.
    #[inline]
    pub fn diag_eof(&self) -> bool {
        self.stdout_eof && self.stderr_eof
    }

    // ---------------------------------------------------------------------
    // LIFECYCLE
    // ---------------------------------------------------------------------

    /// Observes the child's exit status.
    ///
    /// Non-blocking by default; `blocking` is reserved for the final reap
    /// after [`close_input`](Self::close_input), when there is no more work
    /// to interleave.
    pub fn poll_exit(&mut self, blocking: bool) -> Result<Option<ExitStatus>, PipeError> {
        if let Some(status) = self.exit {
            return Ok(Some(status));
        }
        let status = if blocking {
            Some(
                self.child
                    .wait()
                    .map_err(|e| PipeError::io("wait on the writer command", e))?,
            )
        } else {
            self.child
                .try_wait()
                .map_err(|e| PipeError::io("wait on the writer command", e))?
        };
        self.exit = status;
        Ok(status)
    }

    /// Borrowed descriptor for the writable pipe, while it is open.
    pub fn stdin_fd(&self) -> Option<BorrowedFd<'_>> {
        self.stdin.as_ref().map(AsFd::as_fd)
    }

    /// Borrowed descriptor for the child's stdout, until it hits EOF.
    pub fn stdout_fd(&self) -> Option<BorrowedFd<'_>> {
        (!self.stdout_eof).then(|| self.stdout.as_fd())
    }

    /// Borrowed descriptor for the child's stderr, until it hits EOF.
    pub fn stderr_fd(&self) -> Option<BorrowedFd<'_>> {
        (!self.stderr_eof).then(|| self.stderr.as_fd())
    }
}

/// Operator-facing description of an exit status.
///
/// The status is reported, never interpreted: a non-zero writer exit is the
/// operator's call (they may simply burn the volume again).
pub fn describe_exit(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        format!("writer command exited with status {code}")
    } else if let Some(sig) = status.signal() {
        format!("writer command exited abnormally, by signal {sig}")
    } else {
        "writer command exited abnormally".to_string()
    }
}
