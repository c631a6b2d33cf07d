//! Error kinds shared by both pipelines.

use splitpipe_ring::RingError;
use splitpipe_wire::{SessionId, WireError};
use std::io;
use thiserror::Error;

/// Everything that can abort a session.
///
/// Decode-side failures (`WrongSession`, `WrongVolume`, `ChecksumMismatch`,
/// `UnexpectedEof`) terminate the consumer with a diagnostic; encode-side
/// failures terminate the producer after the writer command has been closed
/// and reaped. Partial volumes are never reused — the operator re-runs the
/// session.
#[derive(Debug, Error)]
pub enum PipeError {
    /// A ring precondition was violated. This is a bug in the transfer
    /// accounting, not an environmental condition.
    #[error("ring buffer accounting failure: {0}")]
    Capacity(#[from] RingError),

    /// A stretch could not be encoded or interpreted.
    #[error("malformed stretch: {0}")]
    Wire(#[from] WireError),

    /// The writer command stopped accepting input before the volume was
    /// complete.
    #[error("writer command closed its input before the volume was complete")]
    ChildClosedEarly,

    /// The configured volume size cannot carry the per-volume headers plus
    /// at least one payload byte.
    #[error("volume size of {configured} bytes is too small to carry any payload")]
    VolumeTooSmall { configured: u64 },

    /// An OS-level read or write failed with something other than
    /// would-block or an interrupt.
    #[error("during {context}: {source}")]
    Io {
        context: String,
        source: io::Error,
    },

    /// A volume carried a session id different from the first one seen.
    #[error("volume belongs to session '{found}', expected '{expected}'")]
    WrongSession {
        expected: SessionId,
        found: SessionId,
    },

    /// A volume arrived out of sequence.
    #[error("this is volume {found}, expected volume {expected}")]
    WrongVolume { expected: u16, found: u16 },

    /// The running digest disagrees with a checksum stretch.
    #[error("running checksum mismatch: computed '{computed}', volume carries '{stored}'")]
    ChecksumMismatch { computed: String, stored: String },

    /// The input ended before the end-of-session stretch.
    #[error("input ended before the end-of-session stretch")]
    UnexpectedEof,

    /// The operator requested a break.
    #[error("interrupted before the session completed")]
    Interrupted,
}

impl PipeError {
    /// Wraps an OS error with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True when this error is an operator break rather than a failure of
    /// the data path.
    #[inline]
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}
