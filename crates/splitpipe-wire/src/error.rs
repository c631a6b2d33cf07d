//! Error type for wire encode/decode.

use crate::frame::FrameKind;
use thiserror::Error;

/// Errors raised while encoding or interpreting stretches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    /// The encoder was handed a payload longer than the wire can express.
    #[error("frame payload of {0} bytes exceeds the 65535-byte wire limit")]
    PayloadTooLarge(usize),

    /// A fixed-length frame arrived with the wrong payload size.
    #[error("{kind:?} frame carries {got} payload bytes, expected {expected}")]
    BadLength {
        kind: FrameKind,
        expected: usize,
        got: usize,
    },
}
