use crate::hexdump::hex_dump;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Length of a session identifier.
pub const SESSION_ID_LEN: usize = 16;

/// Sixteen opaque bytes identifying one session.
///
/// Drawn from the operating system's random source at session start and
/// repeated verbatim on every volume. Decoders treat the bytes as opaque:
/// the only defined operation is equality against the first id seen.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SessionId([u8; SESSION_ID_LEN]);

impl SessionId {
    /// Generates a fresh identifier from the OS random source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wraps identifier bytes read off the wire; `None` on wrong length.
    pub fn from_wire(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; SESSION_ID_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; SESSION_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex_dump(&self.0))
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", hex_dump(&self.0))
    }
}
