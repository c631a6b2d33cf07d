use crate::error::WireError;

/// Length of the frame header: 16-bit payload size plus 8-bit type tag.
pub const HEADER_LEN: usize = 3;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// The stretch type tags.
///
/// Tag values are part of the on-disk format and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Optional human-readable session label (UTF-8, variable length).
    SessionName = 0,
    /// 16 opaque bytes identifying the session; repeated on every volume.
    SessionUuid = 1,
    /// 16-bit big-endian volume sequence number, starting at 0.
    VolumeNumber = 2,
    /// End of this volume; more volumes follow.
    VolumeEof = 3,
    /// Payload bytes of the reconstructed stream.
    Data = 4,
    /// Snapshot of the running MD5 over all payload bytes so far.
    Md5Checksum = 5,
    /// Reserved SHA-1 variant of the running checksum.
    Sha1Checksum = 6,
    /// End of the session; this is the last volume.
    SessionEof = 7,
    /// Volume creation time, 32-bit big-endian seconds since the epoch.
    VolumeDate = 8,
}

impl FrameKind {
    /// Maps a wire tag back to a kind. `None` for tags this version does not
    /// know; callers are expected to log and skip those, not abort.
    pub fn from_wire(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::SessionName),
            1 => Some(Self::SessionUuid),
            2 => Some(Self::VolumeNumber),
            3 => Some(Self::VolumeEof),
            4 => Some(Self::Data),
            5 => Some(Self::Md5Checksum),
            6 => Some(Self::Sha1Checksum),
            7 => Some(Self::SessionEof),
            8 => Some(Self::VolumeDate),
            _ => None,
        }
    }

    /// Required payload length for fixed-size kinds; `None` for the
    /// variable-length kinds (`SessionName`, `Data`).
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            Self::SessionUuid | Self::Md5Checksum => Some(16),
            Self::VolumeNumber => Some(2),
            Self::VolumeDate => Some(4),
            Self::Sha1Checksum => Some(20),
            Self::VolumeEof | Self::SessionEof => Some(0),
            Self::SessionName | Self::Data => None,
        }
    }
}

/// Serializes the three-byte header for a stretch of `len` payload bytes.
///
/// The producer uses this to open a `Data` stretch before the payload bytes
/// exist in contiguous form; for complete frames prefer [`encode_frame`].
#[inline]
pub fn stretch_header(kind: FrameKind, len: u16) -> [u8; HEADER_LEN] {
    let size = len.to_be_bytes();
    [size[0], size[1], kind as u8]
}

/// Appends a complete frame (header plus payload) to `out`.
pub fn encode_frame(out: &mut Vec<u8>, kind: FrameKind, payload: &[u8]) -> Result<(), WireError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(WireError::PayloadTooLarge(payload.len()));
    }
    if let Some(expected) = kind.fixed_len() {
        if payload.len() != expected {
            return Err(WireError::BadLength {
                kind,
                expected,
                got: payload.len(),
            });
        }
    }

    out.extend_from_slice(&stretch_header(kind, payload.len() as u16));
    out.extend_from_slice(payload);
    Ok(())
}

/// A decoded frame with its raw type tag.
///
/// The tag is kept raw so unknown types survive decoding and can be reported
/// by the caller instead of silently vanishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub tag: u8,
    pub payload: Vec<u8>,
}

impl RawFrame {
    /// The typed kind, if this version knows the tag.
    #[inline]
    pub fn kind(&self) -> Option<FrameKind> {
        FrameKind::from_wire(self.tag)
    }

    /// Interprets the payload as a big-endian volume sequence number.
    pub fn volume_number(&self) -> Result<u16, WireError> {
        let bytes: [u8; 2] = self.payload.as_slice().try_into().map_err(|_| {
            WireError::BadLength {
                kind: FrameKind::VolumeNumber,
                expected: 2,
                got: self.payload.len(),
            }
        })?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Interprets the payload as a big-endian epoch timestamp.
    pub fn volume_date(&self) -> Result<u32, WireError> {
        let bytes: [u8; 4] = self.payload.as_slice().try_into().map_err(|_| {
            WireError::BadLength {
                kind: FrameKind::VolumeDate,
                expected: 4,
                got: self.payload.len(),
            }
        })?;
        Ok(u32::from_be_bytes(bytes))
    }
}

enum DecodeState {
    AwaitHeader { header: [u8; HEADER_LEN], have: usize },
    AwaitPayload { tag: u8, size: usize, payload: Vec<u8> },
    Complete(RawFrame),
}

/// Pull-style frame decoder.
///
/// The decoder advances through `AwaitHeader` → `AwaitPayload` → `Complete`
/// and never asks for bytes beyond the frame it is currently assembling:
/// [`needed`](Self::needed) is an exact upper bound on how much input the
/// caller should supply next. That lets the consumer read volumes with exact
/// reads and stop precisely at the end-of-volume stretch, without pulling in
/// whatever padding follows on the medium.
///
/// Feed any prefix of the wanted bytes with [`feed`](Self::feed); collect a
/// finished frame with [`take`](Self::take), which resets the machine for the
/// next header.
#[derive(Default)]
pub struct FrameDecoder {
    state: Option<DecodeState>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut DecodeState {
        self.state.get_or_insert(DecodeState::AwaitHeader {
            header: [0; HEADER_LEN],
            have: 0,
        })
    }

    /// Exact number of bytes wanted to make the next transition; zero when a
    /// frame is complete and waiting to be taken.
    pub fn needed(&self) -> usize {
        match self.state {
            None | Some(DecodeState::AwaitHeader { have: 0, .. }) => HEADER_LEN,
            Some(DecodeState::AwaitHeader { have, .. }) => HEADER_LEN - have,
            Some(DecodeState::AwaitPayload {
                size, ref payload, ..
            }) => size - payload.len(),
            Some(DecodeState::Complete(_)) => 0,
        }
    }

    /// Consumes bytes from `chunk` until a frame completes or the chunk is
    /// exhausted, returning how many were taken. Bytes past a completed
    /// frame are left untouched for the caller.
    pub fn feed(&mut self, chunk: &[u8]) -> usize {
        let mut consumed = 0;
        loop {
            let n = self.step(&chunk[consumed..]);
            if n == 0 {
                return consumed;
            }
            consumed += n;
        }
    }

    /// Advances at most one state transition, returning the bytes consumed;
    /// zero means the chunk is empty or a frame is waiting to be taken.
    fn step(&mut self, chunk: &[u8]) -> usize {
        let state = self.state_mut();
        match state {
            DecodeState::AwaitHeader { header, have } => {
                let take = chunk.len().min(HEADER_LEN - *have);
                header[*have..*have + take].copy_from_slice(&chunk[..take]);
                *have += take;
                if *have == HEADER_LEN {
                    let size = u16::from_be_bytes([header[0], header[1]]) as usize;
                    let tag = header[2];
                    *state = if size == 0 {
                        DecodeState::Complete(RawFrame {
                            tag,
                            payload: Vec::new(),
                        })
                    } else {
                        DecodeState::AwaitPayload {
                            tag,
                            size,
                            payload: Vec::with_capacity(size),
                        }
                    };
                }
                take
            }
            DecodeState::AwaitPayload { tag, size, payload } => {
                let take = chunk.len().min(*size - payload.len());
                payload.extend_from_slice(&chunk[..take]);
                if payload.len() == *size {
                    *state = DecodeState::Complete(RawFrame {
                        tag: *tag,
                        payload: std::mem::take(payload),
                    });
                }
                take
            }
            DecodeState::Complete(_) => 0,
        }
    }

    /// Removes a completed frame, resetting the decoder for the next header.
    pub fn take(&mut self) -> Option<RawFrame> {
        match self.state.take() {
            Some(DecodeState::Complete(frame)) => Some(frame),
            other => {
                self.state = other;
                None
            }
        }
    }
}
