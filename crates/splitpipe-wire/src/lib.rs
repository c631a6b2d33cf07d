//! The framed wire format shared by the splitpipe producer and the joinpipe
//! consumer.
//!
//! Every record ("stretch") on a volume is a three-byte header followed by a
//! payload: a 16-bit big-endian payload length, an 8-bit type tag, then the
//! payload bytes. Multi-byte integers are big-endian throughout; payloads are
//! unaligned and at most 65535 bytes.
//!
//! The crate also carries the two identities that ride on that format: the
//! 16-byte random session id every volume repeats, and the running MD5 digest
//! the producer snapshots into each checksum stretch.

mod digest;
mod error;
mod frame;
mod hexdump;
mod session;

pub use digest::{RunningDigest, MD5_LEN};
pub use error::WireError;
pub use frame::{
    encode_frame, stretch_header, FrameDecoder, FrameKind, RawFrame, HEADER_LEN, MAX_PAYLOAD,
};
pub use hexdump::hex_dump;
pub use session::{SessionId, SESSION_ID_LEN};
