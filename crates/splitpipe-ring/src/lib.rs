//! Fixed-capacity byte ring for single-producer single-consumer pipelines.
//!
//! The ring is owned by one cooperative loop: the producer side stores bytes
//! read from an input descriptor, the consumer side drains them through
//! zero-copy contiguous read windows. There is no locking and no atomics —
//! both ends live on the same thread and all suspension happens outside the
//! ring.
//!
//! # Example
//!
//! ```
//! use splitpipe_ring::ByteRing;
//!
//! let mut ring = ByteRing::new(8);
//! ring.store(b"abcde").unwrap();
//! assert_eq!(ring.available(), 5);
//! assert_eq!(ring.room(), 3);
//!
//! let window = ring.read_window();
//! assert_eq!(window, b"abcde");
//! ring.advance(5).unwrap();
//! assert_eq!(ring.available(), 0);
//! ```

mod invariants;
mod ring;

pub use ring::{ByteRing, RingError};
