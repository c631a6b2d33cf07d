use crate::invariants::{debug_assert_ring_accounting, debug_assert_window_bounded};
use thiserror::Error;

/// Errors raised when a caller breaks a ring precondition.
///
/// Either variant is a bug in the caller's accounting, not a recoverable
/// runtime condition: the pipelines size every transfer against `room()` or
/// `available()` before touching the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// `store()` was asked to accept more bytes than there is room for.
    #[error("asked to store {requested} bytes with room for only {room}")]
    Overflow { requested: usize, room: usize },

    /// `advance()` was asked to release more bytes than are available.
    #[error("asked to release {requested} bytes with only {available} available")]
    Overrun { requested: usize, available: usize },
}

/// Fixed-capacity SPSC byte ring.
///
/// Internally the buffer holds `capacity + 1` slots; one slot is kept empty
/// so a full ring and an empty ring are distinguishable from the two indices
/// alone. `room()` and `available()` report against the public capacity.
///
/// Wrap-around is never visible to callers: `store()` splits a straddling
/// copy internally, and `read_window()` exposes only the largest contiguous
/// readable slice (call it again after `advance()` to see the wrapped
/// remainder).
#[derive(Debug)]
pub struct ByteRing {
    buf: Box<[u8]>,
    size: usize,
    rpos: usize,
    wpos: usize,
}

impl ByteRing {
    /// Creates a ring that can hold up to `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity + 1].into_boxed_slice(),
            size: capacity,
            rpos: 0,
            wpos: 0,
        }
    }

    // ---------------------------------------------------------------------
    // COUNTERS
    // ---------------------------------------------------------------------

    /// Public capacity of the ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Bytes that may be stored without overwriting unread data.
    #[inline]
    pub fn room(&self) -> usize {
        if self.rpos == self.wpos {
            self.size
        } else if self.rpos < self.wpos {
            self.rpos + self.size - self.wpos
        } else {
            self.rpos - self.wpos - 1
        }
    }

    /// Bytes that may be consumed.
    #[inline]
    pub fn available(&self) -> usize {
        if self.rpos == self.wpos {
            0
        } else if self.rpos < self.wpos {
            self.wpos - self.rpos
        } else {
            self.wpos + self.buf.len() - self.rpos
        }
    }

    /// True when no bytes are buffered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rpos == self.wpos
    }

    /// Fill ratio in `0.0..=1.0`, used for the prebuffer launch gate.
    #[inline]
    pub fn fill_ratio(&self) -> f64 {
        if self.size == 0 {
            0.0
        } else {
            self.available() as f64 / self.size as f64
        }
    }

    // ---------------------------------------------------------------------
    // PRODUCER SIDE
    // ---------------------------------------------------------------------

    /// Copies `src` into the ring, splitting the copy at the wrap point if
    /// needed. An empty `src` is a no-op.
    pub fn store(&mut self, src: &[u8]) -> Result<(), RingError> {
        if src.is_empty() {
            return Ok(());
        }

        let room = self.room();
        if src.len() > room {
            return Err(RingError::Overflow {
                requested: src.len(),
                room,
            });
        }

        let tail = self.buf.len() - self.wpos;
        let first = src.len().min(tail);
        self.buf[self.wpos..self.wpos + first].copy_from_slice(&src[..first]);
        self.wpos += first;
        if self.wpos == self.buf.len() {
            self.wpos = 0;
        }

        let rest = &src[first..];
        if !rest.is_empty() {
            self.buf[..rest.len()].copy_from_slice(rest);
            self.wpos = rest.len();
        }

        debug_assert_ring_accounting!(self.available(), self.room(), self.size);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // CONSUMER SIDE
    // ---------------------------------------------------------------------

    /// Largest contiguous readable slice starting at the read position.
    ///
    /// May be shorter than `available()` when the buffered bytes wrap;
    /// empty exactly when the ring is empty.
    pub fn read_window(&self) -> &[u8] {
        let len = if self.wpos >= self.rpos {
            self.wpos - self.rpos
        } else {
            self.buf.len() - self.rpos
        };

        debug_assert_window_bounded!(len, self.available());
        &self.buf[self.rpos..self.rpos + len]
    }

    /// Releases `count` bytes, advancing the read position past them.
    pub fn advance(&mut self, count: usize) -> Result<(), RingError> {
        let available = self.available();
        if count > available {
            return Err(RingError::Overrun {
                requested: count,
                available,
            });
        }

        self.rpos += count;
        if self.rpos >= self.buf.len() {
            self.rpos -= self.buf.len();
        }

        debug_assert_ring_accounting!(self.available(), self.room(), self.size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_reports_full_room() {
        let ring = ByteRing::new(16);
        assert_eq!(ring.room(), 16);
        assert_eq!(ring.available(), 0);
        assert!(ring.read_window().is_empty());
    }

    #[test]
    fn store_then_drain_round_trips() {
        let mut ring = ByteRing::new(8);
        ring.store(b"hello").unwrap();
        assert_eq!(ring.read_window(), b"hello");
        ring.advance(5).unwrap();
        assert!(ring.is_empty());
        assert_eq!(ring.room(), 8);
    }

    #[test]
    fn wrapping_store_splits_into_two_windows() {
        let mut ring = ByteRing::new(8);
        ring.store(b"abcdef").unwrap();
        ring.advance(6).unwrap();

        // Write straddles the internal wrap point.
        ring.store(b"ABCDEFG").unwrap();
        assert_eq!(ring.available(), 7);

        let first = ring.read_window().to_vec();
        assert!(first.len() < 7);
        let n = first.len();
        ring.advance(n).unwrap();
        let second = ring.read_window().to_vec();
        assert_eq!(first.len() + second.len(), 7);

        let mut joined = first;
        joined.extend_from_slice(&second);
        assert_eq!(joined, b"ABCDEFG");
    }

    #[test]
    fn overflow_is_rejected_and_leaves_state_intact() {
        let mut ring = ByteRing::new(4);
        ring.store(b"abc").unwrap();
        let err = ring.store(b"xyz").unwrap_err();
        assert_eq!(
            err,
            RingError::Overflow {
                requested: 3,
                room: 1
            }
        );
        assert_eq!(ring.read_window(), b"abc");
    }

    #[test]
    fn overrun_is_rejected() {
        let mut ring = ByteRing::new(4);
        ring.store(b"ab").unwrap();
        let err = ring.advance(3).unwrap_err();
        assert_eq!(
            err,
            RingError::Overrun {
                requested: 3,
                available: 2
            }
        );
    }

    #[test]
    fn empty_store_is_a_noop() {
        let mut ring = ByteRing::new(4);
        ring.store(b"").unwrap();
        assert_eq!(ring.room(), 4);
    }

    #[test]
    fn ring_can_fill_to_exact_capacity() {
        let mut ring = ByteRing::new(4);
        ring.store(b"wxyz").unwrap();
        assert_eq!(ring.room(), 0);
        assert_eq!(ring.available(), 4);
        ring.advance(4).unwrap();
        assert_eq!(ring.room(), 4);
    }
}
