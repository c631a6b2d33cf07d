//! Debug assertion macros for ring bookkeeping.
//!
//! Active only in debug builds; release builds pay nothing.

/// Assert that the two public counters partition the capacity.
///
/// Holds after every mutation: `available() + room() == capacity()`.
macro_rules! debug_assert_ring_accounting {
    ($avail:expr, $room:expr, $cap:expr) => {
        debug_assert!(
            $avail + $room == $cap,
            "ring accounting broken: available {} + room {} != capacity {}",
            $avail,
            $room,
            $cap
        )
    };
}

/// Assert that a read window never exposes more than is available.
macro_rules! debug_assert_window_bounded {
    ($window_len:expr, $avail:expr) => {
        debug_assert!(
            $window_len <= $avail,
            "read window of {} bytes exceeds {} available",
            $window_len,
            $avail
        )
    };
}

pub(crate) use debug_assert_ring_accounting;
pub(crate) use debug_assert_window_bounded;
