//! Duration to wire timeval conversion.
//!
//! A zero duration is the "no explicit timeout" sentinel and never reaches the
//! socket as a zero timeout (which the OS would read as "block forever" or
//! "non-blocking", depending on the call).

use std::time::Duration;

/// Timeout split into whole seconds and a microsecond remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WireTimeval {
    /// Whole seconds.
    pub seconds: u64,
    /// Sub-second remainder, truncated to microseconds (< 1_000_000).
    pub microseconds: u32,
}

impl WireTimeval {
    /// Splits `dur` by truncation; sub-microsecond precision is dropped.
    #[inline]
    pub const fn from_duration(dur: Duration) -> Self {
        WireTimeval {
            seconds: dur.as_secs(),
            microseconds: dur.subsec_micros(),
        }
    }

    /// Rebuilds the (truncated) duration.
    #[inline]
    pub const fn to_duration(self) -> Duration {
        Duration::new(self.seconds, self.microseconds * 1_000)
    }

    /// Returns true if both components are zero.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.seconds == 0 && self.microseconds == 0
    }
}

/// Returns the timeval to hand to the transport, or `None` when the
/// transport default must be used.
///
/// Durations that truncate to zero microseconds also map to `None`.
pub fn explicit_timeout(dur: Duration) -> Option<WireTimeval> {
    let tv = WireTimeval::from_duration(dur);
    if tv.is_zero() {
        None
    } else {
        Some(tv)
    }
}
