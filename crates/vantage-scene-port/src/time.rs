// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Timestamps shared by message headers and the host frame clock.

use core::fmt;

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point in time as seconds plus nanoseconds.
///
/// `nsec` is always kept below one second by the constructors; values decoded
/// from the wire are folded through [`Time::new`] by the normalizers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time {
    /// Whole seconds.
    pub sec: u32,
    /// Nanoseconds past `sec`.
    pub nsec: u32,
}

impl Time {
    /// Canonical zero time. Missing timestamps normalize to this value.
    pub const ZERO: Self = Self { sec: 0, nsec: 0 };

    /// Creates a time, carrying excess nanoseconds into seconds.
    #[must_use]
    pub fn new(sec: u32, nsec: u32) -> Self {
        let carry = nsec / 1_000_000_000;
        Self {
            sec: sec.saturating_add(carry),
            nsec: nsec % 1_000_000_000,
        }
    }

    /// Creates a time from a nanosecond count (saturating at `u32::MAX` seconds).
    #[must_use]
    pub fn from_nanos(nanos: u64) -> Self {
        let sec = u32::try_from(nanos / NANOS_PER_SEC).unwrap_or(u32::MAX);
        #[allow(clippy::cast_possible_truncation)]
        let nsec = (nanos % NANOS_PER_SEC) as u32;
        Self { sec, nsec }
    }

    /// Total nanoseconds since zero.
    #[must_use]
    pub fn to_nanos(self) -> u64 {
        u64::from(self.sec) * NANOS_PER_SEC + u64::from(self.nsec)
    }

    /// Seconds as a float, for display and interpolation.
    #[must_use]
    pub fn as_secs_f64(self) -> f64 {
        f64::from(self.sec) + f64::from(self.nsec) / 1e9
    }

    /// Returns `true` for [`Time::ZERO`].
    #[must_use]
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_carries_nanoseconds() {
        let time = Time::new(1, 2_500_000_000);
        assert_eq!((time.sec, time.nsec), (3, 500_000_000));
    }

    #[test]
    fn nanos_round_trip() {
        let t = Time::new(12, 345);
        assert_eq!(Time::from_nanos(t.to_nanos()), t);
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(Time::new(1, 999_999_999) < Time::new(2, 0));
        assert!(Time::ZERO.is_zero());
    }

    #[test]
    fn display_pads_nanoseconds() {
        assert_eq!(Time::new(5, 42).to_string(), "5.000000042");
    }
}
