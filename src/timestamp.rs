//! Entry modification times.
//!
//! This module provides the [`Timestamp`] type for entry modification times.
//! Tar headers store whole seconds since the Unix epoch in an octal field;
//! PAX extended headers may carry a decimal value with a fractional part
//! (`"1700000000.25"`), so a timestamp keeps nanoseconds alongside seconds.
//!
//! # Example
//!
//! ```rust
//! use unarchive::Timestamp;
//!
//! let ts = Timestamp::from_unix_secs(1_700_000_000);
//! assert_eq!(ts.as_unix_secs(), 1_700_000_000);
//!
//! let precise = Timestamp::parse_pax("1700000000.5").unwrap();
//! assert_eq!(precise.subsec_nanos(), 500_000_000);
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// A modification time relative to the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    /// Creates a timestamp from whole seconds since the Unix epoch.
    pub fn from_unix_secs(secs: i64) -> Self {
        Self { secs, nanos: 0 }
    }

    /// Creates a timestamp from seconds and a sub-second nanosecond part.
    ///
    /// Nanoseconds of a second or more carry into `secs`.
    pub fn from_unix_parts(secs: i64, nanos: u32) -> Self {
        let carry = (nanos / NANOS_PER_SECOND) as i64;
        Self {
            secs: secs.saturating_add(carry),
            nanos: nanos % NANOS_PER_SECOND,
        }
    }

    /// Parses a PAX `mtime` record value.
    ///
    /// Accepts an optional sign, whole seconds and an optional fractional
    /// part. Digits beyond nanosecond precision are truncated. Returns `None`
    /// for anything else.
    pub fn parse_pax(value: &str) -> Option<Self> {
        let value = value.trim();
        let (negative, digits) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let secs: i64 = whole.parse().ok()?;
        let mut nanos: u32 = 0;
        let mut scale = NANOS_PER_SECOND / 10;
        for b in frac.bytes().take(9) {
            nanos += (b - b'0') as u32 * scale;
            scale /= 10;
        }

        if negative {
            // -1.25 is 1.25 seconds before the epoch: secs = -2, nanos = 0.75s
            if nanos == 0 {
                Some(Self::from_unix_secs(-secs))
            } else {
                Some(Self {
                    secs: -secs - 1,
                    nanos: NANOS_PER_SECOND - nanos,
                })
            }
        } else {
            Some(Self { secs, nanos })
        }
    }

    /// Returns whole seconds since the Unix epoch (rounded toward negative infinity).
    pub fn as_unix_secs(&self) -> i64 {
        self.secs
    }

    /// Returns the sub-second part in nanoseconds.
    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// Converts to [`SystemTime`].
    pub fn as_system_time(&self) -> SystemTime {
        if self.secs >= 0 {
            UNIX_EPOCH + Duration::new(self.secs as u64, self.nanos)
        } else {
            let before = Duration::from_secs(self.secs.unsigned_abs());
            UNIX_EPOCH - before + Duration::from_nanos(self.nanos as u64)
        }
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> Self {
        ts.as_system_time()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.nanos == 0 {
            write!(f, "{}", self.secs)
        } else {
            let frac = format!("{:09}", self.nanos);
            write!(f, "{}.{}", self.secs, frac.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        let ts = Timestamp::from_unix_secs(0);
        assert_eq!(ts.as_system_time(), UNIX_EPOCH);
        assert_eq!(ts.to_string(), "0");
    }

    #[test]
    fn test_parse_pax_whole_seconds() {
        let ts = Timestamp::parse_pax("1700000000").unwrap();
        assert_eq!(ts.as_unix_secs(), 1_700_000_000);
        assert_eq!(ts.subsec_nanos(), 0);
    }

    #[test]
    fn test_parse_pax_fraction() {
        let ts = Timestamp::parse_pax("12.000000250").unwrap();
        assert_eq!(ts.as_unix_secs(), 12);
        assert_eq!(ts.subsec_nanos(), 250);
        assert_eq!(ts.to_string(), "12.00000025");
    }

    #[test]
    fn test_parse_pax_truncates_beyond_nanos() {
        let ts = Timestamp::parse_pax("1.1234567899").unwrap();
        assert_eq!(ts.subsec_nanos(), 123_456_789);
    }

    #[test]
    fn test_parse_pax_negative() {
        let ts = Timestamp::parse_pax("-1.25").unwrap();
        assert_eq!(ts.as_unix_secs(), -2);
        assert_eq!(ts.subsec_nanos(), 750_000_000);
        assert_eq!(
            ts.as_system_time(),
            UNIX_EPOCH - Duration::from_millis(1250)
        );
    }

    #[test]
    fn test_parse_pax_rejects_garbage() {
        assert!(Timestamp::parse_pax("").is_none());
        assert!(Timestamp::parse_pax("abc").is_none());
        assert!(Timestamp::parse_pax("12.3x").is_none());
        assert!(Timestamp::parse_pax(".5").is_none());
    }

    #[test]
    fn test_from_parts_carries() {
        let ts = Timestamp::from_unix_parts(10, 1_500_000_000);
        assert_eq!(ts.as_unix_secs(), 11);
        assert_eq!(ts.subsec_nanos(), 500_000_000);
    }

    #[test]
    fn test_ordering() {
        let a = Timestamp::from_unix_parts(5, 10);
        let b = Timestamp::from_unix_parts(5, 20);
        let c = Timestamp::from_unix_secs(6);
        assert!(a < b && b < c);
    }
}
