//! Duration values
//!
//! A signed nanosecond count bounded to ±10,000 years (the protobuf
//! `Duration` range). Arithmetic is checked; leaving the range produces an
//! overflow error value, never a wrapped result.

use crate::error::CelError;
use std::fmt;

/// Inclusive bound: 10,000 years of 365.25 days, in seconds.
pub const MAX_DURATION_SECONDS: i64 = 315_576_000_000;

const NANOS_PER_SECOND: i128 = 1_000_000_000;
const MAX_DURATION_NANOS: i128 = MAX_DURATION_SECONDS as i128 * NANOS_PER_SECOND;

/// Signed duration with nanosecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CelDuration {
    nanos: i128,
}

impl CelDuration {
    pub const ZERO: CelDuration = CelDuration { nanos: 0 };

    /// Construct from a total nanosecond count, checking the range.
    pub fn from_nanos(nanos: i128) -> Result<CelDuration, CelError> {
        if nanos.abs() > MAX_DURATION_NANOS {
            return Err(CelError::overflow("duration"));
        }
        Ok(CelDuration { nanos })
    }

    pub fn from_seconds(seconds: i64) -> Result<CelDuration, CelError> {
        CelDuration::from_nanos(seconds as i128 * NANOS_PER_SECOND)
    }

    /// Construct from protobuf-style (seconds, nanos) parts.
    pub fn from_parts(seconds: i64, nanos: i32) -> Result<CelDuration, CelError> {
        CelDuration::from_nanos(seconds as i128 * NANOS_PER_SECOND + nanos as i128)
    }

    pub fn total_nanos(&self) -> i128 {
        self.nanos
    }

    /// Whole-second component (truncated toward zero)
    pub fn seconds(&self) -> i64 {
        (self.nanos / NANOS_PER_SECOND) as i64
    }

    /// Sub-second component, same sign as the duration
    pub fn subsec_nanos(&self) -> i32 {
        (self.nanos % NANOS_PER_SECOND) as i32
    }

    pub fn total_hours(&self) -> i64 {
        (self.nanos / (3600 * NANOS_PER_SECOND)) as i64
    }

    pub fn total_minutes(&self) -> i64 {
        (self.nanos / (60 * NANOS_PER_SECOND)) as i64
    }

    pub fn total_milliseconds(&self) -> i64 {
        (self.nanos / 1_000_000) as i64
    }

    pub fn checked_add(&self, other: &CelDuration) -> Result<CelDuration, CelError> {
        CelDuration::from_nanos(self.nanos + other.nanos)
    }

    pub fn checked_sub(&self, other: &CelDuration) -> Result<CelDuration, CelError> {
        CelDuration::from_nanos(self.nanos - other.nanos)
    }

    pub fn checked_neg(&self) -> Result<CelDuration, CelError> {
        CelDuration::from_nanos(-self.nanos)
    }

    /// Parse a CEL duration literal: an optional sign followed by one or
    /// more `<decimal><unit>` terms, units `h`, `m`, `s`, `ms`, `us`, `ns`.
    /// Examples: `"72h3m0.5s"`, `"-10s"`, `"300ms"`.
    pub fn parse(text: &str) -> Result<CelDuration, CelError> {
        let bad = || CelError::type_conversion(format!("invalid duration: '{}'", text));
        let (negative, mut rest) = match text.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        if rest.is_empty() {
            return Err(bad());
        }
        if rest == "0" {
            return Ok(CelDuration::ZERO);
        }
        let mut total: i128 = 0;
        while !rest.is_empty() {
            let digits_end = rest
                .find(|c: char| !c.is_ascii_digit() && c != '.')
                .ok_or_else(bad)?;
            if digits_end == 0 {
                return Err(bad());
            }
            let (number, tail) = rest.split_at(digits_end);
            let unit_end = tail
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(tail.len());
            let (unit, tail) = tail.split_at(unit_end);
            rest = tail;

            let unit_nanos: i128 = match unit {
                "h" => 3600 * NANOS_PER_SECOND,
                "m" => 60 * NANOS_PER_SECOND,
                "s" => NANOS_PER_SECOND,
                "ms" => 1_000_000,
                "us" | "µs" => 1_000,
                "ns" => 1,
                _ => return Err(bad()),
            };

            // Split integer and fractional digits so parsing stays exact.
            let (int_part, frac_part) = match number.split_once('.') {
                Some((i, f)) => (i, f),
                None => (number, ""),
            };
            if int_part.is_empty() && frac_part.is_empty() {
                return Err(bad());
            }
            let int_value: i128 = if int_part.is_empty() {
                0
            } else {
                int_part.parse().map_err(|_| bad())?
            };
            total = int_value
                .checked_mul(unit_nanos)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(bad)?;
            if !frac_part.is_empty() {
                let frac_value: i128 = frac_part.parse().map_err(|_| bad())?;
                let scale = 10i128.checked_pow(frac_part.len() as u32).ok_or_else(bad)?;
                total += frac_value * unit_nanos / scale;
            }
        }
        let nanos = if negative { -total } else { total };
        CelDuration::from_nanos(nanos).map_err(|_| CelError::overflow("duration"))
    }

    /// Format in the same literal syntax `parse` accepts, trimming zero
    /// components: `"72h3m0.5s"`, `"-10s"`, `"0s"`.
    pub fn format(&self) -> String {
        if self.nanos == 0 {
            return "0s".to_string();
        }
        let mut out = String::new();
        let mut nanos = self.nanos;
        if nanos < 0 {
            out.push('-');
            nanos = -nanos;
        }
        let hours = nanos / (3600 * NANOS_PER_SECOND);
        nanos %= 3600 * NANOS_PER_SECOND;
        let minutes = nanos / (60 * NANOS_PER_SECOND);
        nanos %= 60 * NANOS_PER_SECOND;
        let seconds = nanos / NANOS_PER_SECOND;
        let frac = nanos % NANOS_PER_SECOND;
        if hours != 0 {
            out.push_str(&format!("{}h", hours));
        }
        if minutes != 0 {
            out.push_str(&format!("{}m", minutes));
        }
        if frac != 0 {
            let frac_str = format!("{:09}", frac);
            out.push_str(&format!("{}.{}s", seconds, frac_str.trim_end_matches('0')));
        } else if seconds != 0 || (hours == 0 && minutes == 0) {
            out.push_str(&format!("{}s", seconds));
        }
        out
    }
}

impl fmt::Display for CelDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compound() {
        let d = CelDuration::parse("72h3m0.5s").unwrap();
        assert_eq!(
            d.total_nanos(),
            (72 * 3600 + 3 * 60) as i128 * 1_000_000_000 + 500_000_000
        );
    }

    #[test]
    fn test_parse_negative_and_units() {
        assert_eq!(CelDuration::parse("-10s").unwrap().seconds(), -10);
        assert_eq!(CelDuration::parse("300ms").unwrap().total_milliseconds(), 300);
        assert_eq!(CelDuration::parse("250ns").unwrap().total_nanos(), 250);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "h", "10", "10x", "--5s", "1.2.3s"] {
            assert!(CelDuration::parse(bad).is_err(), "should reject '{}'", bad);
        }
    }

    #[test]
    fn test_format_round_trip() {
        for text in ["72h3m0.5s", "-10s", "0s", "1h", "2m", "1.5s"] {
            let d = CelDuration::parse(text).unwrap();
            assert_eq!(d.format(), text, "format should round-trip parse");
        }
    }

    #[test]
    fn test_range_enforced() {
        assert!(CelDuration::from_seconds(MAX_DURATION_SECONDS).is_ok());
        assert!(CelDuration::from_nanos(MAX_DURATION_SECONDS as i128 * 1_000_000_000 + 1).is_err());

        let max = CelDuration::from_seconds(MAX_DURATION_SECONDS).unwrap();
        let one = CelDuration::from_seconds(1).unwrap();
        assert!(max.checked_add(&one).is_err(), "crossing the bound is overflow");
        assert!(max.checked_sub(&one).is_ok());
    }
}
