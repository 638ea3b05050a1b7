//! Timestamp values
//!
//! Nanoseconds from the Unix epoch, bounded to the protobuf `Timestamp`
//! range 0001-01-01T00:00:00Z .. 9999-12-31T23:59:59.999999999Z.
//! Component accessors take an optional time zone, either a fixed offset
//! (`"+07:30"`) or an IANA name (`"America/New_York"`).

use crate::duration::CelDuration;
use crate::error::CelError;
use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

/// 0001-01-01T00:00:00Z in Unix seconds
pub const MIN_TIMESTAMP_SECONDS: i64 = -62_135_596_800;
/// 9999-12-31T23:59:59Z in Unix seconds
pub const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;

const NANOS_PER_SECOND: i128 = 1_000_000_000;
const MIN_TIMESTAMP_NANOS: i128 = MIN_TIMESTAMP_SECONDS as i128 * NANOS_PER_SECOND;
const MAX_TIMESTAMP_NANOS: i128 = MAX_TIMESTAMP_SECONDS as i128 * NANOS_PER_SECOND + 999_999_999;

/// Point in time with nanosecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CelTimestamp {
    nanos: i128,
}

impl CelTimestamp {
    pub const UNIX_EPOCH: CelTimestamp = CelTimestamp { nanos: 0 };

    pub fn from_nanos(nanos: i128) -> Result<CelTimestamp, CelError> {
        if !(MIN_TIMESTAMP_NANOS..=MAX_TIMESTAMP_NANOS).contains(&nanos) {
            return Err(CelError::overflow("timestamp"));
        }
        Ok(CelTimestamp { nanos })
    }

    pub fn from_unix_seconds(seconds: i64) -> Result<CelTimestamp, CelError> {
        CelTimestamp::from_nanos(seconds as i128 * NANOS_PER_SECOND)
    }

    pub fn total_nanos(&self) -> i128 {
        self.nanos
    }

    /// Unix seconds, floored (sub-second part is always non-negative)
    pub fn unix_seconds(&self) -> i64 {
        self.nanos.div_euclid(NANOS_PER_SECOND) as i64
    }

    /// Nanoseconds past the floored second, in 0..1_000_000_000
    pub fn subsec_nanos(&self) -> u32 {
        self.nanos.rem_euclid(NANOS_PER_SECOND) as u32
    }

    pub fn checked_add(&self, d: &CelDuration) -> Result<CelTimestamp, CelError> {
        CelTimestamp::from_nanos(self.nanos + d.total_nanos())
    }

    pub fn checked_sub(&self, d: &CelDuration) -> Result<CelTimestamp, CelError> {
        CelTimestamp::from_nanos(self.nanos - d.total_nanos())
    }

    /// Difference of two timestamps; the result must fit the duration range.
    pub fn checked_since(&self, earlier: &CelTimestamp) -> Result<CelDuration, CelError> {
        CelDuration::from_nanos(self.nanos - earlier.nanos)
    }

    /// Parse an RFC 3339 timestamp, e.g. `"2024-01-01T00:00:00Z"`.
    pub fn parse(text: &str) -> Result<CelTimestamp, CelError> {
        let parsed = DateTime::parse_from_rfc3339(text)
            .map_err(|e| CelError::type_conversion(format!("invalid timestamp '{}': {}", text, e)))?;
        CelTimestamp::from_nanos(
            parsed.timestamp() as i128 * NANOS_PER_SECOND + parsed.timestamp_subsec_nanos() as i128,
        )
    }

    fn to_utc(&self) -> DateTime<Utc> {
        // In range by construction; chrono covers year 1..9999.
        Utc.timestamp_opt(self.unix_seconds(), self.subsec_nanos())
            .single()
            .expect("timestamp within protobuf range")
    }

    /// RFC 3339 in UTC, trailing sub-second zeros trimmed.
    pub fn format(&self) -> String {
        let utc = self.to_utc();
        if self.subsec_nanos() == 0 {
            utc.format("%Y-%m-%dT%H:%M:%SZ").to_string()
        } else {
            let frac = format!("{:09}", self.subsec_nanos());
            format!(
                "{}.{}Z",
                utc.format("%Y-%m-%dT%H:%M:%S"),
                frac.trim_end_matches('0')
            )
        }
    }

    /// Calendar/clock components in the given zone (UTC when empty).
    pub fn components(&self, time_zone: &str) -> Result<TimeComponents, CelError> {
        match resolve_zone(time_zone)? {
            ResolvedZone::Fixed(offset) => Ok(TimeComponents::of(&self.to_utc().with_timezone(&offset))),
            ResolvedZone::Named(tz) => Ok(TimeComponents::of(&self.to_utc().with_timezone(&tz))),
        }
    }
}

impl fmt::Display for CelTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// Calendar and clock fields of a zoned instant.
///
/// Zero-based fields follow CEL accessor conventions: `month0` is 0-11,
/// `day_of_week0` is 0 (Sunday) to 6, `day_of_year0` starts at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeComponents {
    pub year: i64,
    pub month0: i64,
    pub day_of_month: i64,
    pub day_of_year0: i64,
    pub day_of_week0: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub milliseconds: i64,
}

impl TimeComponents {
    fn of<Z: TimeZone>(dt: &DateTime<Z>) -> TimeComponents {
        TimeComponents {
            year: dt.year() as i64,
            month0: dt.month0() as i64,
            day_of_month: dt.day() as i64,
            day_of_year0: (dt.ordinal0()) as i64,
            day_of_week0: dt.weekday().num_days_from_sunday() as i64,
            hours: dt.hour() as i64,
            minutes: dt.minute() as i64,
            seconds: dt.second() as i64,
            milliseconds: (dt.timestamp_subsec_millis() % 1000) as i64,
        }
    }
}

enum ResolvedZone {
    Fixed(FixedOffset),
    Named(Tz),
}

/// Resolve a CEL time-zone argument. Empty and "UTC" mean UTC; `±HH:MM`
/// is a fixed offset; anything else is looked up as an IANA name.
fn resolve_zone(time_zone: &str) -> Result<ResolvedZone, CelError> {
    if time_zone.is_empty() || time_zone == "UTC" {
        return Ok(ResolvedZone::Fixed(FixedOffset::east_opt(0).unwrap()));
    }
    let bytes = time_zone.as_bytes();
    if bytes.len() == 6 && (bytes[0] == b'+' || bytes[0] == b'-') && bytes[3] == b':' {
        let hours: i32 = time_zone[1..3]
            .parse()
            .map_err(|_| bad_zone(time_zone))?;
        let minutes: i32 = time_zone[4..6]
            .parse()
            .map_err(|_| bad_zone(time_zone))?;
        let mut offset = hours * 3600 + minutes * 60;
        if bytes[0] == b'-' {
            offset = -offset;
        }
        return FixedOffset::east_opt(offset)
            .map(ResolvedZone::Fixed)
            .ok_or_else(|| bad_zone(time_zone));
    }
    Tz::from_str(time_zone)
        .map(ResolvedZone::Named)
        .map_err(|_| bad_zone(time_zone))
}

fn bad_zone(time_zone: &str) -> CelError {
    CelError::invalid_argument(format!("invalid time zone: '{}'", time_zone))
}
