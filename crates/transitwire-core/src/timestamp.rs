use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{OffsetDateTime, UtcOffset};

use crate::date_codec;
use crate::error::DateError;

/// Calendar instant normalized to UTC.
///
/// Serializes as RFC 3339 with millisecond precision and deserializes from either
/// wire encoding the remote service emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Converts any offset into UTC; rejects instants outside years 0000-9999.
    pub fn from_offset_datetime(value: OffsetDateTime) -> Result<Self, DateError> {
        let value = value.to_offset(UtcOffset::UTC);
        if !(0..=9999).contains(&value.year()) {
            return Err(DateError::OutOfRange {
                value: value.unix_timestamp().to_string(),
            });
        }
        Ok(Self(value))
    }

    pub fn from_unix_millis(millis: i64) -> Result<Self, DateError> {
        let nanos = i128::from(millis) * 1_000_000;
        let value = OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|_| {
            DateError::OutOfRange {
                value: millis.to_string(),
            }
        })?;
        Self::from_offset_datetime(value).map_err(|_| DateError::OutOfRange {
            value: millis.to_string(),
        })
    }

    /// Parses either the legacy `/Date(ms)/` form or an ISO-8601 string.
    pub fn parse(input: &str) -> Result<Self, DateError> {
        date_codec::decode_date(input)
    }

    pub fn unix_millis(self) -> i64 {
        // Bounded to years 0000-9999, well inside i64 milliseconds.
        self.0.unix_timestamp_nanos().div_euclid(1_000_000) as i64
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// `YYYY-MM-DDTHH:MM:SS.mmmZ`
    pub fn format_rfc3339(self) -> String {
        let value = self.0;
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            value.year(),
            u8::from(value.month()),
            value.day(),
            value.hour(),
            value.minute(),
            value.second(),
            value.millisecond()
        )
    }

    /// `YYYY-MM-DD`, the form the remote expects for date path segments.
    pub fn format_date(self) -> String {
        let value = self.0;
        format!(
            "{:04}-{:02}-{:02}",
            value.year(),
            u8::from(value.month()),
            value.day()
        )
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}
