//! Legacy and ISO-8601 date handling.
//!
//! The remote service emits dates in two shapes, and the same logical field can
//! arrive in either depending on endpoint and API version:
//!
//! | Encoding | Example |
//! |----------|---------|
//! | Legacy | `/Date(1700000000000-0700)/`, or `\/Date(...)\/` when double escaped |
//! | Standard | `2023-11-14`, `2023-11-14T22:13`, `2023-11-14T22:13:20.5+02:00` |
//!
//! Detection is structural, never by field name. Every recognized value is
//! normalized to the canonical RFC 3339 UTC form produced by
//! [`UtcDateTime::format_rfc3339`].
//!
//! The offset suffix of the legacy form is parsed and then discarded: the
//! millisecond payload is taken as UTC. Historical data depends on this.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::DateError;
use crate::UtcDateTime;

static LEGACY_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\\?/Date\((-?\d{1,19})(?:([+-])(\d{2})(\d{2}))?\)\\?/$")
        .expect("legacy date pattern is valid")
});

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})-(\d{2})-(\d{2})(?:[T ](\d{2}):(\d{2})(?::(\d{2})(?:[.,](\d{1,9}))?)?)?(Z|z|[+-]\d{2}(?::?\d{2})?)?$",
    )
    .expect("iso date pattern is valid")
});

/// Structural classification of a string, before any calendar validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateEncoding {
    Legacy,
    Standard,
    Unrecognized,
}

/// Result of decoding a string that may carry a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedDate {
    /// `/Date(ms±hhmm)/`; `offset_minutes` is reported but never applied.
    Legacy {
        at: UtcDateTime,
        offset_minutes: Option<i16>,
    },
    Standard(UtcDateTime),
    Unrecognized,
}

impl DecodedDate {
    pub const fn timestamp(self) -> Option<UtcDateTime> {
        match self {
            Self::Legacy { at, .. } => Some(at),
            Self::Standard(at) => Some(at),
            Self::Unrecognized => None,
        }
    }

    pub const fn is_recognized(self) -> bool {
        !matches!(self, Self::Unrecognized)
    }
}

pub fn classify(value: &str) -> DateEncoding {
    if LEGACY_DATE.is_match(value) {
        DateEncoding::Legacy
    } else if ISO_DATE.is_match(value) {
        DateEncoding::Standard
    } else {
        DateEncoding::Unrecognized
    }
}

/// Decodes either encoding. Strings that match a pattern but name an impossible
/// instant (month 13, year 10000 after conversion) are `Unrecognized`.
pub fn decode(value: &str) -> DecodedDate {
    if let Some(captures) = LEGACY_DATE.captures(value) {
        return decode_legacy(&captures).unwrap_or(DecodedDate::Unrecognized);
    }
    if let Some(captures) = ISO_DATE.captures(value) {
        return decode_standard(&captures)
            .map(DecodedDate::Standard)
            .unwrap_or(DecodedDate::Unrecognized);
    }
    DecodedDate::Unrecognized
}

pub fn decode_date(value: &str) -> Result<UtcDateTime, DateError> {
    decode(value).timestamp().ok_or_else(|| DateError::Unrecognized {
        value: value.to_owned(),
    })
}

/// Decodes a nullable JSON date field. `null` short-circuits without parsing.
pub fn decode_nullable(value: &Value) -> Result<Option<UtcDateTime>, DateError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => decode_date(text).map(Some),
        other => Err(DateError::NotAString {
            found: crate::contract::json_type_name(other),
        }),
    }
}

pub fn encode_legacy(millis: i64) -> String {
    format!("/Date({millis})/")
}

pub fn encode_standard(at: UtcDateTime) -> String {
    at.format_rfc3339()
}

/// Date form used when a date travels in a request URL.
pub fn encode_request_date(at: UtcDateTime) -> String {
    at.format_date()
}

/// Walks arbitrary JSON and rewrites every string that decodes as a date into the
/// canonical form. Non-date strings and all other values are returned untouched.
pub fn convert_dates(value: Value) -> Value {
    match value {
        Value::String(text) => match decode(&text).timestamp() {
            Some(at) => Value::String(encode_standard(at)),
            None => Value::String(text),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(convert_dates).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, convert_dates(item)))
                .collect(),
        ),
        other => other,
    }
}

fn decode_legacy(captures: &Captures<'_>) -> Option<DecodedDate> {
    let millis = captures.get(1)?.as_str().parse::<i64>().ok()?;
    let offset_minutes = match (captures.get(2), captures.get(3), captures.get(4)) {
        (Some(sign), Some(hours), Some(minutes)) => {
            let hours = hours.as_str().parse::<i16>().ok()?;
            let minutes = minutes.as_str().parse::<i16>().ok()?;
            let total = hours * 60 + minutes;
            Some(if sign.as_str() == "-" { -total } else { total })
        }
        _ => None,
    };
    let at = UtcDateTime::from_unix_millis(millis).ok()?;
    Some(DecodedDate::Legacy { at, offset_minutes })
}

fn decode_standard(captures: &Captures<'_>) -> Option<UtcDateTime> {
    let number = |index: usize| -> Option<u32> {
        captures
            .get(index)
            .map(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(Some(0))
    };

    let year = i32::try_from(number(1)?).ok()?;
    let month = Month::try_from(u8::try_from(number(2)?).ok()?).ok()?;
    let day = u8::try_from(number(3)?).ok()?;
    let date = Date::from_calendar_date(year, month, day).ok()?;

    let hour = u8::try_from(number(4)?).ok()?;
    let minute = u8::try_from(number(5)?).ok()?;
    let second = u8::try_from(number(6)?).ok()?;
    let nanos = match captures.get(7) {
        Some(fraction) => {
            let digits = fraction.as_str();
            let padded = format!("{digits:0<9}");
            padded.parse::<u32>().ok()?
        }
        None => 0,
    };
    let time = Time::from_hms_nano(hour, minute, second, nanos).ok()?;

    let offset = match captures.get(8).map(|m| m.as_str()) {
        None | Some("Z") | Some("z") => UtcOffset::UTC,
        Some(raw) => parse_offset(raw)?,
    };

    let local: OffsetDateTime = PrimitiveDateTime::new(date, time).assume_offset(offset);
    UtcDateTime::from_offset_datetime(local).ok()
}

fn parse_offset(raw: &str) -> Option<UtcOffset> {
    let sign: i8 = if raw.starts_with('-') { -1 } else { 1 };
    let digits: String = raw[1..].chars().filter(char::is_ascii_digit).collect();
    let hours = digits.get(0..2)?.parse::<i8>().ok()?;
    let minutes = match digits.get(2..4) {
        Some(value) => value.parse::<i8>().ok()?,
        None => 0,
    };
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}
