//! Date property conversions
//!
//! Date properties are stored as integer epochs: milliseconds for `Date`,
//! nanoseconds for `DateNano`. Inputs may be a timestamp, float seconds or an
//! integer already in the native unit. All scaling floors, so negative
//! timestamps do not drift towards zero.

use crate::error::{Error, Result};
use crate::kind::DateRepr;
use crate::value::Value;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

/// Units per second of `Date` properties
pub const MILLIS_PER_SECOND: i64 = 1_000;

/// Units per second of `DateNano` properties
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a UTC timestamp to an integer epoch with `units_per_second`
pub fn datetime_to_int(dt: &DateTime<Utc>, units_per_second: i64) -> Result<i64> {
    let subsec = i64::from(dt.timestamp_subsec_nanos()) * units_per_second / NANOS_PER_SECOND;
    dt.timestamp()
        .checked_mul(units_per_second)
        .and_then(|v| v.checked_add(subsec))
        .ok_or_else(|| Error::InvalidTimestamp(format!("{} overflows the epoch range", dt)))
}

/// Convert a naive timestamp, interpreted in the local zone, to an integer epoch
pub fn local_to_int(naive: &NaiveDateTime, units_per_second: i64) -> Result<i64> {
    let local = Local.from_local_datetime(naive).earliest().ok_or_else(|| {
        Error::InvalidTimestamp(format!("{} does not exist in the local time zone", naive))
    })?;
    datetime_to_int(&local.with_timezone(&Utc), units_per_second)
}

/// Convert float seconds to an integer epoch, flooring
pub fn seconds_to_int(seconds: f64, units_per_second: i64) -> Result<i64> {
    let scaled = (seconds * units_per_second as f64).floor();
    if !scaled.is_finite() || scaled < i64::MIN as f64 || scaled >= i64::MAX as f64 {
        return Err(Error::InvalidTimestamp(format!(
            "{} seconds is outside the epoch range",
            seconds
        )));
    }
    Ok(scaled as i64)
}

/// Convert any accepted date input to an integer epoch
///
/// Accepts `Int` (native unit, as-is), `Float` (seconds), `Timestamp` and
/// `LocalTimestamp`.
pub fn date_value_to_int(value: &Value, units_per_second: i64) -> Result<i64> {
    match value {
        Value::Int(v) => Ok(*v),
        Value::Float(secs) => seconds_to_int(*secs, units_per_second),
        Value::Timestamp(dt) => datetime_to_int(dt, units_per_second),
        Value::LocalTimestamp(naive) => local_to_int(naive, units_per_second),
        other => Err(Error::InvalidTimestamp(format!(
            "unsupported date value type {}",
            other.type_name()
        ))),
    }
}

/// Convert an integer epoch back to the representation a property declares
pub fn int_to_date_value(epoch: i64, units_per_second: i64, repr: DateRepr) -> Result<Value> {
    match repr {
        DateRepr::Int => Ok(Value::Int(epoch)),
        DateRepr::Float => Ok(Value::Float(epoch as f64 / units_per_second as f64)),
        DateRepr::Timestamp => {
            let secs = epoch.div_euclid(units_per_second);
            let nanos = epoch.rem_euclid(units_per_second) * (NANOS_PER_SECOND / units_per_second);
            DateTime::from_timestamp(secs, nanos as u32)
                .map(Value::Timestamp)
                .ok_or_else(|| Error::InvalidTimestamp(format!("epoch {} out of range", epoch)))
        }
    }
}
