//! Temporal conversions in exact integer arithmetic, plus the canonical
//! string forms of `Edm.DateTimeOffset` and `Edm.Duration`.
//!
//! Sub-unit precision is truncated, never rounded.

use arrow::datatypes::TimeUnit;
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Timelike, Utc};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use crate::decimal;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const SECONDS_PER_DAY: u32 = 86_400;

fn units_per_second(unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Second => 1,
        TimeUnit::Millisecond => 1_000,
        TimeUnit::Microsecond => 1_000_000,
        TimeUnit::Nanosecond => NANOS_PER_SECOND,
    }
}

/// Instant as a count of `unit` since the epoch; `None` on overflow.
pub fn instant_to_unit(instant: DateTime<Utc>, unit: TimeUnit) -> Option<i64> {
    let per_second = units_per_second(unit);
    // subsec_nanos can exceed 1e9 only inside a leap second.
    let nanos = i64::from(instant.timestamp_subsec_nanos()).min(NANOS_PER_SECOND - 1);
    instant
        .timestamp()
        .checked_mul(per_second)?
        .checked_add(nanos / (NANOS_PER_SECOND / per_second))
}

/// Epoch milliseconds (or milliseconds of day) re-expressed in `unit`.
pub fn millis_to_unit(millis: i64, unit: TimeUnit) -> Option<i64> {
    match unit {
        TimeUnit::Second => Some(millis.div_euclid(1_000)),
        TimeUnit::Millisecond => Some(millis),
        TimeUnit::Microsecond => millis.checked_mul(1_000),
        TimeUnit::Nanosecond => millis.checked_mul(1_000_000),
    }
}

pub fn nanos_of_day(time: NaiveTime) -> i64 {
    let nanos = i64::from(time.nanosecond()).min(NANOS_PER_SECOND - 1);
    i64::from(time.num_seconds_from_midnight()) * NANOS_PER_SECOND + nanos
}

/// Time of day as a count of `unit` since midnight.
pub fn time_to_unit(time: NaiveTime, unit: TimeUnit) -> i64 {
    nanos_of_day(time) / (NANOS_PER_SECOND / units_per_second(unit))
}

/// `yyyy-MM-ddTHH:mm:ss[.fraction]` followed by `Z` or `±HH:MM`.
pub fn format_date_time_offset(value: &DateTime<FixedOffset>) -> String {
    let mut out = value.format("%Y-%m-%dT%H:%M:%S").to_string();
    let nanos = value.nanosecond() % NANOS_PER_SECOND as u32;
    if nanos != 0 {
        let fraction = format!("{nanos:09}");
        out.push('.');
        out.push_str(fraction.trim_end_matches('0'));
    }
    let offset = value.offset().fix().local_minus_utc();
    if offset == 0 {
        out.push('Z');
    } else {
        let sign = if offset < 0 { '-' } else { '+' };
        let minutes = offset.unsigned_abs() / 60;
        out.push_str(&format!("{sign}{:02}:{:02}", minutes / 60, minutes % 60));
    }
    out
}

/// ISO-8601 duration of `seconds`, e.g. `P1DT2H3M4.5S`. Days, hours and
/// minutes appear only when non-zero; seconds always do.
pub fn format_duration(seconds: &BigDecimal) -> String {
    let mut out = String::new();
    if seconds.is_negative() {
        out.push('-');
    }
    out.push('P');

    let (whole, fraction) = decimal::split_integer(seconds);
    let mut whole = whole.abs();
    let day = BigInt::from(SECONDS_PER_DAY);
    let days = &whole / &day;
    if !days.is_zero() {
        out.push_str(&format!("{days}D"));
    }
    whole %= &day;
    out.push('T');

    let hours = &whole / 3_600u32;
    if !hours.is_zero() {
        out.push_str(&format!("{hours}H"));
    }
    let minutes = (&whole % 3_600u32) / 60u32;
    if !minutes.is_zero() {
        out.push_str(&format!("{minutes}M"));
    }
    let secs = whole % 60u32;
    let remaining = BigDecimal::new(secs, 0) + fraction.abs();
    out.push_str(&format!("{}S", decimal::to_plain_string(&remaining)));
    out
}
