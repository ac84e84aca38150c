//! Conversion of numeric cells carrying a SAS date, datetime or time format.
//!
//! SAS stores dates as days and datetimes as seconds since 1960-01-01, and
//! times as seconds since midnight. The row decoder asks a [`DateFormatter`]
//! to turn such a number into a calendar value whenever the column's format
//! name is one of the known temporal formats.

use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time};

use crate::metadata::ColumnFormat;
use crate::value::Value;

const SECONDS_PER_DAY: f64 = 86_400.0;

const DATE_FORMATS: &[&str] = &[
    "DATE", "DAY", "DDMMYY", "DDMMYYB", "DDMMYYC", "DDMMYYD", "DDMMYYN", "DDMMYYP", "DDMMYYS",
    "DOWNAME", "E8601DA", "B8601DA", "JULDAY", "JULIAN", "MMDDYY", "MMDDYYB", "MMDDYYC", "MMDDYYD",
    "MMDDYYN", "MMDDYYP", "MMDDYYS", "MMYY", "MMYYC", "MMYYD", "MMYYN", "MMYYP", "MMYYS", "MONNAME",
    "MONTH", "MONYY", "NLDATE", "QTR", "QTRR", "WEEKDATE", "WEEKDATX", "WEEKDAY", "WORDDATE",
    "WORDDATX", "YEAR", "YYMM", "YYMMC", "YYMMD", "YYMMN", "YYMMP", "YYMMS", "YYMMDD", "YYMMDDB",
    "YYMMDDC", "YYMMDDD", "YYMMDDN", "YYMMDDP", "YYMMDDS", "YYMON", "YYQ", "YYQC", "YYQD", "YYQN",
    "YYQP", "YYQS", "YYQR", "MINGUO",
];

const DATETIME_FORMATS: &[&str] = &[
    "DATETIME", "DATEAMPM", "DTDATE", "DTMONYY", "DTWKDATX", "DTYEAR", "DTYYQC", "E8601DT",
    "E8601DZ", "B8601DT", "B8601DZ", "MDYAMPM", "NLDATM",
];

const TIME_FORMATS: &[&str] = &[
    "TIME", "TIMEAMPM", "TOD", "HHMM", "HOUR", "MMSS", "E8601TM", "E8601TZ", "B8601TM", "B8601TZ",
    "NLTIME",
];

/// Temporal interpretation of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    /// Days since the SAS epoch.
    Date,
    /// Seconds since the SAS epoch.
    DateTime,
    /// Seconds since midnight.
    Time,
}

/// Maps a format name such as `date9.` or `DATETIME` to its temporal kind.
#[must_use]
pub fn temporal_kind(format_name: &str) -> Option<TemporalKind> {
    let cleaned = format_name.trim().trim_end_matches('.').to_ascii_uppercase();
    if cleaned.is_empty() {
        return None;
    }
    let name = cleaned.as_str();
    if DATE_FORMATS.contains(&name) {
        Some(TemporalKind::Date)
    } else if DATETIME_FORMATS.contains(&name) {
        Some(TemporalKind::DateTime)
    } else if TIME_FORMATS.contains(&name) {
        Some(TemporalKind::Time)
    } else {
        None
    }
}

/// Converts a raw temporal number into a cell value.
///
/// Returning `None` makes the decoder fall back to the plain numeric value.
pub trait DateFormatter {
    fn format(&self, value: f64, format: &ColumnFormat, kind: TemporalKind)
    -> Option<Value<'static>>;
}

/// Default formatter producing `time` values anchored at 1960-01-01 UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SasEpochFormatter;

impl DateFormatter for SasEpochFormatter {
    fn format(
        &self,
        value: f64,
        _format: &ColumnFormat,
        kind: TemporalKind,
    ) -> Option<Value<'static>> {
        match kind {
            TemporalKind::Date => sas_days_to_date(value).map(Value::Date),
            TemporalKind::DateTime => sas_seconds_to_datetime(value).map(Value::DateTime),
            TemporalKind::Time => sas_seconds_to_time(value).map(Value::Time),
        }
    }
}

const fn sas_epoch() -> PrimitiveDateTime {
    // 1960-01-01 is a valid calendar date; the fallback is never taken.
    let date = match Date::from_calendar_date(1960, Month::January, 1) {
        Ok(date) => date,
        Err(_) => Date::MIN,
    };
    PrimitiveDateTime::new(date, Time::MIDNIGHT)
}

fn sas_offset_datetime(seconds: f64) -> Option<OffsetDateTime> {
    if !seconds.is_finite() {
        return None;
    }
    let duration = Duration::checked_seconds_f64(seconds)?;
    sas_epoch()
        .checked_add(duration)
        .map(PrimitiveDateTime::assume_utc)
}

#[must_use]
pub fn sas_days_to_date(days: f64) -> Option<Date> {
    sas_offset_datetime(days.floor() * SECONDS_PER_DAY).map(OffsetDateTime::date)
}

#[must_use]
pub fn sas_seconds_to_datetime(seconds: f64) -> Option<OffsetDateTime> {
    sas_offset_datetime(seconds)
}

#[must_use]
pub fn sas_seconds_to_time(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() {
        return None;
    }
    Duration::checked_seconds_f64(seconds)
}
