use std::borrow::Cow;

use time::{Date, Duration, OffsetDateTime};

/// Represents a single cell value produced by the SAS reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// Numeric cell stored in two bytes or fewer.
    Int16(i16),
    /// Numeric cell whose double value sits on an integer.
    Int64(i64),
    /// Any other numeric cell.
    Float(f64),
    /// Character cell decoded from the file encoding.
    Str(Cow<'a, str>),
    /// Character cell returned as raw trimmed bytes.
    Bytes(Cow<'a, [u8]>),
    /// SAS date value.
    Date(Date),
    /// SAS datetime value mapped to UTC.
    DateTime(OffsetDateTime),
    /// SAS time value represented as duration since midnight.
    Time(Duration),
    /// Missing value with additional context.
    Missing(MissingValue),
}

impl Value<'_> {
    #[must_use]
    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Int16(v) => Value::Int16(v),
            Value::Int64(v) => Value::Int64(v),
            Value::Float(v) => Value::Float(v),
            Value::Str(s) => Value::Str(Cow::Owned(s.into_owned())),
            Value::Bytes(bytes) => Value::Bytes(Cow::Owned(bytes.into_owned())),
            Value::Date(date) => Value::Date(date),
            Value::DateTime(dt) => Value::DateTime(dt),
            Value::Time(duration) => Value::Time(duration),
            Value::Missing(missing) => Value::Missing(missing),
        }
    }

    /// Returns `true` for every flavour of missing value.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Value::Missing(_))
    }
}

/// Variants of missing values encountered in SAS datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingValue {
    /// System missing represented by `.` in SAS.
    System,
    /// Special missing value `.A`-`.Z` or `._`.
    Tagged(char),
}
