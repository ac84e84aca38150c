use crate::metadata::Endianness;
use crate::value::MissingValue;

use super::byteorder::{numeric_bits, read_i16};

/// Distance from the nearest integer under which a double is exposed as an integer.
pub const EPSILON: f64 = 1e-14;
/// Positive values below this are treated as missing.
pub const NEAR_ZERO_MISSING: f64 = 1e-300;

// 2^63 as a double; every rounded value strictly below it fits in an i64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Numeric cell after the long-versus-double disambiguation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Missing(MissingValue),
    Short(i16),
    Integer(i64),
    Float(f64),
}

/// Decodes a numeric cell of `slice.len()` bytes.
#[must_use]
pub fn decode_numeric(slice: &[u8], endian: Endianness) -> Numeric {
    if slice.is_empty() {
        return Numeric::Missing(MissingValue::System);
    }
    if slice.len() == 1 {
        return Numeric::Short(i16::from(i8::from_ne_bytes([slice[0]])));
    }
    if slice.len() == 2 {
        return read_i16(endian, slice, 0)
            .map_or(Numeric::Missing(MissingValue::System), Numeric::Short);
    }
    classify_bits(numeric_bits(slice, endian))
}

/// Classifies the raw bits of a double, keeping the tag of special missing values.
#[must_use]
pub fn classify_bits(raw: u64) -> Numeric {
    let value = f64::from_bits(raw);
    if value.is_nan() {
        return Numeric::Missing(missing_from_bits(raw));
    }
    classify(value)
}

/// Applies the missing-value band and integer detection to a double.
#[must_use]
pub fn classify(value: f64) -> Numeric {
    if value.is_nan() || (value > 0.0 && value < NEAR_ZERO_MISSING) {
        return Numeric::Missing(MissingValue::System);
    }
    let rounded = value.round();
    if (value - rounded).abs() < EPSILON && (-I64_BOUND..I64_BOUND).contains(&rounded) {
        #[allow(clippy::cast_possible_truncation)]
        return Numeric::Integer(rounded as i64);
    }
    Numeric::Float(value)
}

const fn missing_from_bits(raw: u64) -> MissingValue {
    let upper = (raw >> 40) & 0xFF;
    let tag_byte = !(upper as u8);
    match tag_byte {
        0 => MissingValue::Tagged('_'),
        2..=27 => MissingValue::Tagged((b'A' + (tag_byte - 2)) as char),
        _ => MissingValue::System,
    }
}
