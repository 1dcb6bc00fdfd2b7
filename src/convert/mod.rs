//! # Type Converter
//!
//! Stateless conversion of raw header/path/query text into a typed field.
//!
//! | Kind | Accepted text |
//! |------|---------------|
//! | string | anything, assigned verbatim |
//! | bool | `1 t T TRUE true True 0 f F FALSE false False` |
//! | int8..int64 | base-10, optional sign, range-checked against the width |
//! | uint8..uint64 | base-10, no sign, range-checked against the width |
//! | float32/float64 | decimal or exponent notation; overflow of the width fails |
//! | timestamp | any layout of the process-wide [`TimeLayouts`](crate::time_layout::TimeLayouts) |
//! | duration | literals like `1h30m`, see [`parse_duration`] |
//!
//! Malformed input never panics; it yields a [`ConversionError`] naming the
//! value and the target kind.

mod duration;

pub use duration::{parse_duration, DurationError};

use crate::schema::{FieldKind, FieldSlot};
use crate::time_layout::{self, TimeError};

/// Why a value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionFailure {
    #[error("invalid syntax")]
    Syntax,
    #[error("value out of range")]
    Range,
    #[error(transparent)]
    Time(#[from] TimeError),
    #[error(transparent)]
    Duration(#[from] DurationError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("unsupported field type: {0}")]
    Unsupported(&'static str),

    #[error("cannot convert {value:?} to {kind}: {failure}")]
    Invalid {
        value: String,
        kind: FieldKind,
        failure: ConversionFailure,
    },
}

impl ConversionError {
    fn invalid(value: &str, kind: FieldKind, failure: ConversionFailure) -> Self {
        ConversionError::Invalid {
            value: value.to_string(),
            kind,
            failure,
        }
    }
}

/// Convert `raw` and store it in `slot`.
pub fn convert(raw: &str, slot: FieldSlot<'_>) -> Result<(), ConversionError> {
    let kind = slot.kind();
    let fail = |failure| ConversionError::invalid(raw, kind, failure);

    match slot {
        FieldSlot::Str(field) => {
            field.clear();
            field.push_str(raw);
        }
        FieldSlot::Bool(field) => *field = parse_bool(raw).map_err(fail)?,
        // Narrowing casts below are exact: parse_int/parse_uint range-check
        // against the field's width first.
        FieldSlot::I8(field) => *field = parse_int(raw, 8).map_err(fail)? as i8,
        FieldSlot::I16(field) => *field = parse_int(raw, 16).map_err(fail)? as i16,
        FieldSlot::I32(field) => *field = parse_int(raw, 32).map_err(fail)? as i32,
        FieldSlot::I64(field) => *field = parse_int(raw, 64).map_err(fail)?,
        FieldSlot::Isize(field) => *field = parse_int(raw, isize::BITS).map_err(fail)? as isize,
        FieldSlot::U8(field) => *field = parse_uint(raw, 8).map_err(fail)? as u8,
        FieldSlot::U16(field) => *field = parse_uint(raw, 16).map_err(fail)? as u16,
        FieldSlot::U32(field) => *field = parse_uint(raw, 32).map_err(fail)? as u32,
        FieldSlot::U64(field) => *field = parse_uint(raw, 64).map_err(fail)?,
        FieldSlot::Usize(field) => *field = parse_uint(raw, usize::BITS).map_err(fail)? as usize,
        FieldSlot::F32(field) => *field = parse_float(raw, 32).map_err(fail)? as f32,
        FieldSlot::F64(field) => *field = parse_float(raw, 64).map_err(fail)?,
        FieldSlot::Timestamp(field) => {
            *field = time_layout::parse_time(raw).map_err(|e| fail(e.into()))?;
        }
        FieldSlot::Duration(field) => {
            *field = parse_duration(raw).map_err(|e| fail(e.into()))?;
        }
        FieldSlot::Unsupported(type_name) => return Err(ConversionError::Unsupported(type_name)),
    }
    Ok(())
}

/// Boolean literals accepted by the converter.
pub fn parse_bool(raw: &str) -> Result<bool, ConversionFailure> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(ConversionFailure::Syntax),
    }
}

/// Signed base-10 integer that fits in `bits` bits.
pub fn parse_int(raw: &str, bits: u32) -> Result<i64, ConversionFailure> {
    let value: i64 = raw.parse().map_err(|e: std::num::ParseIntError| {
        use std::num::IntErrorKind;
        match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => ConversionFailure::Range,
            _ => ConversionFailure::Syntax,
        }
    })?;

    if bits < 64 {
        let max = (1i64 << (bits - 1)) - 1;
        let min = -(1i64 << (bits - 1));
        if value < min || value > max {
            return Err(ConversionFailure::Range);
        }
    }
    Ok(value)
}

/// Unsigned base-10 integer that fits in `bits` bits.
pub fn parse_uint(raw: &str, bits: u32) -> Result<u64, ConversionFailure> {
    // `u64::from_str` takes a leading `+`.
    if raw.starts_with(['+', '-']) {
        return Err(ConversionFailure::Syntax);
    }
    let value: u64 = raw.parse().map_err(|e: std::num::ParseIntError| {
        use std::num::IntErrorKind;
        match e.kind() {
            IntErrorKind::PosOverflow => ConversionFailure::Range,
            _ => ConversionFailure::Syntax,
        }
    })?;

    if bits < 64 && value > (1u64 << bits) - 1 {
        return Err(ConversionFailure::Range);
    }
    Ok(value)
}

/// Float that is finite in the `bits`-wide type unless the text itself spells
/// out an infinity.
pub fn parse_float(raw: &str, bits: u32) -> Result<f64, ConversionFailure> {
    let value: f64 = raw.parse().map_err(|_| ConversionFailure::Syntax)?;
    if value.is_finite() {
        let overflowed = if bits == 32 {
            (value as f32).is_infinite()
        } else {
            false
        };
        if overflowed {
            return Err(ConversionFailure::Range);
        }
    } else if !value.is_nan() && !spells_infinity(raw) {
        return Err(ConversionFailure::Range);
    }
    Ok(value)
}

fn spells_infinity(raw: &str) -> bool {
    let unsigned = raw.trim_start_matches(['+', '-']);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}
