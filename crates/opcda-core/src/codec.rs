// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value codec between provider variants and caller values.
//!
//! Provider to caller conversion ([`to_value`]) is total: every variant maps
//! to some [`Value`], with [`Value::Unsupported`] standing in for tags the
//! bridge does not understand.
//!
//! Caller to provider conversion ([`to_variant`]) is partial and rejects
//! shapes the provider cannot store, before any provider call is made.
//!
//! | Variant              | Value                  |
//! |----------------------|------------------------|
//! | `VT_EMPTY`/`VT_NULL` | `Null`                 |
//! | `VT_I1/I2/I4/UI1/UI2`| `Int32`                |
//! | `VT_UI4`/`VT_I8`     | `Int64`                |
//! | `VT_R4`/`VT_R8`      | `Float64`              |
//! | `VT_BOOL`            | `Bool`                 |
//! | `VT_BSTR`            | `String`               |
//! | `VT_DATE`            | `DateTime` (ms)        |
//! | anything else        | `Unsupported { vt }`   |

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use crate::types::{vt, Value, Variant};

/// OLE automation epoch (1899-12-30T00:00:00Z) in Unix milliseconds.
const OLE_EPOCH_UNIX_MS: i64 = -2_209_161_600_000;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Smallest OLE date the provider accepts (0100-01-01).
const OLE_MIN: f64 = -657_434.0;

/// Largest OLE date the provider accepts (9999-12-31T23:59:59.999).
const OLE_MAX: f64 = 2_958_466.0;

// =============================================================================
// CodecError
// =============================================================================

/// Errors raised when a caller value cannot be stored by the provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// The value's shape has no provider representation.
    #[error("Unsupported value shape for write: {type_name}")]
    UnsupportedShape {
        /// Caller type name.
        type_name: &'static str,
    },

    /// The date lies outside the provider's date range.
    #[error("Date out of range: {value}")]
    DateOutOfRange {
        /// Offending date in RFC 3339.
        value: String,
    },
}

// =============================================================================
// Provider -> Caller
// =============================================================================

/// Converts a provider variant into a caller value.
///
/// # Examples
///
/// ```
/// use opcda_core::codec::to_value;
/// use opcda_core::types::{Value, Variant};
///
/// assert_eq!(to_value(&Variant::I4(42)), Value::Int32(42));
/// assert_eq!(to_value(&Variant::Other { vt: 0x2003 }), Value::Unsupported { vt: 0x2003 });
/// ```
pub fn to_value(variant: &Variant) -> Value {
    match variant {
        Variant::Empty | Variant::Null => Value::Null,
        Variant::I1(v) => Value::Int32(i32::from(*v)),
        Variant::I2(v) => Value::Int32(i32::from(*v)),
        Variant::I4(v) => Value::Int32(*v),
        Variant::UI1(v) => Value::Int32(i32::from(*v)),
        Variant::UI2(v) => Value::Int32(i32::from(*v)),
        Variant::UI4(v) => Value::Int64(i64::from(*v)),
        Variant::I8(v) => Value::Int64(*v),
        Variant::R4(v) => Value::Float64(f64::from(*v)),
        Variant::R8(v) => Value::Float64(*v),
        Variant::Bool(v) => Value::Bool(*v),
        Variant::Bstr(v) => Value::String(v.clone()),
        Variant::Date(ole) => match ole_to_datetime(*ole) {
            Some(dt) => Value::DateTime(dt),
            None => Value::Unsupported { vt: vt::DATE },
        },
        Variant::Error(_) => Value::Unsupported { vt: vt::ERROR },
        Variant::Other { vt } => Value::Unsupported { vt: *vt },
    }
}

// =============================================================================
// Caller -> Provider
// =============================================================================

/// Converts a caller value into a provider variant.
///
/// Arrays and unsupported placeholders are rejected.
pub fn to_variant(value: &Value) -> Result<Variant, CodecError> {
    match value {
        Value::Null => Ok(Variant::Empty),
        Value::Bool(v) => Ok(Variant::Bool(*v)),
        Value::Int32(v) => Ok(Variant::I4(*v)),
        Value::Int64(v) => Ok(Variant::I8(*v)),
        Value::Float64(v) => Ok(Variant::R8(*v)),
        Value::String(v) => Ok(Variant::Bstr(v.clone())),
        Value::DateTime(dt) => datetime_to_ole(dt)
            .map(Variant::Date)
            .ok_or_else(|| CodecError::DateOutOfRange {
                value: dt.to_rfc3339(),
            }),
        Value::Array(_) | Value::Unsupported { .. } => Err(CodecError::UnsupportedShape {
            type_name: value.type_name(),
        }),
    }
}

// =============================================================================
// OLE Automation Dates
// =============================================================================

/// Converts an OLE automation date to UTC with millisecond precision.
///
/// Negative dates carry the time of day as a positive fraction, so `-1.25`
/// is 1899-12-29T06:00:00Z.
pub fn ole_to_datetime(ole: f64) -> Option<DateTime<Utc>> {
    if !ole.is_finite() || !(OLE_MIN..OLE_MAX).contains(&ole) {
        return None;
    }

    let days = ole.trunc();
    let fraction = (ole - days).abs();
    let offset_ms = (days * MS_PER_DAY + fraction * MS_PER_DAY).round() as i64;

    Utc.timestamp_millis_opt(OLE_EPOCH_UNIX_MS + offset_ms).single()
}

/// Converts a UTC date-time to an OLE automation date, truncating to
/// milliseconds.
pub fn datetime_to_ole(dt: &DateTime<Utc>) -> Option<f64> {
    let offset_ms = dt.timestamp_millis() - OLE_EPOCH_UNIX_MS;
    let day_ms = MS_PER_DAY as i64;
    let days = offset_ms.div_euclid(day_ms);
    let rem = offset_ms.rem_euclid(day_ms) as f64 / MS_PER_DAY;

    let ole = if days >= 0 {
        days as f64 + rem
    } else {
        days as f64 - rem
    };

    (OLE_MIN..OLE_MAX).contains(&ole).then_some(ole)
}

// =============================================================================
// Tests
// =============================================================================
