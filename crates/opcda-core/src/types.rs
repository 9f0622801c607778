// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core value, quality and handle types.
//!
//! Two value representations live side by side:
//!
//! - [`Variant`]: the provider-native tagged value (a COM `VARIANT` as seen
//!   through the protocol engine).
//! - [`Value`]: the caller-native value handed to event handlers and returned
//!   by `read`.
//!
//! Conversion between the two is the job of [`crate::codec`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Handles
// =============================================================================

/// Opaque provider handle identifying one provider connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientHandle(pub u32);

impl ClientHandle {
    /// Creates a new client handle.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Opaque provider handle identifying one monitoring group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupHandle(pub u32);

impl GroupHandle {
    /// Creates a new group handle.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// Unique identifier of a bridge session, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Creates a new time-ordered session id.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Value (caller-native)
// =============================================================================

/// Caller-native value.
///
/// This is what event handlers observe in `dataChange` payloads and what
/// `read` resolves with. `write` accepts the same type and rejects shapes the
/// provider cannot represent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Empty or null value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// 32-bit signed integer.
    Int32(i32),

    /// 64-bit signed integer.
    Int64(i64),

    /// Double precision float.
    Float64(f64),

    /// UTF-8 text.
    String(String),

    /// Date and time in UTC.
    DateTime(DateTime<Utc>),

    /// Array of values. Never produced by the codec; accepted only so that
    /// `write` can reject it explicitly.
    Array(Vec<Value>),

    /// Placeholder for a provider type the codec does not understand.
    Unsupported {
        /// Raw variant type tag reported by the provider.
        vt: u16,
    },
}

impl Value {
    /// Returns the type name of this value.
    ///
    /// # Examples
    ///
    /// ```
    /// use opcda_core::types::Value;
    ///
    /// assert_eq!(Value::Float64(1.0).type_name(), "float64");
    /// assert_eq!(Value::Bool(true).type_name(), "bool");
    /// ```
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::Array(_) => "array",
            Value::Unsupported { .. } => "unsupported",
        }
    }

    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` if this is the unsupported-type placeholder.
    #[inline]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Value::Unsupported { .. })
    }

    /// Attempts to get this value as a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to get this value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to get this value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to get this value as a string reference.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Array(v) => write!(f, "[{} elements]", v.len()),
            Value::Unsupported { vt } => write!(f, "<unsupported vt={}>", vt),
        }
    }
}

macro_rules! impl_from_for_value {
    ($variant:ident, $type:ty) => {
        impl From<$type> for Value {
            fn from(v: $type) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_from_for_value!(Bool, bool);
impl_from_for_value!(Int32, i32);
impl_from_for_value!(Int64, i64);
impl_from_for_value!(Float64, f64);
impl_from_for_value!(String, String);
impl_from_for_value!(DateTime, DateTime<Utc>);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

// =============================================================================
// Variant (provider-native)
// =============================================================================

/// COM variant type tags understood by the bridge.
pub mod vt {
    /// `VT_EMPTY`
    pub const EMPTY: u16 = 0;
    /// `VT_NULL`
    pub const NULL: u16 = 1;
    /// `VT_I2`
    pub const I2: u16 = 2;
    /// `VT_I4`
    pub const I4: u16 = 3;
    /// `VT_R4`
    pub const R4: u16 = 4;
    /// `VT_R8`
    pub const R8: u16 = 5;
    /// `VT_DATE`
    pub const DATE: u16 = 7;
    /// `VT_BSTR`
    pub const BSTR: u16 = 8;
    /// `VT_ERROR`
    pub const ERROR: u16 = 10;
    /// `VT_BOOL`
    pub const BOOL: u16 = 11;
    /// `VT_I1`
    pub const I1: u16 = 16;
    /// `VT_UI1`
    pub const UI1: u16 = 17;
    /// `VT_UI2`
    pub const UI2: u16 = 18;
    /// `VT_UI4`
    pub const UI4: u16 = 19;
    /// `VT_I8`
    pub const I8: u16 = 20;
    /// `VT_ARRAY` flag bit.
    pub const ARRAY: u16 = 0x2000;
}

/// Provider-native tagged value.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// `VT_EMPTY`.
    Empty,
    /// `VT_NULL`.
    Null,
    /// `VT_I1`.
    I1(i8),
    /// `VT_I2`.
    I2(i16),
    /// `VT_I4`.
    I4(i32),
    /// `VT_I8`.
    I8(i64),
    /// `VT_UI1`.
    UI1(u8),
    /// `VT_UI2`.
    UI2(u16),
    /// `VT_UI4`.
    UI4(u32),
    /// `VT_R4`.
    R4(f32),
    /// `VT_R8`.
    R8(f64),
    /// `VT_BOOL`.
    Bool(bool),
    /// `VT_BSTR`.
    Bstr(String),
    /// `VT_DATE`, as an OLE automation date (days since 1899-12-30).
    Date(f64),
    /// `VT_ERROR` carrying an `SCODE`.
    Error(i32),
    /// Any other tag (arrays, records, interfaces, ...).
    Other {
        /// Raw `VARTYPE`.
        vt: u16,
    },
}

impl Variant {
    /// Returns the `VARTYPE` tag of this variant.
    pub fn vt(&self) -> u16 {
        match self {
            Self::Empty => vt::EMPTY,
            Self::Null => vt::NULL,
            Self::I1(_) => vt::I1,
            Self::I2(_) => vt::I2,
            Self::I4(_) => vt::I4,
            Self::I8(_) => vt::I8,
            Self::UI1(_) => vt::UI1,
            Self::UI2(_) => vt::UI2,
            Self::UI4(_) => vt::UI4,
            Self::R4(_) => vt::R4,
            Self::R8(_) => vt::R8,
            Self::Bool(_) => vt::BOOL,
            Self::Bstr(_) => vt::BSTR,
            Self::Date(_) => vt::DATE,
            Self::Error(_) => vt::ERROR,
            Self::Other { vt } => *vt,
        }
    }

    /// Returns `true` for `VT_EMPTY` and `VT_NULL`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty | Self::Null)
    }
}

impl Default for Variant {
    fn default() -> Self {
        Self::Empty
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "VT_EMPTY"),
            Self::Null => write!(f, "VT_NULL"),
            Self::I1(v) => write!(f, "VT_I1({})", v),
            Self::I2(v) => write!(f, "VT_I2({})", v),
            Self::I4(v) => write!(f, "VT_I4({})", v),
            Self::I8(v) => write!(f, "VT_I8({})", v),
            Self::UI1(v) => write!(f, "VT_UI1({})", v),
            Self::UI2(v) => write!(f, "VT_UI2({})", v),
            Self::UI4(v) => write!(f, "VT_UI4({})", v),
            Self::R4(v) => write!(f, "VT_R4({})", v),
            Self::R8(v) => write!(f, "VT_R8({})", v),
            Self::Bool(v) => write!(f, "VT_BOOL({})", v),
            Self::Bstr(v) => write!(f, "VT_BSTR({:?})", v),
            Self::Date(v) => write!(f, "VT_DATE({})", v),
            Self::Error(v) => write!(f, "VT_ERROR(0x{:08X})", v),
            Self::Other { vt } => write!(f, "VT(0x{:04X})", vt),
        }
    }
}

// =============================================================================
// Quality
// =============================================================================

/// OPC DA item quality.
///
/// Only the quality and substatus bits of the 16-bit OPC quality word are
/// modelled; limit bits are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Good quality - value is usable.
    #[default]
    Good,

    /// Good with local override.
    GoodLocalOverride,

    /// Uncertain quality - value may be usable.
    Uncertain,

    /// Uncertain with last usable value.
    UncertainLastUsable,

    /// Uncertain with sensor not accurate.
    UncertainSensorNotAccurate,

    /// Bad quality - value should not be used.
    Bad,

    /// Bad: server configuration error.
    BadConfigError,

    /// Bad: the input is not logically connected to the source.
    BadNotConnected,

    /// Bad: device failure.
    BadDeviceFailure,

    /// Bad: sensor failure.
    BadSensorFailure,

    /// Bad: last known value, communication lost.
    BadLastKnownValue,

    /// Bad: communication failure.
    BadCommFailure,

    /// Bad: out of service.
    BadOutOfService,
}

impl Quality {
    /// Quality mask of the OPC quality word.
    pub const QUALITY_MASK: u16 = 0xC0;

    /// Quality + substatus mask.
    pub const STATUS_MASK: u16 = 0xFC;

    /// Creates quality from an OPC DA quality word.
    pub fn from_code(code: u16) -> Self {
        match code & Self::STATUS_MASK {
            0xC0 => Self::Good,
            0xD8 => Self::GoodLocalOverride,
            0x44 => Self::UncertainLastUsable,
            0x50 => Self::UncertainSensorNotAccurate,
            0x04 => Self::BadConfigError,
            0x08 => Self::BadNotConnected,
            0x0C => Self::BadDeviceFailure,
            0x10 => Self::BadSensorFailure,
            0x14 => Self::BadLastKnownValue,
            0x18 => Self::BadCommFailure,
            0x1C => Self::BadOutOfService,
            other => match other & Self::QUALITY_MASK {
                0xC0 => Self::Good,
                0x40 => Self::Uncertain,
                _ => Self::Bad,
            },
        }
    }

    /// Converts to an OPC DA quality word.
    pub fn to_code(&self) -> u16 {
        match self {
            Self::Good => 0xC0,
            Self::GoodLocalOverride => 0xD8,
            Self::Uncertain => 0x40,
            Self::UncertainLastUsable => 0x44,
            Self::UncertainSensorNotAccurate => 0x50,
            Self::Bad => 0x00,
            Self::BadConfigError => 0x04,
            Self::BadNotConnected => 0x08,
            Self::BadDeviceFailure => 0x0C,
            Self::BadSensorFailure => 0x10,
            Self::BadLastKnownValue => 0x14,
            Self::BadCommFailure => 0x18,
            Self::BadOutOfService => 0x1C,
        }
    }

    /// Returns `true` if the quality is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        matches!(self, Self::Good | Self::GoodLocalOverride)
    }

    /// Returns `true` if the quality is uncertain.
    #[inline]
    pub fn is_uncertain(&self) -> bool {
        matches!(
            self,
            Self::Uncertain | Self::UncertainLastUsable | Self::UncertainSensorNotAccurate
        )
    }

    /// Returns `true` if the quality is bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        !self.is_good() && !self.is_uncertain()
    }

    /// Returns `true` if the quality says the data source cannot be reached.
    #[inline]
    pub fn is_source_unreachable(&self) -> bool {
        matches!(self, Self::BadNotConnected | Self::BadCommFailure)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => write!(f, "Good"),
            Self::GoodLocalOverride => write!(f, "Good (Local Override)"),
            Self::Uncertain => write!(f, "Uncertain"),
            Self::UncertainLastUsable => write!(f, "Uncertain (Last Usable)"),
            Self::UncertainSensorNotAccurate => write!(f, "Uncertain (Sensor Not Accurate)"),
            Self::Bad => write!(f, "Bad"),
            Self::BadConfigError => write!(f, "Bad (Configuration Error)"),
            Self::BadNotConnected => write!(f, "Bad (Not Connected)"),
            Self::BadDeviceFailure => write!(f, "Bad (Device Failure)"),
            Self::BadSensorFailure => write!(f, "Bad (Sensor Failure)"),
            Self::BadLastKnownValue => write!(f, "Bad (Last Known Value)"),
            Self::BadCommFailure => write!(f, "Bad (Communication Failure)"),
            Self::BadOutOfService => write!(f, "Bad (Out of Service)"),
        }
    }
}

// =============================================================================
// HResult
// =============================================================================

/// A COM `HRESULT` as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HResult(pub i32);

impl HResult {
    /// `S_OK`.
    pub const S_OK: Self = Self(0);
    /// `S_FALSE`.
    pub const S_FALSE: Self = Self(1);
    /// `E_FAIL`.
    pub const E_FAIL: Self = Self(0x8000_4005_u32 as i32);
    /// `E_INVALIDARG`.
    pub const E_INVALIDARG: Self = Self(0x8007_0057_u32 as i32);
    /// `E_OUTOFMEMORY`.
    pub const E_OUTOFMEMORY: Self = Self(0x8007_000E_u32 as i32);
    /// `OPC_E_INVALIDHANDLE`.
    pub const OPC_E_INVALIDHANDLE: Self = Self(0xC004_0001_u32 as i32);
    /// `OPC_E_BADTYPE`.
    pub const OPC_E_BADTYPE: Self = Self(0xC004_0004_u32 as i32);
    /// `OPC_E_BADRIGHTS`.
    pub const OPC_E_BADRIGHTS: Self = Self(0xC004_0006_u32 as i32);
    /// `OPC_E_UNKNOWNITEMID`.
    pub const OPC_E_UNKNOWNITEMID: Self = Self(0xC004_0007_u32 as i32);
    /// `OPC_E_INVALIDITEMID`.
    pub const OPC_E_INVALIDITEMID: Self = Self(0xC004_0008_u32 as i32);
    /// `OPC_E_DUPLICATENAME`.
    pub const OPC_E_DUPLICATENAME: Self = Self(0xC004_000C_u32 as i32);
    /// `RPC_S_SERVER_UNAVAILABLE` as an `HRESULT`.
    pub const RPC_S_SERVER_UNAVAILABLE: Self = Self(0x8007_06BA_u32 as i32);
    /// `RPC_E_DISCONNECTED`.
    pub const RPC_E_DISCONNECTED: Self = Self(0x8001_0108_u32 as i32);

    /// Returns `true` if the severity bit is set.
    #[inline]
    pub const fn is_failure(&self) -> bool {
        self.0 < 0
    }

    /// Returns `true` if the code signals success.
    #[inline]
    pub const fn is_success(&self) -> bool {
        self.0 >= 0
    }

    /// Returns the code as an unsigned 32-bit value.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0 as u32
    }

    /// Returns a human-readable description of well-known codes.
    pub fn describe(&self) -> String {
        let known = match *self {
            Self::S_OK => Some("The operation completed successfully"),
            Self::S_FALSE => Some("The operation completed with warnings"),
            Self::E_FAIL => Some("Unspecified failure"),
            Self::E_INVALIDARG => Some("An argument was invalid"),
            Self::E_OUTOFMEMORY => Some("The server ran out of memory"),
            Self::OPC_E_INVALIDHANDLE => Some("The handle is not valid"),
            Self::OPC_E_BADTYPE => Some("The server cannot convert the data type"),
            Self::OPC_E_BADRIGHTS => Some("The item is not readable or writable"),
            Self::OPC_E_UNKNOWNITEMID => Some("The item ID is not defined in the server"),
            Self::OPC_E_INVALIDITEMID => Some("The item ID does not conform to the server syntax"),
            Self::OPC_E_DUPLICATENAME => Some("Duplicate name not allowed"),
            Self::RPC_S_SERVER_UNAVAILABLE => Some("The RPC server is unavailable"),
            Self::RPC_E_DISCONNECTED => Some("The object invoked has disconnected from its clients"),
            _ => None,
        };

        match known {
            Some(text) => format!("{} (0x{:08X})", text, self.as_u32()),
            None => format!("HRESULT 0x{:08X}", self.as_u32()),
        }
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.as_u32())
    }
}

// =============================================================================
// ItemState
// =============================================================================

/// Value, quality and timestamp reported by the provider for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemState {
    /// Provider-native value.
    pub value: Variant,

    /// Raw OPC quality word.
    pub quality: u16,

    /// Source timestamp.
    pub timestamp: DateTime<Utc>,
}

impl ItemState {
    /// Creates a good-quality item state stamped now.
    pub fn good(value: Variant) -> Self {
        Self {
            value,
            quality: Quality::Good.to_code(),
            timestamp: Utc::now(),
        }
    }

    /// Creates an item state with an explicit quality, stamped now.
    pub fn with_quality(value: Variant, quality: Quality) -> Self {
        Self {
            value,
            quality: quality.to_code(),
            timestamp: Utc::now(),
        }
    }

    /// Returns the decoded quality.
    #[inline]
    pub fn quality(&self) -> Quality {
        Quality::from_code(self.quality)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Int32(1).type_name(), "int32");
        assert_eq!(Value::Unsupported { vt: 0x2003 }.type_name(), "unsupported");
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int32(42).as_i64(), Some(42));
        assert_eq!(Value::Int32(42).as_f64(), Some(42.0));
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert_eq!(Value::from("tag").as_str(), Some("tag"));
        assert!(Value::String("x".into()).as_f64().is_none());
    }

    #[test]
    fn test_value_serde_shape() {
        let json = serde_json::to_value(Value::Int32(7)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "int32", "value": 7}));
    }

    #[test]
    fn test_variant_vt() {
        assert_eq!(Variant::I4(1).vt(), vt::I4);
        assert_eq!(Variant::Bstr("a".into()).vt(), vt::BSTR);
        assert_eq!(Variant::Other { vt: 0x2005 }.vt(), 0x2005);
        assert!(Variant::Null.is_empty());
    }

    #[test]
    fn test_quality_codes() {
        assert_eq!(Quality::from_code(0xC0), Quality::Good);
        assert_eq!(Quality::from_code(0xC3), Quality::Good);
        assert_eq!(Quality::from_code(0x08), Quality::BadNotConnected);
        assert_eq!(Quality::from_code(0x18), Quality::BadCommFailure);
        assert_eq!(Quality::from_code(0x48), Quality::Uncertain);
        assert_eq!(Quality::from_code(0x20), Quality::Bad);

        for q in [Quality::GoodLocalOverride, Quality::BadOutOfService, Quality::UncertainLastUsable] {
            assert_eq!(Quality::from_code(q.to_code()), q);
        }
    }

    #[test]
    fn test_quality_classes() {
        assert!(Quality::Good.is_good());
        assert!(Quality::UncertainLastUsable.is_uncertain());
        assert!(Quality::BadDeviceFailure.is_bad());
        assert!(Quality::BadNotConnected.is_source_unreachable());
        assert!(!Quality::BadSensorFailure.is_source_unreachable());
    }

    #[test]
    fn test_hresult() {
        assert!(HResult::S_OK.is_success());
        assert!(HResult::E_FAIL.is_failure());
        assert_eq!(HResult::E_FAIL.to_string(), "0x80004005");
        assert!(HResult::OPC_E_UNKNOWNITEMID.describe().contains("not defined"));
        assert!(HResult(0x8123_4567_u32 as i32).describe().starts_with("HRESULT"));
    }

    #[test]
    fn test_handles_display() {
        assert_eq!(ClientHandle::new(3).to_string(), "client-3");
        assert_eq!(GroupHandle::new(9).to_string(), "group-9");
    }
}
