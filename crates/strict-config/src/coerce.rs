// crates/strict-config/src/coerce.rs
// ============================================================================
// Module: Value Coercion
// Description: Canonical string conversion for scalar configuration inputs.
// Purpose: Give every source the same string representation of a value.
// Dependencies: serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! Every configuration value is stored as a string or as absent. Booleans
//! become `"true"`/`"false"`, numbers become their canonical text, and null
//! becomes absent. Composite values (sequences and mappings) are rejected.
//!
//! Treating everything as a string trades native types for identical behavior
//! across environment variables, YAML files, and in-memory maps.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::error::RegistryError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Lower-case spellings classified as true.
pub const TRUTHY_VALUES: [&str; 4] = ["on", "1", "yes", "true"];

// ============================================================================
// SECTION: Raw Values
// ============================================================================

/// Scalar input prior to coercion.
///
/// # Invariants
/// - `Sequence` and `Mapping` only mark composite inputs; they never coerce.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Null or missing value.
    Null,
    /// Native boolean.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// String value, kept verbatim.
    String(String),
    /// Composite sequence (unsupported).
    Sequence,
    /// Composite mapping (unsupported).
    Mapping,
}

impl RawValue {
    /// Returns a stable label for the value kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for RawValue {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for RawValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

/// Implements lossless integer conversions into [`RawValue::Integer`].
macro_rules! raw_from_small_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for RawValue {
                fn from(value: $ty) -> Self {
                    Self::Integer(i64::from(value))
                }
            }
        )*
    };
}

raw_from_small_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for RawValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::String(value.to_string()), Self::Integer)
    }
}

impl From<usize> for RawValue {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::String(value.to_string()), Self::Integer)
    }
}

impl<T: Into<Self>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<serde_yaml::Value> for RawValue {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Self::Null,
            serde_yaml::Value::Bool(flag) => Self::Bool(flag),
            serde_yaml::Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Self::Integer(int)
                } else if number.is_u64() {
                    Self::String(number.to_string())
                } else {
                    number.as_f64().map_or_else(|| Self::String(number.to_string()), Self::Float)
                }
            }
            serde_yaml::Value::String(text) => Self::String(text),
            serde_yaml::Value::Sequence(_) => Self::Sequence,
            serde_yaml::Value::Mapping(_) => Self::Mapping,
            serde_yaml::Value::Tagged(tagged) => Self::from(tagged.value),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Composite value rejected by [`coerce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} values are not supported")]
pub struct UnsupportedValue {
    /// Kind of the rejected value.
    pub kind: &'static str,
}

impl UnsupportedValue {
    /// Attaches the destination key, producing a registry error.
    #[must_use]
    pub fn for_key(self, key: &str) -> RegistryError {
        RegistryError::UnsupportedType {
            key: key.to_string(),
            kind: self.kind,
        }
    }
}

// ============================================================================
// SECTION: Coercion
// ============================================================================

/// Converts a raw scalar into its canonical string form.
///
/// Returns `Ok(None)` for null.
///
/// # Errors
///
/// Returns [`UnsupportedValue`] for sequences and mappings.
pub fn coerce(raw: RawValue) -> Result<Option<String>, UnsupportedValue> {
    match raw {
        RawValue::Null => Ok(None),
        RawValue::Bool(flag) => Ok(Some(flag.to_string())),
        RawValue::Integer(int) => Ok(Some(int.to_string())),
        RawValue::Float(float) => Ok(Some(format_float(float))),
        RawValue::String(text) => Ok(Some(text)),
        RawValue::Sequence => Err(UnsupportedValue {
            kind: "sequence",
        }),
        RawValue::Mapping => Err(UnsupportedValue {
            kind: "mapping",
        }),
    }
}

/// Coerces a value bound for `key`, mapping rejections to [`RegistryError`].
pub(crate) fn coerce_for(key: &str, raw: RawValue) -> Result<Option<String>, RegistryError> {
    coerce(raw).map_err(|err| err.for_key(key))
}

/// Returns true when the value is one of `on`, `1`, `yes`, `true` (any case).
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    TRUTHY_VALUES.iter().any(|candidate| value.eq_ignore_ascii_case(candidate))
}

/// Returns true when the value is absent or not truthy.
#[must_use]
pub fn is_falsy(value: Option<&str>) -> bool {
    value.is_none_or(|text| !is_truthy(text))
}

/// Formats a float so integral values keep a fractional digit.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value.is_sign_positive() { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e16 {
        return format!("{value:.1}");
    }
    value.to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
