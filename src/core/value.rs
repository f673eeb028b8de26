//! Database value types
//!
//! This module defines the canonical value envelope carried by query
//! parameters and result rows, and the single conversion path into it.

use super::error::{DatabaseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Database value that can hold different types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatabaseValue {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// String value
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Timestamp (Unix timestamp in microseconds)
    Timestamp(i64),
}

impl DatabaseValue {
    /// Read an integral value
    ///
    /// Integers and timestamps are returned as is and text is parsed;
    /// floating point values are not truncated.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            DatabaseValue::Long(v) | DatabaseValue::Timestamp(v) => Some(*v),
            DatabaseValue::Int(v) => Some(i64::from(*v)),
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Render the value as text for display
    pub fn as_string(&self) -> String {
        match self {
            DatabaseValue::Null => "null".to_string(),
            DatabaseValue::Bool(v) => v.to_string(),
            DatabaseValue::Int(v) => v.to_string(),
            DatabaseValue::Long(v) => v.to_string(),
            DatabaseValue::Float(v) => v.to_string(),
            DatabaseValue::Double(v) => v.to_string(),
            DatabaseValue::String(s) => s.clone(),
            DatabaseValue::Bytes(b) => format!("<{} bytes>", b.len()),
            DatabaseValue::Timestamp(v) => v.to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }
}

/// A row of database results (column name -> value mapping)
pub type DatabaseRow = HashMap<String, DatabaseValue>;

/// Normalization of a Rust value into a [`DatabaseValue`]
///
/// Implementations must either produce a value that every backend can bind
/// or fail with [`DatabaseError::ConversionFailed`]. They never coerce
/// silently into a different domain (an out-of-range `u64` is an error, not
/// a truncated `i64`).
pub trait ToDbValue {
    /// Convert `self` into the canonical database representation
    fn to_db_value(&self) -> Result<DatabaseValue>;
}

/// Convert any supported value into a [`DatabaseValue`]
///
/// This is the only conversion entry point used when parameter descriptors
/// are created.
pub fn convert_value<T: ToDbValue + ?Sized>(value: &T) -> Result<DatabaseValue> {
    value.to_db_value()
}

impl ToDbValue for DatabaseValue {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        Ok(self.clone())
    }
}

impl<T: ToDbValue + ?Sized> ToDbValue for &T {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        (**self).to_db_value()
    }
}

impl<T: ToDbValue> ToDbValue for Option<T> {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        match self {
            Some(value) => value.to_db_value(),
            None => Ok(DatabaseValue::Null),
        }
    }
}

impl ToDbValue for bool {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        Ok(DatabaseValue::Bool(*self))
    }
}

macro_rules! lossless_int {
    ($($ty:ty => $variant:ident($target:ty)),* $(,)?) => {
        $(
            impl ToDbValue for $ty {
                fn to_db_value(&self) -> Result<DatabaseValue> {
                    Ok(DatabaseValue::$variant(<$target>::from(*self)))
                }
            }
        )*
    };
}

lossless_int! {
    i8 => Int(i32),
    i16 => Int(i32),
    i32 => Int(i32),
    u8 => Int(i32),
    u16 => Int(i32),
    i64 => Long(i64),
    u32 => Long(i64),
}

macro_rules! checked_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToDbValue for $ty {
                fn to_db_value(&self) -> Result<DatabaseValue> {
                    i64::try_from(*self).map(DatabaseValue::Long).map_err(|_| {
                        DatabaseError::conversion(
                            stringify!($ty),
                            format!("{} does not fit in a signed 64-bit integer", self),
                        )
                    })
                }
            }
        )*
    };
}

checked_int!(u64, usize, isize, i128, u128);

impl ToDbValue for f32 {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        Ok(DatabaseValue::Float(*self))
    }
}

impl ToDbValue for f64 {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        Ok(DatabaseValue::Double(*self))
    }
}

impl ToDbValue for char {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        Ok(DatabaseValue::String(self.to_string()))
    }
}

impl ToDbValue for str {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        Ok(DatabaseValue::String(self.to_string()))
    }
}

impl ToDbValue for String {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        Ok(DatabaseValue::String(self.clone()))
    }
}

impl ToDbValue for [u8] {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        Ok(DatabaseValue::Bytes(self.to_vec()))
    }
}

impl ToDbValue for Vec<u8> {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        Ok(DatabaseValue::Bytes(self.clone()))
    }
}

impl<Tz: chrono::TimeZone> ToDbValue for chrono::DateTime<Tz> {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        Ok(DatabaseValue::Timestamp(self.timestamp_micros()))
    }
}

impl ToDbValue for chrono::NaiveDateTime {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        Ok(DatabaseValue::Timestamp(self.and_utc().timestamp_micros()))
    }
}

impl ToDbValue for chrono::NaiveDate {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        self.and_hms_opt(0, 0, 0)
            .ok_or_else(|| DatabaseError::conversion("NaiveDate", "date has no midnight"))?
            .to_db_value()
    }
}

/// JSON scalars map onto the matching variant; arrays and objects are stored
/// as their JSON text.
impl ToDbValue for serde_json::Value {
    fn to_db_value(&self) -> Result<DatabaseValue> {
        use serde_json::Value;

        match self {
            Value::Null => Ok(DatabaseValue::Null),
            Value::Bool(v) => Ok(DatabaseValue::Bool(*v)),
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(DatabaseValue::Long(v))
                } else if n.is_u64() {
                    Err(DatabaseError::conversion(
                        "serde_json::Number",
                        format!("{} does not fit in a signed 64-bit integer", n),
                    ))
                } else {
                    n.as_f64().map(DatabaseValue::Double).ok_or_else(|| {
                        DatabaseError::conversion(
                            "serde_json::Number",
                            format!("{} is not representable", n),
                        )
                    })
                }
            }
            Value::String(s) => Ok(DatabaseValue::String(s.clone())),
            Value::Array(_) | Value::Object(_) => Ok(DatabaseValue::String(self.to_string())),
        }
    }
}
