//! Declared parameter types and directions
//!
//! This module defines the optional type a caller can declare for a query
//! parameter, and the direction in which the parameter value flows.

use super::value::DatabaseValue;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Declared database type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DbType {
    /// Boolean flag
    Boolean = 1,
    /// 32-bit integer
    Int32 = 2,
    /// 64-bit integer
    Int64 = 3,
    /// Single precision floating point
    Single = 4,
    /// Double precision floating point
    Double = 5,
    /// Character data
    String = 6,
    /// Binary data
    Binary = 7,
    /// Point in time (microsecond precision)
    DateTime = 8,
}

impl DbType {
    /// Convert the declared type to its string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            DbType::Boolean => "boolean",
            DbType::Int32 => "int32",
            DbType::Int64 => "int64",
            DbType::Single => "single",
            DbType::Double => "double",
            DbType::String => "string",
            DbType::Binary => "binary",
            DbType::DateTime => "datetime",
        }
    }

    /// Infer the declared type matching a value, `None` for `Null`
    pub fn infer(value: &DatabaseValue) -> Option<Self> {
        match value {
            DatabaseValue::Null => None,
            DatabaseValue::Bool(_) => Some(DbType::Boolean),
            DatabaseValue::Int(_) => Some(DbType::Int32),
            DatabaseValue::Long(_) => Some(DbType::Int64),
            DatabaseValue::Float(_) => Some(DbType::Single),
            DatabaseValue::Double(_) => Some(DbType::Double),
            DatabaseValue::String(_) => Some(DbType::String),
            DatabaseValue::Bytes(_) => Some(DbType::Binary),
            DatabaseValue::Timestamp(_) => Some(DbType::DateTime),
        }
    }
}

impl std::fmt::Display for DbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for DbType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "boolean" | "bool" => Ok(DbType::Boolean),
            "int32" | "int" | "integer" => Ok(DbType::Int32),
            "int64" | "long" | "bigint" => Ok(DbType::Int64),
            "single" | "float" | "real" => Ok(DbType::Single),
            "double" => Ok(DbType::Double),
            "string" | "text" => Ok(DbType::String),
            "binary" | "blob" | "bytes" => Ok(DbType::Binary),
            "datetime" | "timestamp" => Ok(DbType::DateTime),
            _ => Err(format!("Invalid parameter type: '{}'", s)),
        }
    }
}

/// Direction in which a parameter value flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParameterDirection {
    /// Value is sent to the database
    #[default]
    Input,
    /// Value is produced by the database
    Output,
    /// Value is sent and may be overwritten by the database
    InputOutput,
    /// Return value of a procedure call
    ReturnValue,
}

impl ParameterDirection {
    /// Check if the database reads this parameter's value
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            ParameterDirection::Input | ParameterDirection::InputOutput
        )
    }

    /// Check if the database writes a value back into this parameter
    pub fn is_output(&self) -> bool {
        !matches!(self, ParameterDirection::Input)
    }
}
