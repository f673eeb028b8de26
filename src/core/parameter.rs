//! Parameter descriptors
//!
//! A descriptor is the immutable envelope around one parameter value: an
//! optional name, the normalized value, an optional declared type and a
//! direction.

use super::database_types::{DbType, ParameterDirection};
use super::error::Result;
use super::value::{convert_value, DatabaseValue, ToDbValue};
use serde::Serialize;

/// Immutable description of a single query parameter
///
/// The value is normalized through [`convert_value`] when the descriptor is
/// created and never changes afterwards. Descriptors serialize for logging
/// but can only be built through the constructors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDescriptor {
    name: Option<String>,
    value: DatabaseValue,
    db_type: Option<DbType>,
    direction: ParameterDirection,
}

impl ParameterDescriptor {
    /// Create a descriptor from its parts
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::ConversionFailed`](super::DatabaseError::ConversionFailed)
    /// if `value` cannot be normalized.
    pub fn new<T: ToDbValue + ?Sized>(
        name: Option<String>,
        value: &T,
        db_type: Option<DbType>,
        direction: ParameterDirection,
    ) -> Result<Self> {
        Ok(Self {
            name,
            value: convert_value(value)?,
            db_type,
            direction,
        })
    }

    /// Create a positional input parameter
    pub fn input<T: ToDbValue + ?Sized>(value: &T) -> Result<Self> {
        Self::new(None, value, None, ParameterDirection::Input)
    }

    /// Create a named input parameter
    pub fn named<T: ToDbValue + ?Sized>(name: impl Into<String>, value: &T) -> Result<Self> {
        Self::new(Some(name.into()), value, None, ParameterDirection::Input)
    }

    /// Parameter name, `None` for positional parameters
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Normalized parameter value
    pub fn value(&self) -> &DatabaseValue {
        &self.value
    }

    /// Declared type, if the caller supplied one
    pub fn db_type(&self) -> Option<DbType> {
        self.db_type
    }

    /// Declared type, falling back to the type implied by the value
    pub fn effective_type(&self) -> Option<DbType> {
        self.db_type.or_else(|| DbType::infer(&self.value))
    }

    pub fn direction(&self) -> ParameterDirection {
        self.direction
    }

    /// Check if the parameter has no name
    pub fn is_positional(&self) -> bool {
        self.name.is_none()
    }
}
