//! Database backend implementations
//!
//! This module contains the drivers implementing the core driver seams.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{
    SqliteConnection, SqliteDriver, SqliteExecutor, SqliteInterrupt, SqliteTranslator,
};
