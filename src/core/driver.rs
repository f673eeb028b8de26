//! Driver seams
//!
//! The executor is written against these traits. A backend supplies a
//! [`QueryTranslator`] for its dialect and a [`Driver`] that opens
//! [`DriverConnection`]s.

use super::error::{DatabaseError, Result};
use super::query::{ParameterizedQuery, StoredProcedureQuery};
use super::value::{DatabaseRow, DatabaseValue};
use std::collections::VecDeque;
use std::time::Duration;

/// Parameters bound to a native command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandParameters {
    /// Bound by position, first value is parameter 1
    Positional(Vec<DatabaseValue>),
    /// Bound by name
    Named(Vec<(String, DatabaseValue)>),
}

impl CommandParameters {
    pub fn len(&self) -> usize {
        match self {
            CommandParameters::Positional(values) => values.len(),
            CommandParameters::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A command in the target dialect, ready to be bound and run
#[derive(Debug, Clone, PartialEq)]
pub struct NativeCommand {
    text: String,
    parameters: CommandParameters,
}

impl NativeCommand {
    pub fn new(text: impl Into<String>, parameters: CommandParameters) -> Self {
        Self {
            text: text.into(),
            parameters,
        }
    }

    /// Dialect-specific command text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &CommandParameters {
        &self.parameters
    }
}

/// Translates query objects into native commands for one dialect
pub trait QueryTranslator: Send + Sync {
    /// Translate a placeholder template and its parameters
    fn translate(&self, query: &ParameterizedQuery) -> Result<NativeCommand>;

    /// Build a routine call binding every argument by name
    fn procedure_call(&self, query: &StoredProcedureQuery) -> Result<NativeCommand>;
}

/// Forward-only cursor over the rows a command produced
#[derive(Debug, Default, Clone)]
pub struct ResultCursor {
    columns: Vec<String>,
    rows: VecDeque<DatabaseRow>,
    records_affected: u64,
}

impl ResultCursor {
    pub fn new(columns: Vec<String>, rows: Vec<DatabaseRow>, records_affected: u64) -> Self {
        Self {
            columns,
            rows: rows.into(),
            records_affected,
        }
    }

    /// Column names in result order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows changed by the command (0 for pure queries)
    pub fn records_affected(&self) -> u64 {
        self.records_affected
    }

    /// Rows not yet consumed
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// Advance the cursor
    pub fn next_row(&mut self) -> Option<DatabaseRow> {
        self.rows.pop_front()
    }
}

impl Iterator for ResultCursor {
    type Item = DatabaseRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.rows.len(), Some(self.rows.len()))
    }
}

/// Aborts a command running on another thread
pub trait CommandInterrupt: Send + Sync + 'static {
    fn interrupt(&self);
}

/// One open database connection
///
/// All methods block; the executor moves connections onto the blocking
/// thread pool for the async path.
pub trait DriverConnection: Send + 'static {
    /// Handle able to abort [`run`](Self::run) from another thread
    type Interrupt: CommandInterrupt;

    fn interrupt_handle(&self) -> Self::Interrupt;

    /// Run a command and collect its cursor
    ///
    /// # Errors
    ///
    /// When `timeout` elapses the driver must fail with
    /// [`DatabaseError::QueryTimeout`]; an interrupt fails with
    /// [`DatabaseError::Cancelled`].
    fn run(&mut self, command: &NativeCommand, timeout: Option<Duration>) -> Result<ResultCursor>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Close the connection, releasing every driver resource
    fn close(self) -> Result<()>;
}

/// Factory for connections of one backend
pub trait Driver: Send + Sync + 'static {
    type Connection: DriverConnection;
    type Translator: QueryTranslator;

    /// Short backend name, used in logs
    fn name(&self) -> &'static str;

    fn translator(&self) -> &Self::Translator;

    /// Reject connection strings the backend can never open
    fn validate_connection_string(&self, connection_string: &str) -> Result<()> {
        if connection_string.trim().is_empty() {
            return Err(DatabaseError::invalid_connection_string(
                "connection string is empty",
            ));
        }
        Ok(())
    }

    /// Open a new connection
    fn open(&self, connection_string: &str) -> Result<Self::Connection>;
}
