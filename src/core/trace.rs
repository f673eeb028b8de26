//! Query tracing hooks
//!
//! A [`TraceService`] hands out one [`DbTracing`] per execution. The
//! executor attaches it to the execute context and reports the lifecycle
//! events; it never reads anything back.

use super::driver::NativeCommand;
use super::error::DatabaseError;
use super::query::DbQuery;
use std::time::Instant;

/// Observer of a single query execution
pub trait DbTracing: Send + Sync {
    /// The command is about to run
    fn on_executing(&self, _command: &NativeCommand) {}

    /// The execute context was released after a successful run
    fn on_complete(&self) {}

    /// Translation, connection or command failed
    fn on_exception(&self, _error: &DatabaseError) {}
}

/// Creates tracing handles for executions
pub trait TraceService: Send + Sync {
    /// Return `None` to skip tracing for this query
    fn create_tracing(&self, query: &DbQuery) -> Option<Box<dyn DbTracing>>;
}

/// Trace service emitting `tracing` events for every execution
#[derive(Debug, Clone)]
pub struct LoggingTraceService {
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for LoggingTraceService {
    fn default() -> Self {
        Self {
            max_sql_length: Some(200),
        }
    }
}

impl LoggingTraceService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }
}

impl TraceService for LoggingTraceService {
    fn create_tracing(&self, query: &DbQuery) -> Option<Box<dyn DbTracing>> {
        Some(Box::new(LoggingTracing {
            kind: query.kind(),
            max_sql_length: self.max_sql_length,
            started: Instant::now(),
        }))
    }
}

struct LoggingTracing {
    kind: &'static str,
    max_sql_length: Option<usize>,
    started: Instant,
}

impl DbTracing for LoggingTracing {
    fn on_executing(&self, command: &NativeCommand) {
        let sql = truncate_sql(command.text(), self.max_sql_length);
        tracing::debug!(
            target: "rust_query_executor::sql",
            kind = self.kind,
            param_count = command.parameters().len(),
            sql = %sql,
            "executing"
        );
    }

    fn on_complete(&self) {
        tracing::debug!(
            target: "rust_query_executor::sql",
            kind = self.kind,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "complete"
        );
    }

    fn on_exception(&self, error: &DatabaseError) {
        tracing::warn!(
            target: "rust_query_executor::sql",
            kind = self.kind,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            error = %error,
            "failed"
        );
    }
}

/// Cut `sql` to at most `max` bytes on a char boundary
pub(crate) fn truncate_sql(sql: &str, max: Option<usize>) -> String {
    match max {
        Some(max) if sql.len() > max => {
            let mut end = max;
            while !sql.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &sql[..end])
        }
        _ => sql.to_string(),
    }
}
