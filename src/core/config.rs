//! Executor configuration and connection strings

use super::error::{DatabaseError, Result};
use super::trace::TraceService;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration shared by every execution of an executor
#[derive(Clone, Default)]
pub struct ExecutorConfig {
    /// Upper bound for running a command (connection opening is not included)
    pub command_timeout: Option<Duration>,
    /// Source of per-execution tracing handles
    pub trace_service: Option<Arc<dyn TraceService>>,
}

impl ExecutorConfig {
    /// Configuration with no timeout and no tracing
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the command timeout
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Attach a trace service
    pub fn with_trace_service(mut self, service: Arc<dyn TraceService>) -> Self {
        self.trace_service = Some(service);
        self
    }

    /// Check the configuration before it is handed to an executor
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidConfiguration`] for a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout == Some(Duration::ZERO) {
            return Err(DatabaseError::invalid_configuration(
                "command timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("command_timeout", &self.command_timeout)
            .field("trace_service", &self.trace_service.is_some())
            .finish()
    }
}

/// SQLite open mode for URI connection strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing database read-only
    ReadOnly,
    /// Open an existing database for reading and writing
    ReadWrite,
    /// Open for reading and writing, creating the file if needed
    ReadWriteCreate,
    /// Pure in-memory database
    Memory,
}

impl OpenMode {
    fn as_uri_value(&self) -> &'static str {
        match self {
            OpenMode::ReadOnly => "ro",
            OpenMode::ReadWrite => "rw",
            OpenMode::ReadWriteCreate => "rwc",
            OpenMode::Memory => "memory",
        }
    }
}

/// Connection string builder producing SQLite URI filenames
///
/// Every execution opens its own connection, so a plain `:memory:` database
/// would be empty each time. Use a file, or a named in-memory database with a
/// shared cache that some other connection keeps alive.
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    path: Option<String>,
    mode: Option<OpenMode>,
    shared_cache: bool,
    options: Vec<(String, String)>,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database path (or in-memory database name)
    pub fn path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the open mode
    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Share the page cache between connections to the same database
    pub fn shared_cache(mut self) -> Self {
        self.shared_cache = true;
        self
    }

    /// Add a custom URI query option
    pub fn option<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /// Build the connection string
    pub fn build_connection_string(&self) -> String {
        let path = self.path.as_deref().unwrap_or("");
        let mut parts = Vec::new();
        if let Some(mode) = self.mode {
            parts.push(format!("mode={}", mode.as_uri_value()));
        }
        if self.shared_cache {
            parts.push("cache=shared".to_string());
        }
        for (key, value) in &self.options {
            parts.push(format!("{}={}", key, value));
        }

        if parts.is_empty() {
            format!("file:{}", path)
        } else {
            format!("file:{}?{}", path, parts.join("&"))
        }
    }
}
