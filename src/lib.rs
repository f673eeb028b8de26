//! # Rust Query Executor
//!
//! A thread-safe parameterized query builder and a query executor with
//! blocking and cancellable async paths.
//!
//! Queries are composed as text templates in which every parameter is
//! referenced by a `#N#` placeholder and every literal `#` is escaped as
//! `##`. A driver-specific translator turns the template into the native
//! command of its backend.
//!
//! ## Features
//!
//! - **Thread Safety**: One builder can be appended to from many threads;
//!   text and parameters stay aligned under a single `parking_lot` mutex
//! - **Composable Queries**: Nested fragments append themselves through the
//!   [`QueryPartial`] capability
//! - **Async Support**: Cancellable execution with Tokio and
//!   `CancellationToken`
//! - **Scoped Release**: Execute and transaction contexts release their
//!   connection exactly once on every exit path
//! - **Tracing**: Optional per-execution tracing hooks, with a ready-made
//!   service built on the `tracing` crate
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_query_executor::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let executor = SqliteExecutor::sqlite("file:app.db", ExecutorConfig::new())?;
//!
//!     let builder = ParameterizedQueryBuilder::new();
//!     builder.append_text("SELECT name FROM users WHERE id = ");
//!     builder.append_parameter(&5)?;
//!
//!     let mut context = executor.execute(builder.create_query())?;
//!     while let Some(row) = context.next_row() {
//!         if let Some(name) = row.get("name") {
//!             println!("User: {}", name.as_string());
//!         }
//!     }
//!     context.close()
//! }
//! ```
//!
//! ### Cancellable execution
//!
//! ```rust,no_run
//! use rust_query_executor::prelude::*;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ExecutorConfig::new().with_command_timeout(Duration::from_secs(5));
//!     let executor = SqliteExecutor::sqlite("file:app.db", config)?;
//!
//!     let token = CancellationToken::new();
//!     let query = ParameterizedQuery::from_text("SELECT count(*) AS n FROM users");
//!     let context = executor.execute_async(query, &token).await?;
//!     context.close()
//! }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! rust_query_executor/
//! ├── src/
//! │   ├── core/              # Query model, builder, executor
//! │   │   ├── config.rs      # Executor configuration
//! │   │   ├── driver.rs      # Driver seams
//! │   │   ├── error.rs       # Error types
//! │   │   ├── executor.rs    # Executor and execute context
//! │   │   ├── query.rs       # Query kinds
//! │   │   ├── query_builder.rs
//! │   │   ├── template.rs    # Placeholder codec
//! │   │   ├── transaction.rs # Transaction context
//! │   │   └── value.rs       # Value types
//! │   ├── backends/          # Driver implementations
//! │   │   └── sqlite.rs
//! │   └── lib.rs
//! ├── demos/                 # Example programs
//! ├── tests/                 # Integration tests
//! └── benches/
//! ```

/// Core query model, builder and executor
pub mod core;

/// Driver implementations
pub mod backends;

/// Prelude for convenient imports
///
/// ```rust
/// use rust_query_executor::prelude::*;
///
/// fn main() -> Result<()> {
///     let builder = ParameterizedQueryBuilder::new();
///     builder.append_text("SELECT ");
///     builder.append_parameter(&1)?;
///     assert_eq!(builder.create_query().text(), "SELECT #0#");
///     Ok(())
/// }
/// ```
pub mod prelude {
    pub use crate::core::{
        convert_value, AsyncQueryExecutor, DatabaseError, DatabaseRow, DatabaseValue, DbExecutor,
        DbQuery, DbType, ExecuteContext, ExecutorConfig, LoggingTraceService, ParameterDescriptor,
        ParameterDirection, ParameterizedQuery, ParameterizedQueryBuilder, QueryExecutor,
        QueryPartial, Result, StoredProcedureQuery, ToDbValue, TransactionContext, ValueList,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::backends::{SqliteDriver, SqliteExecutor};
}

// Re-export at root level for convenience
pub use core::{
    AsyncQueryExecutor, DatabaseError, DatabaseRow, DatabaseValue, DbExecutor, DbQuery, DbType,
    ExecuteContext, ExecutorConfig, ParameterDescriptor, ParameterDirection, ParameterizedQuery,
    ParameterizedQueryBuilder, QueryExecutor, QueryPartial, Result, StoredProcedureQuery,
    TransactionContext, ValueList,
};

#[cfg(feature = "sqlite")]
pub use backends::{SqliteDriver, SqliteExecutor};
