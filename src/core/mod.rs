//! Core query execution types and traits
//!
//! This module provides the fundamental building blocks: the value envelope,
//! parameter descriptors, the placeholder template, the query builder, the
//! driver seams and the executor with its execute and transaction contexts.

pub mod config;
pub mod database_types;
pub mod driver;
pub mod error;
pub mod executor;
pub mod parameter;
pub mod query;
pub mod query_builder;
pub mod template;
pub mod trace;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use config::{ConnectionBuilder, ExecutorConfig, OpenMode};
pub use database_types::{DbType, ParameterDirection};
pub use driver::{
    CommandInterrupt, CommandParameters, Driver, DriverConnection, NativeCommand,
    QueryTranslator, ResultCursor,
};
pub use error::{DatabaseError, Result};
pub use executor::{AsyncQueryExecutor, DbExecutor, ExecuteContext, QueryExecutor};
pub use parameter::ParameterDescriptor;
pub use query::{DbQuery, ParameterizedQuery, QueryPartial, StoredProcedureQuery, ValueList};
pub use query_builder::{ParameterizedQueryBuilder, QueryArg, QueryBuffer};
pub use template::{
    escape_text, parse_template, placeholder, placeholder_spans, unescape_text, TemplateSegment,
};
pub use trace::{DbTracing, LoggingTraceService, TraceService};
pub use transaction::{TransactionContext, TransactionState};
pub use value::{convert_value, DatabaseRow, DatabaseValue, ToDbValue};
