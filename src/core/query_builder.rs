//! Thread-safe parameterized query builder
//!
//! [`ParameterizedQueryBuilder`] accumulates literal text and parameters and
//! hands out immutable [`ParameterizedQuery`] snapshots. Text and parameters
//! live together in one [`QueryBuffer`] behind a single mutex, so a
//! placeholder token is never observable without its descriptor.
//!
//! # Example
//!
//! ```
//! use rust_query_executor::core::query_builder::ParameterizedQueryBuilder;
//!
//! let builder = ParameterizedQueryBuilder::new();
//! builder.append_text("SELECT * FROM T WHERE id=");
//! builder.append_parameter(&5)?;
//! builder.append_text(" AND name=");
//! builder.append_parameter("ok")?;
//!
//! let query = builder.create_query();
//! assert_eq!(query.text(), "SELECT * FROM T WHERE id=#0# AND name=#1#");
//! # Ok::<(), rust_query_executor::DatabaseError>(())
//! ```

use super::error::{DatabaseError, Result};
use super::parameter::ParameterDescriptor;
use super::query::{ParameterizedQuery, QueryPartial, ValueList};
use super::template::{escape_text, placeholder, DELIMITER};
use super::value::{DatabaseValue, ToDbValue};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Text and parameters of a query under construction
///
/// Only reachable through [`ParameterizedQueryBuilder`], which hands it out
/// while holding its guard (see [`ParameterizedQueryBuilder::with_buffer`]
/// and [`QueryPartial::append_to`]).
#[derive(Debug, Default)]
pub struct QueryBuffer {
    text: String,
    parameters: Vec<ParameterDescriptor>,
}

impl QueryBuffer {
    /// Append literal text, escaping every `#`
    pub fn append_text(&mut self, text: &str) -> &mut Self {
        self.text.push_str(&escape_text(text));
        self
    }

    /// Append one literal character, escaping `#`
    pub fn append_char(&mut self, ch: char) -> &mut Self {
        if ch == DELIMITER {
            self.text.push_str("##");
        } else {
            self.text.push(ch);
        }
        self
    }

    /// Normalize `value` into a positional input parameter and append it
    ///
    /// On conversion failure nothing is appended.
    pub fn append_parameter<T: ToDbValue + ?Sized>(&mut self, value: &T) -> Result<&mut Self> {
        let parameter = ParameterDescriptor::input(value)?;
        Ok(self.append_descriptor(parameter))
    }

    /// Append a descriptor as-is together with its placeholder token
    pub fn append_descriptor(&mut self, parameter: ParameterDescriptor) -> &mut Self {
        self.parameters.push(parameter);
        let token = placeholder(self.parameters.len() - 1);
        self.text.push_str(&token);
        self
    }

    /// Let `partial` append itself
    ///
    /// If the partial fails, text and parameters are rolled back to where
    /// they were before the call.
    pub fn append_partial<P: QueryPartial + ?Sized>(&mut self, partial: &P) -> Result<&mut Self> {
        let text_len = self.text.len();
        let parameter_len = self.parameters.len();

        if let Err(e) = partial.append_to(self) {
            self.text.truncate(text_len);
            self.parameters.truncate(parameter_len);
            return Err(e);
        }
        Ok(self)
    }

    /// Append a value, descriptor or partial
    pub fn append_argument(&mut self, argument: &QueryArg) -> Result<&mut Self> {
        match argument {
            QueryArg::Value(value) => self.append_parameter(value),
            QueryArg::Parameter(parameter) => Ok(self.append_descriptor(parameter.clone())),
            QueryArg::Partial(partial) => self.append_partial(partial.as_ref()),
        }
    }

    /// Check whether the text ends with a whitespace character
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::EmptyQuery`] if nothing has been appended yet.
    pub fn ends_with_whitespace(&self) -> Result<bool> {
        self.text
            .chars()
            .next_back()
            .map(char::is_whitespace)
            .ok_or(DatabaseError::EmptyQuery)
    }

    /// Template text accumulated so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parameters accumulated so far
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn snapshot(&self) -> ParameterizedQuery {
        ParameterizedQuery::from_buffer(self.text.clone(), self.parameters.clone())
    }
}

/// Anything that can be appended in parameter position
///
/// This is the polymorphic form of "append a parameter": a raw value becomes
/// a positional input parameter, a descriptor is used as-is, and a partial
/// appends itself.
#[derive(Clone)]
pub enum QueryArg {
    /// Already normalized value
    Value(DatabaseValue),
    /// Complete descriptor
    Parameter(ParameterDescriptor),
    /// Nested fragment
    Partial(Arc<dyn QueryPartial + Send + Sync>),
}

impl QueryArg {
    /// Normalize a raw value into an argument
    pub fn value<T: ToDbValue + ?Sized>(value: &T) -> Result<Self> {
        Ok(QueryArg::Value(value.to_db_value()?))
    }

    /// Wrap a partial
    pub fn partial<P: QueryPartial + Send + Sync + 'static>(partial: P) -> Self {
        QueryArg::Partial(Arc::new(partial))
    }
}

impl fmt::Debug for QueryArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryArg::Value(v) => f.debug_tuple("Value").field(v).finish(),
            QueryArg::Parameter(p) => f.debug_tuple("Parameter").field(p).finish(),
            QueryArg::Partial(_) => f.write_str("Partial(..)"),
        }
    }
}

impl From<DatabaseValue> for QueryArg {
    fn from(value: DatabaseValue) -> Self {
        QueryArg::Value(value)
    }
}

impl From<ParameterDescriptor> for QueryArg {
    fn from(parameter: ParameterDescriptor) -> Self {
        QueryArg::Parameter(parameter)
    }
}

impl From<ParameterizedQuery> for QueryArg {
    fn from(query: ParameterizedQuery) -> Self {
        QueryArg::partial(query)
    }
}

impl From<ValueList> for QueryArg {
    fn from(list: ValueList) -> Self {
        QueryArg::partial(list)
    }
}

/// Builder for [`ParameterizedQuery`]
///
/// # Thread Safety
/// Every operation takes the same lock, so the builder can be shared
/// (e.g. through `Arc`) and appended to from several threads. Each append is
/// atomic; the relative order of appends from different threads is whatever
/// order they acquire the lock in.
#[derive(Debug, Default)]
pub struct ParameterizedQueryBuilder {
    buffer: Mutex<QueryBuffer>,
}

impl ParameterizedQueryBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append literal text; every `#` is stored as `##`
    pub fn append_text(&self, text: &str) -> &Self {
        self.buffer.lock().append_text(text);
        self
    }

    /// Append one literal character
    pub fn append_char(&self, ch: char) -> &Self {
        self.buffer.lock().append_char(ch);
        self
    }

    /// Append a raw value as a positional input parameter
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::ConversionFailed`] if the value cannot be
    /// normalized; the builder is left unchanged.
    pub fn append_parameter<T: ToDbValue + ?Sized>(&self, value: &T) -> Result<&Self> {
        self.buffer.lock().append_parameter(value)?;
        Ok(self)
    }

    /// Append a prepared descriptor as-is
    pub fn append_descriptor(&self, parameter: ParameterDescriptor) -> &Self {
        self.buffer.lock().append_descriptor(parameter);
        self
    }

    /// Let a partial query append itself while the builder's guard is held
    pub fn append_partial<P: QueryPartial + ?Sized>(&self, partial: &P) -> Result<&Self> {
        self.buffer.lock().append_partial(partial)?;
        Ok(self)
    }

    /// Append a value, descriptor or partial
    pub fn append_argument(&self, argument: &QueryArg) -> Result<&Self> {
        self.buffer.lock().append_argument(argument)?;
        Ok(self)
    }

    /// Run several appends as one atomic step
    pub fn with_buffer<R>(&self, f: impl FnOnce(&mut QueryBuffer) -> R) -> R {
        f(&mut self.buffer.lock())
    }

    /// Check whether the current text ends with whitespace
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::EmptyQuery`] when the builder is empty.
    pub fn ends_with_whitespace(&self) -> Result<bool> {
        self.buffer.lock().ends_with_whitespace()
    }

    /// Number of parameters appended so far
    pub fn parameter_count(&self) -> usize {
        self.buffer.lock().parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Snapshot the current text and parameters
    ///
    /// The snapshot is a copy; later appends do not affect it, and the
    /// builder stays usable.
    pub fn create_query(&self) -> ParameterizedQuery {
        self.buffer.lock().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database_types::ParameterDirection;
    use std::sync::Arc;

    #[test]
    fn test_end_to_end_example() {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("SELECT * FROM T WHERE id=");
        builder.append_parameter(&5).unwrap();
        builder.append_text(" AND name=");
        builder.append_parameter("ok").unwrap();

        let query = builder.create_query();
        assert_eq!(query.text(), "SELECT * FROM T WHERE id=#0# AND name=#1#");
        assert_eq!(query.parameters().len(), 2);
        assert_eq!(query.parameters()[0].value(), &DatabaseValue::Int(5));
        assert_eq!(
            query.parameters()[1].value(),
            &DatabaseValue::String("ok".to_string())
        );
    }

    #[test]
    fn test_text_is_escaped() {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("a#b ## #3#");
        builder.append_char('#');
        builder.append_char('x');
        assert_eq!(builder.create_query().text(), "a##b #### ##3####x");
        assert_eq!(builder.parameter_count(), 0);
    }

    #[test]
    fn test_empty_text_is_noop() {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("");
        assert!(builder.is_empty());
        builder.append_parameter(&1).unwrap();
        builder.append_text("");
        assert_eq!(builder.create_query().text(), "#0#");
    }

    #[test]
    fn test_chaining() {
        let builder = ParameterizedQueryBuilder::new();
        builder
            .append_text("x = ")
            .append_parameter(&1)
            .unwrap()
            .append_char(' ');
        assert_eq!(builder.create_query().text(), "x = #0# ");
    }

    #[test]
    fn test_descriptor_used_as_is() {
        let builder = ParameterizedQueryBuilder::new();
        let p = ParameterDescriptor::new(
            Some("total".to_string()),
            &3,
            None,
            ParameterDirection::InputOutput,
        )
        .unwrap();
        builder.append_descriptor(p.clone());
        builder.append_descriptor(ParameterDescriptor::input(&4).unwrap());

        let query = builder.create_query();
        assert_eq!(query.text(), "#0##1#");
        assert_eq!(query.parameters()[0], p);
        assert!(query.parameters()[1].is_positional());
    }

    #[test]
    fn test_conversion_failure_leaves_builder_untouched() {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("x = ");
        let err = builder.append_parameter(&u64::MAX).unwrap_err();
        assert!(matches!(err, DatabaseError::ConversionFailed { .. }));

        let query = builder.create_query();
        assert_eq!(query.text(), "x = ");
        assert!(query.parameters().is_empty());
    }

    #[test]
    fn test_snapshot_is_not_affected_by_later_appends() {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("a = ");
        builder.append_parameter(&1).unwrap();
        let first = builder.create_query();

        builder.append_text(" AND b = ");
        builder.append_parameter(&2).unwrap();
        let second = builder.create_query();

        assert_eq!(first.text(), "a = #0#");
        assert_eq!(first.parameters().len(), 1);
        assert_eq!(second.text(), "a = #0# AND b = #1#");
        assert_eq!(second.parameters().len(), 2);
    }

    #[test]
    fn test_ends_with_whitespace() {
        let builder = ParameterizedQueryBuilder::new();
        assert!(matches!(
            builder.ends_with_whitespace(),
            Err(DatabaseError::EmptyQuery)
        ));
        builder.append_text("SELECT");
        assert!(!builder.ends_with_whitespace().unwrap());
        builder.append_char('\n');
        assert!(builder.ends_with_whitespace().unwrap());
        builder.append_parameter(&1).unwrap();
        assert!(!builder.ends_with_whitespace().unwrap());
    }

    struct Failing;

    impl QueryPartial for Failing {
        fn append_to(&self, buffer: &mut QueryBuffer) -> Result<()> {
            buffer.append_text("half");
            buffer.append_parameter(&1)?;
            Err(DatabaseError::query("partial failed"))
        }
    }

    #[test]
    fn test_failed_partial_is_rolled_back() {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("SELECT ");
        assert!(builder.append_partial(&Failing).is_err());

        let query = builder.create_query();
        assert_eq!(query.text(), "SELECT ");
        assert!(query.parameters().is_empty());
    }

    struct Nested;

    impl QueryPartial for Nested {
        fn append_to(&self, buffer: &mut QueryBuffer) -> Result<()> {
            buffer.append_char('(');
            buffer.append_partial(&ValueList::new([1, 2])?)?;
            buffer.append_char(')');
            Ok(())
        }
    }

    #[test]
    fn test_partial_can_nest_partials() {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_parameter(&0).unwrap();
        builder.append_text(" IN ");
        builder.append_partial(&Nested).unwrap();
        assert_eq!(builder.create_query().text(), "#0# IN (#1#, #2#)");
    }

    #[test]
    fn test_append_argument_dispatch() {
        let builder = ParameterizedQueryBuilder::new();
        let sub = ParameterizedQuery::new("y = #0#", vec![ParameterDescriptor::input(&7).unwrap()])
            .unwrap();

        builder.append_argument(&QueryArg::value(&1).unwrap()).unwrap();
        builder.append_char(',');
        builder
            .append_argument(&ParameterDescriptor::named("n", &2).unwrap().into())
            .unwrap();
        builder.append_char(',');
        builder.append_argument(&sub.into()).unwrap();

        let query = builder.create_query();
        assert_eq!(query.text(), "#0#,#1#,y = #2#");
        assert_eq!(query.parameters()[1].name(), Some("n"));
        assert_eq!(query.parameters()[2].value(), &DatabaseValue::Int(7));
    }

    #[test]
    fn test_with_buffer_is_atomic_step() {
        let builder = ParameterizedQueryBuilder::new();
        let count = builder.with_buffer(|buffer| {
            buffer.append_text("a = ");
            buffer.append_parameter(&1)?;
            Ok::<_, DatabaseError>(buffer.parameters().len())
        });
        assert_eq!(count.unwrap(), 1);
    }

    #[test]
    fn test_concurrent_appends() {
        let builder = Arc::new(ParameterizedQueryBuilder::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let builder = Arc::clone(&builder);
                std::thread::spawn(move || {
                    builder.append_parameter(&i).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let query = builder.create_query();
        assert_eq!(query.parameters().len(), 16);
        let expected: String = (0..16).map(placeholder).collect();
        assert_eq!(query.text(), expected);
    }
}
