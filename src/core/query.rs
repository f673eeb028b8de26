//! Query objects
//!
//! [`ParameterizedQuery`] is the immutable text-template query produced by
//! the builder, [`StoredProcedureQuery`] is a named call with named
//! arguments, and [`DbQuery`] is the closed set of query kinds an executor
//! understands.

use super::error::{DatabaseError, Result};
use super::parameter::ParameterDescriptor;
use super::query_builder::{ParameterizedQueryBuilder, QueryBuffer};
use super::template::{parse_template, placeholder_spans, TemplateSegment};
use super::value::ToDbValue;
use serde::Serialize;

/// Capability of appending oneself into a foreign query buffer
///
/// The builder holds its guard for the whole call, so everything a partial
/// appends lands atomically. If `append_to` fails, the builder discards
/// whatever the partial had appended.
pub trait QueryPartial {
    /// Append text and parameters to `buffer`
    fn append_to(&self, buffer: &mut QueryBuffer) -> Result<()>;
}

/// Immutable parameterized query
///
/// The text is a template where `#N#` refers to `parameters()[N]` and `##`
/// is a literal `#`. Two queries with the same content are not required to
/// compare equal, so no `PartialEq` is provided.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterizedQuery {
    text: String,
    parameters: Vec<ParameterDescriptor>,
}

impl ParameterizedQuery {
    /// Create a query from a template and its parameters
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::MalformedQuery`] if the template cannot be
    /// decoded or references a parameter index that does not exist.
    pub fn new(text: impl Into<String>, parameters: Vec<ParameterDescriptor>) -> Result<Self> {
        let text = text.into();
        for (offset, index) in placeholder_spans(&text)? {
            if index >= parameters.len() {
                return Err(DatabaseError::malformed(
                    offset,
                    format!(
                        "placeholder #{}# refers past the {} supplied parameters",
                        index,
                        parameters.len()
                    ),
                ));
            }
        }
        Ok(Self { text, parameters })
    }

    /// Build a query from text alone, escaping any `#`
    pub fn from_text(text: &str) -> Self {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text(text);
        builder.create_query()
    }

    /// Snapshot constructor used by the builder, whose buffer is valid by construction
    pub(crate) fn from_buffer(text: String, parameters: Vec<ParameterDescriptor>) -> Self {
        Self { text, parameters }
    }

    /// Template text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parameters in placeholder-index order
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Decode the template into literal and parameter segments
    pub fn segments(&self) -> Result<Vec<TemplateSegment>> {
        parse_template(&self.text)
    }

    /// Check if the template is empty
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Join several queries into one, separating them with a space where
    /// neither side already provides whitespace
    pub fn concat<'a, I>(queries: I) -> Result<ParameterizedQuery>
    where
        I: IntoIterator<Item = &'a ParameterizedQuery>,
    {
        let builder = ParameterizedQueryBuilder::new();
        builder.with_buffer(|buffer| {
            for query in queries {
                if query.is_empty() {
                    continue;
                }
                let starts_with_space = query.text.starts_with(char::is_whitespace);
                if !buffer.is_empty() && !starts_with_space && !buffer.ends_with_whitespace()? {
                    buffer.append_char(' ');
                }
                buffer.append_partial(query)?;
            }
            Ok::<(), DatabaseError>(())
        })?;
        Ok(builder.create_query())
    }
}

impl QueryPartial for ParameterizedQuery {
    fn append_to(&self, buffer: &mut QueryBuffer) -> Result<()> {
        for segment in self.segments()? {
            match segment {
                TemplateSegment::Literal(text) => {
                    buffer.append_text(&text);
                }
                TemplateSegment::Parameter(index) => {
                    let parameter = self.parameters.get(index).cloned().ok_or_else(|| {
                        DatabaseError::malformed(0, format!("no parameter at index {}", index))
                    })?;
                    buffer.append_descriptor(parameter);
                }
            }
        }
        Ok(())
    }
}

/// Comma separated list of parameters, e.g. the right-hand side of `IN (...)`
///
/// An empty list renders `NULL` so that `IN (NULL)` stays valid SQL.
#[derive(Debug, Clone)]
pub struct ValueList {
    values: Vec<ParameterDescriptor>,
}

impl ValueList {
    /// Normalize every value into a positional parameter
    pub fn new<I, T>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: ToDbValue,
    {
        let values = values
            .into_iter()
            .map(|value| ParameterDescriptor::input(&value))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl QueryPartial for ValueList {
    fn append_to(&self, buffer: &mut QueryBuffer) -> Result<()> {
        if self.values.is_empty() {
            buffer.append_text("NULL");
            return Ok(());
        }
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                buffer.append_text(", ");
            }
            buffer.append_descriptor(value.clone());
        }
        Ok(())
    }
}

/// Call of a named routine with named arguments
#[derive(Debug, Clone, Serialize)]
pub struct StoredProcedureQuery {
    name: String,
    parameters: Vec<ParameterDescriptor>,
}

impl StoredProcedureQuery {
    /// Create a call with no arguments
    ///
    /// # Errors
    ///
    /// The routine name must be a plain, optionally schema-qualified
    /// identifier (`name` or `schema.name`).
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !name.split('.').all(is_identifier) || name.split('.').count() > 2 {
            return Err(DatabaseError::query(format!(
                "Invalid routine name: '{}'",
                name
            )));
        }
        Ok(Self {
            name,
            parameters: Vec::new(),
        })
    }

    /// Add a named argument
    pub fn with_parameter<T: ToDbValue + ?Sized>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(DatabaseError::query(format!(
                "Invalid parameter name: '{}'",
                name
            )));
        }
        if self.parameters.iter().any(|p| p.name() == Some(name.as_str())) {
            return Err(DatabaseError::query(format!(
                "Duplicate parameter name: '{}'",
                name
            )));
        }
        self.parameters
            .push(ParameterDescriptor::named(name, value)?);
        Ok(self)
    }

    /// Routine name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments in call order; every descriptor is named
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Every query kind an executor can run
#[derive(Debug, Clone)]
pub enum DbQuery {
    /// Text template with positional parameters
    Parameterized(ParameterizedQuery),
    /// Named routine call with named arguments
    StoredProcedure(StoredProcedureQuery),
}

impl DbQuery {
    /// Short name of the query kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            DbQuery::Parameterized(_) => "parameterized",
            DbQuery::StoredProcedure(_) => "stored_procedure",
        }
    }

    /// Number of parameters carried by the query
    pub fn parameter_count(&self) -> usize {
        match self {
            DbQuery::Parameterized(q) => q.parameters().len(),
            DbQuery::StoredProcedure(q) => q.parameters().len(),
        }
    }
}

impl From<ParameterizedQuery> for DbQuery {
    fn from(query: ParameterizedQuery) -> Self {
        DbQuery::Parameterized(query)
    }
}

impl From<StoredProcedureQuery> for DbQuery {
    fn from(query: StoredProcedureQuery) -> Self {
        DbQuery::StoredProcedure(query)
    }
}

impl From<&ParameterizedQuery> for DbQuery {
    fn from(query: &ParameterizedQuery) -> Self {
        DbQuery::Parameterized(query.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::DatabaseValue;

    fn params(values: &[i32]) -> Vec<ParameterDescriptor> {
        values
            .iter()
            .map(|v| ParameterDescriptor::input(v).unwrap())
            .collect()
    }

    #[test]
    fn test_new_validates_indices() {
        assert!(ParameterizedQuery::new("a = #0# AND b = #1#", params(&[1, 2])).is_ok());
        assert!(matches!(
            ParameterizedQuery::new("a = #2#", params(&[1, 2])),
            Err(DatabaseError::MalformedQuery { position: 4, .. })
        ));
        assert!(matches!(
            ParameterizedQuery::new("a = #0# AND b = #5#", params(&[1])),
            Err(DatabaseError::MalformedQuery { position: 16, .. })
        ));
        assert!(ParameterizedQuery::new("a # b", Vec::new()).is_err());
    }

    #[test]
    fn test_from_text_escapes() {
        let q = ParameterizedQuery::from_text("SELECT '#1#'");
        assert_eq!(q.text(), "SELECT '##1##'");
        assert!(q.parameters().is_empty());
    }

    #[test]
    fn test_nested_query_is_reindexed() {
        let inner = ParameterizedQuery::new("id IN (SELECT id FROM t WHERE x = #0#)", params(&[9]))
            .unwrap();

        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("SELECT * FROM u WHERE a = ");
        builder.append_parameter(&1).unwrap();
        builder.append_text(" AND ");
        builder.append_partial(&inner).unwrap();

        let query = builder.create_query();
        assert_eq!(
            query.text(),
            "SELECT * FROM u WHERE a = #0# AND id IN (SELECT id FROM t WHERE x = #1#)"
        );
        assert_eq!(query.parameters()[1].value(), &DatabaseValue::Int(9));
    }

    #[test]
    fn test_nested_query_keeps_literal_hash() {
        let inner = ParameterizedQuery::from_text("x = '#'");
        let builder = ParameterizedQueryBuilder::new();
        builder.append_partial(&inner).unwrap();
        assert_eq!(builder.create_query().text(), "x = '##'");
    }

    #[test]
    fn test_concat_inserts_separator() {
        let select = ParameterizedQuery::new("SELECT * FROM t WHERE a = #0#", params(&[1])).unwrap();
        let filter = ParameterizedQuery::new("AND b = #0#", params(&[2])).unwrap();
        let order = ParameterizedQuery::from_text(" ORDER BY a");

        let query = ParameterizedQuery::concat([&select, &filter, &order]).unwrap();
        assert_eq!(
            query.text(),
            "SELECT * FROM t WHERE a = #0# AND b = #1# ORDER BY a"
        );
        assert_eq!(query.parameters().len(), 2);
    }

    #[test]
    fn test_concat_skips_empty() {
        let empty = ParameterizedQuery::from_text("");
        let one = ParameterizedQuery::from_text("SELECT 1");
        let query = ParameterizedQuery::concat([&empty, &one, &empty]).unwrap();
        assert_eq!(query.text(), "SELECT 1");
    }

    #[test]
    fn test_value_list() {
        let list = ValueList::new([3, 4, 5]).unwrap();
        assert_eq!(list.len(), 3);

        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("SELECT * FROM t WHERE id IN (");
        builder.append_partial(&list).unwrap();
        builder.append_char(')');
        assert_eq!(
            builder.create_query().text(),
            "SELECT * FROM t WHERE id IN (#0#, #1#, #2#)"
        );
    }

    #[test]
    fn test_empty_value_list_renders_null() {
        let list = ValueList::new(Vec::<i32>::new()).unwrap();
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("id IN (");
        builder.append_partial(&list).unwrap();
        builder.append_char(')');
        assert_eq!(builder.create_query().text(), "id IN (NULL)");
    }

    #[test]
    fn test_stored_procedure_query() {
        let query = StoredProcedureQuery::new("max")
            .unwrap()
            .with_parameter("a", &1)
            .unwrap()
            .with_parameter("b", "x")
            .unwrap();
        assert_eq!(query.name(), "max");
        assert_eq!(query.parameters().len(), 2);
        assert_eq!(query.parameters()[1].name(), Some("b"));
    }

    #[test]
    fn test_stored_procedure_rejects_bad_names() {
        assert!(StoredProcedureQuery::new("drop table x").is_err());
        assert!(StoredProcedureQuery::new("a.b.c").is_err());
        assert!(StoredProcedureQuery::new("dbo.proc_1").is_ok());

        let query = StoredProcedureQuery::new("f").unwrap();
        assert!(query.clone().with_parameter("1x", &1).is_err());
        assert!(query
            .with_parameter("a", &1)
            .unwrap()
            .with_parameter("a", &2)
            .is_err());
    }

    #[test]
    fn test_db_query_dispatch_info() {
        let q: DbQuery = ParameterizedQuery::new("#0#", params(&[1])).unwrap().into();
        assert_eq!(q.kind(), "parameterized");
        assert_eq!(q.parameter_count(), 1);

        let q: DbQuery = StoredProcedureQuery::new("f").unwrap().into();
        assert_eq!(q.kind(), "stored_procedure");
        assert_eq!(q.parameter_count(), 0);
    }

    #[test]
    fn test_query_serializes() {
        let q = ParameterizedQuery::new("id = #0#", params(&[5])).unwrap();
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["text"], "id = #0#");
        assert_eq!(json["parameters"][0]["value"]["Int"], 5);
    }
}
