//! Property-based tests for the query builder using proptest

use proptest::prelude::*;
use rust_query_executor::core::template::{parse_template, placeholder_indices};
use rust_query_executor::core::{convert_value, escape_text, unescape_text, TemplateSegment};
use rust_query_executor::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Text(String),
    Param(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        "[ -~]{0,12}".prop_map(Op::Text),
        "(#|##|#[0-9]#|[a-z ])*".prop_map(Op::Text),
        any::<i64>().prop_map(Op::Param),
    ]
}

fn apply(builder: &ParameterizedQueryBuilder, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Text(text) => {
                builder.append_text(text);
            }
            Op::Param(value) => {
                builder.append_parameter(value).unwrap();
            }
        }
    }
}

// ============================================================================
// Escaping Tests
// ============================================================================

proptest! {
    /// Appended text reads back unchanged once escapes are reversed
    #[test]
    fn test_escape_round_trip(text in "(#|##|#[0-9]+#|[^#]){0,24}") {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text(&text);
        let query = builder.create_query();

        prop_assert_eq!(unescape_text(query.text()), text.clone());
        prop_assert!(query.parameters().is_empty());

        let segments = parse_template(query.text()).unwrap();
        if text.is_empty() {
            prop_assert!(segments.is_empty());
        } else {
            prop_assert_eq!(segments, vec![TemplateSegment::Literal(text)]);
        }
    }

    /// Escaping then unescaping is the identity on any string
    #[test]
    fn test_escape_text_inverse(text in ".*") {
        prop_assert_eq!(unescape_text(&escape_text(&text)), text);
    }
}

// ============================================================================
// Placeholder Alignment Tests
// ============================================================================

proptest! {
    /// Placeholders are numbered 0..N in append order and point at the
    /// matching descriptor
    #[test]
    fn test_placeholder_alignment(ops in prop::collection::vec(op_strategy(), 0..24)) {
        let builder = ParameterizedQueryBuilder::new();
        apply(&builder, &ops);
        let query = builder.create_query();

        let expected_values: Vec<i64> = ops
            .iter()
            .filter_map(|op| match op {
                Op::Param(v) => Some(*v),
                Op::Text(_) => None,
            })
            .collect();
        let expected_text: String = ops
            .iter()
            .filter_map(|op| match op {
                Op::Text(t) => Some(t.as_str()),
                Op::Param(_) => None,
            })
            .collect();

        let indices = placeholder_indices(query.text()).unwrap();
        prop_assert_eq!(indices, (0..expected_values.len()).collect::<Vec<_>>());
        prop_assert_eq!(query.parameters().len(), expected_values.len());

        let mut literal = String::new();
        for segment in query.segments().unwrap() {
            match segment {
                TemplateSegment::Literal(text) => literal.push_str(&text),
                TemplateSegment::Parameter(index) => {
                    prop_assert_eq!(
                        query.parameters()[index].value(),
                        &DatabaseValue::Long(expected_values[index])
                    );
                }
            }
        }
        prop_assert_eq!(literal, expected_text);
    }

    /// A value list renders one placeholder per value, or NULL when empty
    #[test]
    fn test_value_list_placeholders(values in prop::collection::vec(any::<i32>(), 0..16)) {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("IN (");
        builder.append_partial(&ValueList::new(values.clone()).unwrap()).unwrap();
        builder.append_text(")");
        let query = builder.create_query();

        prop_assert_eq!(query.parameters().len(), values.len());
        if values.is_empty() {
            prop_assert_eq!(query.text(), "IN (NULL)");
        } else {
            let indices = placeholder_indices(query.text()).unwrap();
            prop_assert_eq!(indices, (0..values.len()).collect::<Vec<_>>());
        }
    }
}

// ============================================================================
// Snapshot Tests
// ============================================================================

proptest! {
    /// Later appends never change an earlier snapshot
    #[test]
    fn test_snapshot_immutability(
        before in prop::collection::vec(op_strategy(), 0..12),
        after in prop::collection::vec(op_strategy(), 1..12),
    ) {
        let builder = ParameterizedQueryBuilder::new();
        apply(&builder, &before);
        let snapshot = builder.create_query();
        let text = snapshot.text().to_string();
        let parameters = snapshot.parameters().to_vec();

        apply(&builder, &after);

        prop_assert_eq!(snapshot.text(), text.as_str());
        prop_assert_eq!(snapshot.parameters(), parameters.as_slice());
    }
}

// ============================================================================
// Concurrency Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// M concurrent parameter appends give M well-formed placeholders
    #[test]
    fn test_concurrent_append_consistency(threads in 1usize..16) {
        let builder = ParameterizedQueryBuilder::new();
        std::thread::scope(|scope| {
            for i in 0..threads {
                let builder = &builder;
                scope.spawn(move || {
                    builder.append_parameter(&(i as i64)).unwrap();
                });
            }
        });

        let query = builder.create_query();
        prop_assert_eq!(query.parameters().len(), threads);

        let indices = placeholder_indices(query.text()).unwrap();
        prop_assert_eq!(indices, (0..threads).collect::<Vec<_>>());

        let mut seen: Vec<i64> = query
            .parameters()
            .iter()
            .map(|p| p.value().as_long().unwrap())
            .collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..threads as i64).collect::<Vec<_>>());
    }
}

// ============================================================================
// Value Conversion Tests
// ============================================================================

proptest! {
    /// Unsigned 64-bit values convert exactly when they fit in i64
    #[test]
    fn test_u64_conversion(value in any::<u64>()) {
        let converted = convert_value(&value);
        if value <= i64::MAX as u64 {
            prop_assert_eq!(converted.unwrap(), DatabaseValue::Long(value as i64));
        } else {
            prop_assert!(converted.is_err());
        }
    }

    /// Optional values convert to NULL or the inner value
    #[test]
    fn test_option_conversion(value in prop::option::of(any::<i32>())) {
        let converted = convert_value(&value).unwrap();
        match value {
            Some(v) => prop_assert_eq!(converted, DatabaseValue::Int(v)),
            None => prop_assert!(converted.is_null()),
        }
    }
}
