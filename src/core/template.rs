//! Placeholder template codec
//!
//! Query text is stored as a template where a parameter reference is written
//! `#N#` (`N` being the zero-based parameter index) and a literal `#` is
//! written `##`. Builders encode with [`escape_text`] and [`placeholder`];
//! translators decode with [`parse_template`].

use super::error::{DatabaseError, Result};
use std::borrow::Cow;

/// Placeholder delimiter
pub const DELIMITER: char = '#';

/// One decoded piece of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    /// Literal query text with escapes already collapsed
    Literal(String),
    /// Reference to the parameter at this index
    Parameter(usize),
}

/// Escape literal text so that every `#` becomes `##`
pub fn escape_text(text: &str) -> Cow<'_, str> {
    if text.contains(DELIMITER) {
        Cow::Owned(text.replace('#', "##"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Reverse [`escape_text`] on text that holds no placeholders
pub fn unescape_text(text: &str) -> String {
    text.replace("##", "#")
}

/// Render the placeholder token for a parameter index
pub fn placeholder(index: usize) -> String {
    format!("#{}#", index)
}

/// Decode a template into literal and parameter segments
///
/// Adjacent literal text is merged into a single segment.
///
/// # Errors
///
/// Returns [`DatabaseError::MalformedQuery`] when a `#` is neither doubled
/// nor the start of a `#<digits>#` token.
pub fn parse_template(text: &str) -> Result<Vec<TemplateSegment>> {
    Ok(scan(text)?.into_iter().map(|(_, segment)| segment).collect())
}

/// Placeholders of a template as `(byte offset, parameter index)` pairs
pub fn placeholder_spans(text: &str) -> Result<Vec<(usize, usize)>> {
    Ok(scan(text)?
        .into_iter()
        .filter_map(|(offset, segment)| match segment {
            TemplateSegment::Parameter(index) => Some((offset, index)),
            TemplateSegment::Literal(_) => None,
        })
        .collect())
}

/// Segments paired with the byte offset where each one starts
fn scan(text: &str) -> Result<Vec<(usize, TemplateSegment)>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut literal_offset = 0;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'#' {
            i += 1;
            continue;
        }

        literal.push_str(&text[start..i]);

        if bytes.get(i + 1) == Some(&b'#') {
            literal.push(DELIMITER);
            i += 2;
            start = i;
            continue;
        }

        let digits_start = i + 1;
        let mut end = digits_start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }

        if end == digits_start {
            return Err(DatabaseError::malformed(
                i,
                "expected a parameter index or an escaped '#'",
            ));
        }
        if bytes.get(end) != Some(&b'#') {
            return Err(DatabaseError::malformed(
                i,
                "unterminated parameter placeholder",
            ));
        }

        let index = text[digits_start..end]
            .parse::<usize>()
            .map_err(|_| DatabaseError::malformed(i, "parameter index out of range"))?;

        if !literal.is_empty() {
            segments.push((literal_offset, TemplateSegment::Literal(std::mem::take(&mut literal))));
        }
        segments.push((i, TemplateSegment::Parameter(index)));

        i = end + 1;
        start = i;
        literal_offset = i;
    }

    literal.push_str(&text[start..]);
    if !literal.is_empty() {
        segments.push((literal_offset, TemplateSegment::Literal(literal)));
    }

    Ok(segments)
}

/// Parameter indices referenced by a template, in order of appearance
pub fn placeholder_indices(text: &str) -> Result<Vec<usize>> {
    Ok(placeholder_spans(text)?
        .into_iter()
        .map(|(_, index)| index)
        .collect())
}
