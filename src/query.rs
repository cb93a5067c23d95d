//! # Query Matcher
//!
//! A query is itself a [`Document`]. A document matches when every field of
//! the query is present in the document and the values match; extra fields
//! in the document are ignored, so the empty query matches everything.
//!
//! ## Value Rules
//! 1. Same scalar kind: native equality. `Int` and `Float` are different
//!    kinds, so `1` never matches `1.0`.
//! 2. Two documents: recursive subset match.
//! 3. Two lists: same length and positional match.
//! 4. A list against a non-list: the list must contain a matching element.
//!    This covers both "field is one of these" (list in the query) and
//!    "array field contains this" (list in the document).
//! 5. Anything else, including `Null`, never matches.

use crate::document::{Document, Value};

/// Whether `doc` satisfies `query`
pub fn matches(doc: &Document, query: &Document) -> bool {
    query.iter().all(|(field, query_value)| {
        doc.get(field)
            .map_or(false, |doc_value| value_matches(doc_value, query_value))
    })
}

/// Whether a single document value satisfies a query value
pub fn value_matches(doc_value: &Value, query_value: &Value) -> bool {
    match (doc_value, query_value) {
        (Value::Bool(d), Value::Bool(q)) => d == q,
        (Value::Int(d), Value::Int(q)) => d == q,
        (Value::Float(d), Value::Float(q)) => d == q,
        (Value::String(d), Value::String(q)) => d == q,
        (Value::Document(d), Value::Document(q)) => matches(d, q),
        (Value::List(d), Value::List(q)) => {
            d.len() == q.len() && d.iter().zip(q).all(|(d, q)| value_matches(d, q))
        }
        (_, Value::List(q)) => q.iter().any(|q| value_matches(doc_value, q)),
        (Value::List(d), _) => d.iter().any(|d| value_matches(d, query_value)),
        _ => false,
    }
}
