//! JSON encoding for documents.
//!
//! Encoding goes through `serde_json::Value`. Floats always serialize with a
//! fractional part or exponent (`1.0`, not `1`), so the integer/float kind
//! of every field survives a round trip.

use serde_json::{Map, Number};

use super::{Document, Value};
use crate::error::{Error, Result};

/// Serializes a document to JSON bytes
pub fn encode(doc: &Document) -> Result<Vec<u8>> {
    let json = document_to_json(doc)?;
    serde_json::to_vec(&json).map_err(Error::encode)
}

/// Parses JSON bytes into a document
///
/// The top level must be a JSON object.
pub fn decode(bytes: &[u8]) -> Result<Document> {
    match serde_json::from_slice(bytes)? {
        serde_json::Value::Object(map) => map_to_document(map),
        other => Err(Error::decode(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

fn document_to_json(doc: &Document) -> Result<serde_json::Value> {
    let mut map = Map::with_capacity(doc.len());
    for (field, value) in doc {
        map.insert(field.clone(), value_to_json(value)?);
    }
    Ok(serde_json::Value::Object(map))
}

fn value_to_json(value: &Value) -> Result<serde_json::Value> {
    let json = match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => match Number::from_f64(*f) {
            Some(n) => serde_json::Value::Number(n),
            None => return Err(Error::encode(format!("non-finite float {}", f))),
        },
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => {
            serde_json::Value::Array(items.iter().map(value_to_json).collect::<Result<_>>()?)
        }
        Value::Document(doc) => document_to_json(doc)?,
    };
    Ok(json)
}

fn map_to_document(map: Map<String, serde_json::Value>) -> Result<Document> {
    map.into_iter()
        .map(|(field, json)| Ok((field, json_to_value(json)?)))
        .collect()
}

fn json_to_value(json: serde_json::Value) -> Result<Value> {
    let value = match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => number_to_value(&n)?,
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::List(items.into_iter().map(json_to_value).collect::<Result<_>>()?)
        }
        serde_json::Value::Object(map) => Value::Document(map_to_document(map)?),
    };
    Ok(value)
}

fn number_to_value(n: &Number) -> Result<Value> {
    if let Some(i) = n.as_i64() {
        Ok(Value::Int(i))
    } else if n.is_u64() {
        Err(Error::decode(format!("integer {} out of range", n)))
    } else {
        n.as_f64()
            .map(Value::Float)
            .ok_or_else(|| Error::decode(format!("unrepresentable number {}", n)))
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
