//! # Update Engine
//!
//! Updates are shallow: every top-level field of the update document
//! replaces (or adds) the same field on the stored document. Nested
//! documents are replaced wholesale. `_id` can never be updated.

use crate::document::{self, Document, Value, ID_FIELD};
use crate::error::{Error, Result};

/// Merges `update` onto the encoded `original` and re-encodes the result
pub fn merge_update(original: &[u8], update: &Document) -> Result<Vec<u8>> {
    if update.contains_key(ID_FIELD) {
        return Err(Error::ImmutableId);
    }
    let mut doc = document::decode(original)?;
    for (field, value) in update {
        doc.insert(field.clone(), value.clone());
    }
    document::encode(&doc)
}

/// A query/update pair as submitted for update-by-query
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    /// Selects the documents to update
    pub query: Document,
    /// Fields to set on each selected document
    pub update: Document,
}

impl UpdateRequest {
    /// Decodes an envelope of the form `{"query": {...}, "update": {...}}`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut envelope = document::decode(bytes)?;
        let query = match envelope.remove("query") {
            Some(Value::Document(query)) => query,
            _ => return Err(Error::invalid_argument("Cannot update without a query")),
        };
        let update = match envelope.remove("update") {
            Some(Value::Document(update)) => update,
            _ => {
                return Err(Error::invalid_argument(
                    "Cannot update without an update object",
                ))
            }
        };
        Ok(Self { query, update })
    }
}
