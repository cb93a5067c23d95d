//! # Store Module
//!
//! The engine facade: one method per externally visible action. Documents
//! arrive either as [`Document`] values or as encoded bytes, and results are
//! returned as the encoded bytes actually stored. Scans return matching
//! documents concatenated in creation order.

use bytes::Bytes;
use std::sync::Arc;

use crate::config::Config;
use crate::document::{self, Document, Value, ID_FIELD};
use crate::error::{Error, Result};
use crate::id::{DocumentId, LookupKey};
use crate::query::matches;
use crate::storage::{Database, Registry};
use crate::update::{merge_update, UpdateRequest};

/// Document store over a registry of open databases
pub struct Store {
    registry: Arc<Registry>,
}

impl Store {
    /// Creates a store with its own registry
    pub fn open(config: Config) -> Self {
        Self::with_registry(Arc::new(Registry::new(config)))
    }

    /// Creates a store sharing an existing registry
    ///
    /// Stores on one registry also share its identifier generator, so their
    /// inserts into a collection stay in creation order.
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The registry of open databases
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn database(&self, db: &str) -> Result<Database> {
        self.registry.open(db)
    }

    /// Opens (creating if needed) database `db`
    pub fn create_database(&self, db: &str) -> Result<()> {
        self.database(db).map(|_| ())
    }

    /// Closes database `db` and removes its storage file
    ///
    /// The next operation naming `db` starts from an empty database.
    pub fn delete_database(&self, db: &str) -> Result<()> {
        self.registry.remove(db)
    }

    /// Names of the collections currently in database `db`
    pub fn collections(&self, db: &str) -> Result<Vec<String>> {
        self.database(db)?.collections()
    }

    /// Inserts a document, assigning an `_id` if it has none
    ///
    /// An existing string `_id` must be a time-based identifier and is stored
    /// in its canonical lowercase hyphenated form; inserting with the `_id`
    /// of a stored document replaces it.
    pub fn insert(&self, db: &str, collection: &str, mut doc: Document) -> Result<Bytes> {
        let key = match doc.id() {
            None => {
                let (id, key) = self.registry.ids().generate()?;
                doc.insert(ID_FIELD, id.to_string());
                key
            }
            Some(Value::String(id)) => {
                let id = DocumentId::parse(id).map_err(|_| Error::InvalidDocumentId)?;
                doc.insert(ID_FIELD, id.to_string());
                id.lookup_key()
            }
            Some(_) => return Err(Error::InvalidDocumentId),
        };

        let encoded = document::encode(&doc)?;
        self.database(db)?.put(collection, key.as_bytes(), &encoded)?;
        log::debug!("Inserted {}/{} {}", db, collection, key.document_id());
        Ok(Bytes::from(encoded))
    }

    /// [`insert`](Self::insert) for an encoded document
    pub fn insert_bytes(&self, db: &str, collection: &str, doc: &[u8]) -> Result<Bytes> {
        self.insert(db, collection, document::decode(doc)?)
    }

    /// Returns the stored bytes of a document, or `None` if absent
    pub fn find_by_id(&self, db: &str, collection: &str, id: &str) -> Result<Option<Bytes>> {
        let key = crate::id::parse(id)?;
        let found = self.database(db)?.get(collection, key.as_bytes())?;
        Ok(found.map(Bytes::from))
    }

    /// Visits every document of a collection in creation order
    ///
    /// The handler receives the lookup key, the stored bytes and the decoded
    /// document. A document that fails to decode aborts the scan.
    pub fn scan<F>(&self, db: &str, collection: &str, mut handler: F) -> Result<()>
    where
        F: FnMut(LookupKey, &[u8], &Document) -> Result<()>,
    {
        self.database(db)?.scan(collection, |key, value| {
            let doc = document::decode(value)?;
            handler(LookupKey::from_slice(key)?, value, &doc)
        })
    }

    /// Concatenates the stored bytes of every document matching `query`
    pub fn query(&self, db: &str, collection: &str, query: &Document) -> Result<Bytes> {
        if let Some(key) = id_lookup(query) {
            let found = self.database(db)?.get(collection, key.as_bytes())?;
            return match found {
                Some(value) if matches(&document::decode(&value)?, query) => {
                    Ok(Bytes::from(value))
                }
                _ => Ok(Bytes::new()),
            };
        }

        let mut docs = Vec::new();
        self.scan(db, collection, |_, value, doc| {
            if matches(doc, query) {
                docs.extend_from_slice(value);
            }
            Ok(())
        })?;
        Ok(Bytes::from(docs))
    }

    /// [`query`](Self::query) for an encoded query document
    pub fn query_bytes(&self, db: &str, collection: &str, query: &[u8]) -> Result<Bytes> {
        self.query(db, collection, &document::decode(query)?)
    }

    /// Merges `update` into the document `id` and returns the new bytes
    ///
    /// Fails with [`Error::NotFound`] if the document does not exist; nothing
    /// is written in that case.
    pub fn update_by_id(
        &self,
        db: &str,
        collection: &str,
        id: &str,
        update: &Document,
    ) -> Result<Bytes> {
        check_update(update)?;
        let key = crate::id::parse(id)?;
        let updated = self
            .database(db)?
            .update(collection, key.as_bytes(), |original| match original {
                Some(original) => merge_update(original, update).map(Some),
                None => Err(Error::NotFound(id.to_string())),
            })?;
        updated
            .map(Bytes::from)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Merges `update` into every document matching `query`, in one write
    /// transaction, and concatenates the new bytes in creation order
    pub fn update_by_query(
        &self,
        db: &str,
        collection: &str,
        query: &Document,
        update: &Document,
    ) -> Result<Bytes> {
        check_update(update)?;
        let database = self.database(db)?;

        if let Some(key) = id_lookup(query) {
            let updated = database.update(collection, key.as_bytes(), |original| {
                let Some(original) = original else {
                    return Ok(None);
                };
                if !matches(&document::decode(original)?, query) {
                    return Ok(None);
                }
                merge_update(original, update).map(Some)
            })?;
            return Ok(updated.map(Bytes::from).unwrap_or_default());
        }

        let updated = database.update_scan(collection, |_, value| {
            let doc = document::decode(value)?;
            if !matches(&doc, query) {
                return Ok(None);
            }
            merge_update(value, update).map(Some)
        })?;
        Ok(Bytes::from(updated.concat()))
    }

    /// [`update_by_query`](Self::update_by_query) for an encoded
    /// `{"query": {...}, "update": {...}}` request
    pub fn update_by_query_bytes(&self, db: &str, collection: &str, request: &[u8]) -> Result<Bytes> {
        let request = UpdateRequest::decode(request)?;
        self.update_by_query(db, collection, &request.query, &request.update)
    }

    /// Removes the document `id`; returns whether it existed
    pub fn delete_by_id(&self, db: &str, collection: &str, id: &str) -> Result<bool> {
        let key = crate::id::parse(id)?;
        self.database(db)?.delete(collection, key.as_bytes())
    }
}

fn check_update(update: &Document) -> Result<()> {
    if update.contains_key(ID_FIELD) {
        return Err(Error::ImmutableId);
    }
    Ok(())
}

/// A query naming a single well-formed `_id` can go straight to its key
///
/// The only document that can match sits under that key, and it is still
/// checked against the whole query, `_id` string included, so the result is
/// the same as the full scan's. Anything else in `_id` (a list of ids, a
/// malformed string) is left to the scan.
fn id_lookup(query: &Document) -> Option<LookupKey> {
    match query.id() {
        Some(Value::String(id)) => crate::id::parse(id).ok(),
        _ => None,
    }
}
