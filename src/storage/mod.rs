//! Storage module for the document store
//!
//! Each database is one LMDB environment stored as a single file, and each
//! collection is a named LMDB database (a bucket) inside it. Buckets are
//! created inside the first write transaction that stores into them; reads
//! against a missing bucket see it as empty.
//!
//! Every operation here runs in exactly one LMDB transaction: read-only for
//! lookups and scans, read-write for puts and updates. LMDB serializes
//! writers per environment and gives readers a stable snapshot.

mod registry;

#[cfg(test)]
mod tests;

pub use registry::Registry;

use lmdb::{Cursor, DatabaseFlags, Environment, RwTransaction, Transaction, WriteFlags};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::{Error, Result};

/// An open LMDB environment
///
/// LMDB allows only one transaction at a time to open named databases, and a
/// write transaction that creates one holds that right until it finishes.
/// `open_lock` serializes every bucket open on this environment.
pub(crate) struct Handle {
    env: Environment,
    open_lock: Mutex<()>,
}

impl Handle {
    pub(crate) fn new(env: Environment) -> Self {
        Self {
            env,
            open_lock: Mutex::new(()),
        }
    }
}

/// An open database handle
#[derive(Clone)]
pub struct Database {
    name: String,
    handle: Arc<Handle>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish()
    }
}

impl Database {
    pub(crate) fn new(name: &str, handle: Arc<Handle>) -> Self {
        Self {
            name: name.to_string(),
            handle,
        }
    }

    /// Name of the database
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether both values share one underlying environment
    pub fn same_handle(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }

    fn env(&self) -> &Environment {
        &self.handle.env
    }

    /// Opens an existing bucket
    fn bucket(&self, collection: &str) -> Result<Option<lmdb::Database>> {
        validate_collection(collection)?;
        let _open = self.handle.open_lock.lock();
        match self.env().open_db(Some(collection)) {
            Ok(bucket) => Ok(Some(bucket)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(Error::Storage(e)),
        }
    }

    /// Runs `f` in one write transaction on the bucket, creating the bucket
    /// inside that same transaction when it does not exist yet
    ///
    /// The transaction commits only when `f` returns `Some`. On `None` or an
    /// error it is aborted, which also discards a bucket created for it.
    fn write<T, F>(&self, collection: &str, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut RwTransaction<'_>, lmdb::Database) -> Result<Option<T>>,
    {
        if let Some(bucket) = self.bucket(collection)? {
            let mut txn = self.env().begin_rw_txn()?;
            let out = f(&mut txn, bucket)?;
            if out.is_some() {
                txn.commit()?;
            }
            return Ok(out);
        }

        let _open = self.handle.open_lock.lock();
        let mut txn = self.env().begin_rw_txn()?;
        // SAFETY: `open_lock` is held until `txn` is committed or dropped, so
        // no other transaction opens a database on this environment meanwhile.
        let bucket = unsafe { txn.create_db(Some(collection), DatabaseFlags::empty())? };
        let out = f(&mut txn, bucket)?;
        if out.is_some() {
            txn.commit()?;
            log::debug!("Created bucket {}/{}", self.name, collection);
        }
        Ok(out)
    }

    /// Names of all collections in this database, sorted
    pub fn collections(&self) -> Result<Vec<String>> {
        let main = {
            let _open = self.handle.open_lock.lock();
            self.env().open_db(None)?
        };
        let txn = self.env().begin_ro_txn()?;
        let mut names = Vec::new();
        {
            let mut cursor = txn.open_ro_cursor(main)?;
            for (key, _) in cursor.iter() {
                if let Ok(name) = std::str::from_utf8(key) {
                    names.push(name.to_string());
                }
            }
        }
        txn.commit()?;
        Ok(names)
    }

    /// Reads the value stored under `key`
    ///
    /// A missing bucket or key is `Ok(None)`.
    pub fn get(&self, collection: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(bucket) = self.bucket(collection)? else {
            return Ok(None);
        };
        let txn = self.env().begin_ro_txn()?;
        let value = match txn.get(bucket, &key) {
            Ok(value) => Some(value.to_vec()),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(Error::Storage(e)),
        };
        txn.commit()?;
        Ok(value)
    }

    /// Stores `value` under `key`, creating the bucket if needed
    pub fn put(&self, collection: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(collection, |txn, bucket| {
            txn.put(bucket, &key, &value, WriteFlags::empty())?;
            Ok(Some(()))
        })?;
        Ok(())
    }

    /// Removes `key`; returns whether it was present
    pub fn delete(&self, collection: &str, key: &[u8]) -> Result<bool> {
        let Some(bucket) = self.bucket(collection)? else {
            return Ok(false);
        };
        let mut txn = self.env().begin_rw_txn()?;
        let found = match txn.del(bucket, &key, None) {
            Ok(()) => true,
            Err(lmdb::Error::NotFound) => false,
            Err(e) => return Err(Error::Storage(e)),
        };
        txn.commit()?;
        Ok(found)
    }

    /// Read-modify-write of a single key in one write transaction
    ///
    /// `f` sees the current value (or `None`) and returns the replacement, or
    /// `None` to leave the key untouched. The bucket is only created when a
    /// replacement is stored. Any error from `f` aborts the transaction.
    pub fn update<F>(&self, collection: &str, key: &[u8], f: F) -> Result<Option<Vec<u8>>>
    where
        F: FnOnce(Option<&[u8]>) -> Result<Option<Vec<u8>>>,
    {
        self.write(collection, |txn, bucket| {
            let value = match txn.get(bucket, &key) {
                Ok(current) => f(Some(current))?,
                Err(lmdb::Error::NotFound) => f(None)?,
                Err(e) => return Err(Error::Storage(e)),
            };
            if let Some(value) = &value {
                txn.put(bucket, &key, value, WriteFlags::empty())?;
            }
            Ok(value)
        })
    }

    /// Visits every entry of a bucket in key order under one read transaction
    ///
    /// Stops at, and returns, the first error from `f`.
    pub fn scan<F>(&self, collection: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<()>,
    {
        let Some(bucket) = self.bucket(collection)? else {
            return Ok(());
        };
        let txn = self.env().begin_ro_txn()?;
        {
            let mut cursor = txn.open_ro_cursor(bucket)?;
            for (key, value) in cursor.iter() {
                f(key, value)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Visits every entry in key order under one write transaction and
    /// stores the replacements `f` returns
    ///
    /// Replacements are applied after the cursor finishes but before commit,
    /// so readers see either none or all of them. Returns the replacement
    /// values in key order.
    pub fn update_scan<F>(&self, collection: &str, mut f: F) -> Result<Vec<Vec<u8>>>
    where
        F: FnMut(&[u8], &[u8]) -> Result<Option<Vec<u8>>>,
    {
        let Some(bucket) = self.bucket(collection)? else {
            return Ok(Vec::new());
        };
        let mut txn = self.env().begin_rw_txn()?;
        let mut updates = Vec::new();
        {
            let mut cursor = txn.open_ro_cursor(bucket)?;
            for (key, value) in cursor.iter() {
                if let Some(updated) = f(key, value)? {
                    updates.push((key.to_vec(), updated));
                }
            }
        }
        for (key, value) in &updates {
            txn.put(bucket, key, value, WriteFlags::empty())?;
        }
        txn.commit()?;
        log::debug!(
            "Updated {} entries in {}/{}",
            updates.len(),
            self.name,
            collection
        );
        Ok(updates.into_iter().map(|(_, value)| value).collect())
    }
}

fn validate_collection(collection: &str) -> Result<()> {
    if collection.is_empty() || collection.contains('\0') {
        return Err(Error::invalid_argument(format!(
            "invalid collection name {:?}",
            collection
        )));
    }
    Ok(())
}
