//! Unit tests for the bucket-level storage operations
//!
//! These tests verify:
//! - Lazy bucket creation on write and empty reads of missing buckets
//! - Cursor walks over empty buckets and an empty database
//! - Key-ordered cursor scans
//! - Read-modify-write and update-scan transactions, including aborts
//!
//! Tests use temporary directories that are automatically cleaned up.

use crate::config::Config;
use crate::error::Error as StoreError;
use crate::storage::{Database, Registry};
use std::error::Error;

fn open(dir: &tempfile::TempDir) -> Result<(Registry, Database), Box<dyn Error>> {
    let registry = Registry::new(
        Config::new()
            .root_dir(dir.path())
            .map_size(10 * 1024 * 1024)
            .max_collections(8)
            .sync(false),
    );
    let db = registry.open("test")?;
    Ok((registry, db))
}

/// Reads against a bucket that was never written see nothing
#[test]
fn test_missing_bucket_reads_empty() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let (_registry, db) = open(&temp_dir)?;

    assert_eq!(db.get("nothing", b"key")?, None);
    let mut seen = 0;
    db.scan("nothing", |_, _| {
        seen += 1;
        Ok(())
    })?;
    assert_eq!(seen, 0);
    assert!(!db.delete("nothing", b"key")?);
    assert!(db.collections()?.is_empty());

    Ok(())
}

/// Tests put, get and delete on a lazily created bucket
#[test]
fn test_put_get_delete() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let (_registry, db) = open(&temp_dir)?;

    db.put("c", b"key1", b"value1")?;
    db.put("c", b"key2", b"value2")?;
    assert_eq!(db.get("c", b"key1")?, Some(b"value1".to_vec()));
    assert_eq!(db.get("c", b"missing")?, None);

    // overwrite
    db.put("c", b"key1", b"value1b")?;
    assert_eq!(db.get("c", b"key1")?, Some(b"value1b".to_vec()));

    assert!(db.delete("c", b"key1")?);
    assert!(!db.delete("c", b"key1")?);
    assert_eq!(db.get("c", b"key1")?, None);

    assert_eq!(db.collections()?, vec!["c".to_string()]);

    Ok(())
}

/// Buckets are independent namespaces
#[test]
fn test_buckets_are_isolated() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let (_registry, db) = open(&temp_dir)?;

    db.put("a", b"k", b"in-a")?;
    db.put("b", b"k", b"in-b")?;
    assert_eq!(db.get("a", b"k")?, Some(b"in-a".to_vec()));
    assert_eq!(db.get("b", b"k")?, Some(b"in-b".to_vec()));
    assert_eq!(db.collections()?, vec!["a".to_string(), "b".to_string()]);

    Ok(())
}

/// Scans visit keys in ascending byte order regardless of insertion order
#[test]
fn test_scan_in_key_order() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let (_registry, db) = open(&temp_dir)?;

    for key in [b"k3", b"k1", b"k2"] {
        db.put("c", key, key)?;
    }

    let mut keys = Vec::new();
    db.scan("c", |key, value| {
        assert_eq!(key, value);
        keys.push(key.to_vec());
        Ok(())
    })?;
    assert_eq!(keys, vec![b"k1".to_vec(), b"k2".to_vec(), b"k3".to_vec()]);

    Ok(())
}

/// An error from the scan handler stops the scan and is returned
#[test]
fn test_scan_stops_on_error() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let (_registry, db) = open(&temp_dir)?;

    for i in 0..5u8 {
        db.put("c", &[i], &[i])?;
    }

    let mut visited = 0;
    let result = db.scan("c", |key, _| {
        visited += 1;
        if key == [2] {
            return Err(StoreError::decode("boom"));
        }
        Ok(())
    });
    assert!(matches!(result, Err(StoreError::Decode(_))));
    assert_eq!(visited, 3);

    Ok(())
}

/// Read-modify-write sees the current value and can leave it untouched
#[test]
fn test_update_single_key() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let (_registry, db) = open(&temp_dir)?;

    db.put("c", b"k", b"1")?;
    let updated = db.update("c", b"k", |current| {
        assert_eq!(current, Some(&b"1"[..]));
        Ok(Some(b"2".to_vec()))
    })?;
    assert_eq!(updated, Some(b"2".to_vec()));
    assert_eq!(db.get("c", b"k")?, Some(b"2".to_vec()));

    let untouched = db.update("c", b"other", |current| {
        assert!(current.is_none());
        Ok(None)
    })?;
    assert_eq!(untouched, None);
    assert_eq!(db.get("c", b"other")?, None);

    Ok(())
}

/// A failing update-scan writes nothing
#[test]
fn test_update_scan_is_atomic() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let (_registry, db) = open(&temp_dir)?;

    for i in 0..4u8 {
        db.put("c", &[i], b"old")?;
    }

    let result = db.update_scan("c", |key, _| {
        if key == [3] {
            return Err(StoreError::decode("boom"));
        }
        Ok(Some(b"new".to_vec()))
    });
    assert!(result.is_err());
    db.scan("c", |_, value| {
        assert_eq!(value, b"old");
        Ok(())
    })?;

    let updated = db.update_scan("c", |key, _| {
        Ok((key[0] % 2 == 0).then(|| b"new".to_vec()))
    })?;
    assert_eq!(updated.len(), 2);
    assert_eq!(db.get("c", &[0])?, Some(b"new".to_vec()));
    assert_eq!(db.get("c", &[1])?, Some(b"old".to_vec()));

    Ok(())
}

/// Collection names must be non-empty
#[test]
fn test_rejects_empty_collection() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let (_registry, db) = open(&temp_dir)?;

    assert!(matches!(
        db.put("", b"k", b"v"),
        Err(StoreError::InvalidArgument(_))
    ));

    Ok(())
}

/// Data survives closing and reopening the database
#[test]
fn test_persists_across_reopen() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let (registry, db) = open(&temp_dir)?;

    db.put("c", b"k", b"v")?;
    drop(db);
    assert!(registry.close("test"));

    let db = registry.open("test")?;
    assert_eq!(db.get("c", b"k")?, Some(b"v".to_vec()));

    Ok(())
}

/// Cursor walks over a bucket whose entries were all deleted see nothing
#[test]
fn test_emptied_bucket_scans_empty() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let (_registry, db) = open(&temp_dir)?;

    db.put("c", b"k", b"v")?;
    assert!(db.delete("c", b"k")?);

    let mut seen = 0;
    db.scan("c", |_, _| {
        seen += 1;
        Ok(())
    })?;
    assert_eq!(seen, 0);
    let updated = db.update_scan("c", |_, _| Ok(Some(b"new".to_vec())))?;
    assert!(updated.is_empty());
    assert_eq!(db.collections()?, vec!["c".to_string()]);

    Ok(())
}

/// An update that stores nothing does not leave an empty bucket behind
#[test]
fn test_update_without_write_creates_no_bucket() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let (_registry, db) = open(&temp_dir)?;

    let untouched = db.update("c", b"k", |current| {
        assert!(current.is_none());
        Ok(None)
    })?;
    assert_eq!(untouched, None);
    let failed = db.update("c", b"k", |_| Err(StoreError::NotFound("k".to_string())));
    assert!(matches!(failed, Err(StoreError::NotFound(_))));
    assert!(db.collections()?.is_empty());

    // a stored replacement creates the bucket in the same transaction
    let stored = db.update("c", b"k", |_| Ok(Some(b"v".to_vec())))?;
    assert_eq!(stored, Some(b"v".to_vec()));
    assert_eq!(db.get("c", b"k")?, Some(b"v".to_vec()));
    assert_eq!(db.collections()?, vec!["c".to_string()]);

    Ok(())
}

/// Concurrent first writes to fresh buckets all land
#[test]
fn test_concurrent_bucket_creation() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let (_registry, db) = open(&temp_dir)?;

    let handles: Vec<_> = (0..4u8)
        .map(|i| {
            let db = db.clone();
            std::thread::spawn(move || {
                let collection = format!("c{}", i % 2);
                db.put(&collection, &[i], &[i])
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer panicked")?;
    }

    assert_eq!(db.collections()?, vec!["c0".to_string(), "c1".to_string()]);
    assert_eq!(db.get("c0", &[2])?, Some(vec![2]));
    assert_eq!(db.get("c1", &[3])?, Some(vec![3]));

    Ok(())
}
