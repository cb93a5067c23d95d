//! A minimal embedded document store.
//!
//! Collections of JSON documents live in LMDB buckets, one LMDB file per
//! database. Documents are keyed by time-ordered identifiers, so a bucket's
//! natural key order is creation order. The engine supports insert,
//! lookup by id, predicate-filtered scans and merge updates.
//!
//! ```no_run
//! use docstore::{config::Config, Store};
//!
//! let store = Store::open(Config::new().root_dir("/tmp/docstore"));
//! let stored = store.insert_bytes("app", "users", br#"{"name": "a"}"#)?;
//! let matching = store.query_bytes("app", "users", br#"{"name": "a"}"#)?;
//! assert_eq!(stored, matching);
//! # Ok::<(), docstore::error::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod document;
pub mod error;
pub mod id;
pub mod query;
pub mod storage;
pub mod store;
pub mod update;

pub use document::{Document, Value};
pub use error::{Error, Result};
pub use id::{DocumentId, LookupKey};
pub use storage::Registry;
pub use store::Store;
