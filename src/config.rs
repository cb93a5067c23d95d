use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::Result;

/// Configuration for the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one `<name>.db` file per database
    pub root_dir: PathBuf,

    /// Maximum size in bytes a single database file may grow to
    pub map_size: usize,

    /// Maximum number of collections (named buckets) per database
    pub max_collections: u32,

    /// Maximum number of concurrent read transactions per database
    pub max_readers: u32,

    /// Whether to sync writes to disk on every commit
    pub sync: bool,

    /// Whether to create the root directory if it doesn't exist
    pub create_if_missing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("docstore_data"),
            map_size: 1024 * 1024 * 1024, // 1GB
            max_collections: 128,
            max_readers: 126,
            sync: true,
            create_if_missing: true,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a TOML file; missing keys take defaults
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Set the root directory
    pub fn root_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.root_dir = path.into();
        self
    }

    /// Set the maximum database file size in bytes
    pub fn map_size(mut self, size: usize) -> Self {
        self.map_size = size;
        self
    }

    /// Set the maximum number of collections per database
    pub fn max_collections(mut self, n: u32) -> Self {
        self.max_collections = n;
        self
    }

    /// Set the maximum number of concurrent readers per database
    pub fn max_readers(mut self, n: u32) -> Self {
        self.max_readers = n;
        self
    }

    /// Enable or disable sync writes
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Enable or disable creating the root directory if it doesn't exist
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Path of the storage file backing database `name`
    pub fn db_path(&self, name: &str) -> PathBuf {
        self.root_dir.join(format!("{}.db", name))
    }
}
