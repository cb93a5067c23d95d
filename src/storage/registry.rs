//! # Handle Registry
//!
//! Keeps at most one open LMDB environment per database name. The outer map
//! lock is only held long enough to find a name's slot; opening, closing and
//! removing a database happen under that slot's own lock, so work on one
//! name never waits on another. A slot leaves the map once its database is
//! closed and nobody else is waiting on it.
//!
//! The registry also owns the identifier generator, so every store sharing
//! it draws document ids from one monotonic clock.

use lmdb::{Environment, EnvironmentFlags};
use parking_lot::Mutex;
use std::{collections::HashMap, fs, io, path::Path, sync::Arc};

use super::{Database, Handle};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::id::IdGenerator;

type Slot = Arc<Mutex<Option<Arc<Handle>>>>;

/// Process-wide cache of open databases, keyed by name
pub struct Registry {
    config: Config,
    slots: Mutex<HashMap<String, Slot>>,
    ids: IdGenerator,
}

impl Registry {
    /// Creates an empty registry; no files are touched until a database is opened
    pub fn new(config: Config) -> Self {
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
            ids: IdGenerator::new(),
        }
    }

    /// The configuration databases are opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The identifier generator shared by everything using this registry
    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    fn slot(&self, name: &str) -> Slot {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(name.to_string()).or_default())
    }

    /// Drops `slot` from the map if it is empty and only the map and the
    /// caller still hold it
    ///
    /// Must be called with the slot's lock held so it cannot be refilled.
    fn release(&self, name: &str, slot: &Slot, cached: &Option<Arc<Handle>>) {
        if cached.is_some() {
            return;
        }
        let mut slots = self.slots.lock();
        let unused = slots
            .get(name)
            .map_or(false, |current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2);
        if unused {
            slots.remove(name);
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns the open handle for `name`, opening (and creating) it on first use
    pub fn open(&self, name: &str) -> Result<Database> {
        validate_name(name)?;
        let slot = self.slot(name);
        let mut cached = slot.lock();
        if let Some(handle) = &*cached {
            return Ok(Database::new(name, Arc::clone(handle)));
        }

        let opened = match self.open_env(name) {
            Ok(env) => Arc::new(Handle::new(env)),
            Err(e) => {
                self.release(name, &slot, &cached);
                return Err(e);
            }
        };
        log::info!("Opened database {} at {}", name, self.config.db_path(name).display());
        *cached = Some(Arc::clone(&opened));
        Ok(Database::new(name, opened))
    }

    fn open_env(&self, name: &str) -> Result<Environment> {
        if self.config.create_if_missing {
            fs::create_dir_all(&self.config.root_dir)?;
        }

        let mut flags = EnvironmentFlags::NO_SUB_DIR | EnvironmentFlags::NO_TLS;
        if !self.config.sync {
            flags.insert(EnvironmentFlags::NO_SYNC);
            flags.insert(EnvironmentFlags::NO_META_SYNC);
        }

        let env = Environment::new()
            .set_flags(flags)
            .set_map_size(self.config.map_size)
            .set_max_dbs(self.config.max_collections)
            .set_max_readers(self.config.max_readers)
            .open_with_permissions(&self.config.db_path(name), 0o600)?;
        Ok(env)
    }

    /// Closes the handle for `name`; returns whether one was open
    ///
    /// Transactions already running on the handle finish first, since they
    /// keep the environment alive.
    pub fn close(&self, name: &str) -> bool {
        let slot = self.slot(name);
        let mut cached = slot.lock();
        let closed = cached.take().is_some();
        self.release(name, &slot, &cached);
        if closed {
            log::info!("Closed database {}", name);
        }
        closed
    }

    /// Closes the handle for `name` and deletes its storage files
    pub fn remove(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let slot = self.slot(name);
        let mut cached = slot.lock();
        cached.take();

        let path = self.config.db_path(name);
        let removed = remove_file(&path).and_then(|()| remove_file(&lock_path(&path)));
        self.release(name, &slot, &cached);
        removed?;
        log::info!("Removed database {}", name);
        Ok(())
    }

    /// Whether a handle for `name` is currently cached
    pub fn is_open(&self, name: &str) -> bool {
        let slot = self.slots.lock().get(name).cloned();
        slot.map_or(false, |slot| slot.lock().is_some())
    }

    /// Names of all currently open databases, sorted
    pub fn names(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = self
            .slots
            .lock()
            .iter()
            .map(|(name, slot)| (name.clone(), Arc::clone(slot)))
            .collect();
        let mut names: Vec<String> = slots
            .into_iter()
            .filter(|(_, slot)| slot.lock().is_some())
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names
    }

    /// Closes every open database
    pub fn close_all(&self) {
        let slots: Vec<Slot> = self.slots.lock().drain().map(|(_, slot)| slot).collect();
        for slot in slots {
            slot.lock().take();
        }
        log::debug!("Closed all databases");
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.close_all();
    }
}

fn lock_path(path: &Path) -> std::path::PathBuf {
    let mut lock = path.as_os_str().to_owned();
    lock.push("-lock");
    lock.into()
}

fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("Nothing to remove at {}", path.display());
            Ok(())
        }
        Err(e) => Err(Error::Io(e)),
    }
}

/// Database names become file names under the root directory
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
    {
        return Err(Error::invalid_argument(format!(
            "invalid database name {:?}",
            name
        )));
    }
    Ok(())
}
