//! Keyed persistent store for the panel configuration. The store is a small
//! get/set interface injected into the app so tests can swap the file-backed
//! implementation for an in-memory one.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Storage key the panel configuration is saved under.
pub const CFG_STORAGE_KEY: &str = "benq_cfg";

/// User-editable panel configuration. Field names match the wire format the
/// backend expects inside the `cfg` member of every request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    pub ip: String,
    pub port: u16,
    pub wrapcr: bool,
}

/// Minimal keyed string store.
pub trait ConfigStore {
    /// Returns the stored value, or `None` if the key has never been written.
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Durably writes `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// File-backed store: one JSON file per key under a single directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create store directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Default store location, `<config dir>/benqctl`.
    pub fn default_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|base| base.join("benqctl"))
            .ok_or_else(|| anyhow!("could not determine a configuration directory"))
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl ConfigStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read '{}'", path.display()))
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key);
        fs::write(&path, value)
            .with_context(|| format!("failed to write '{}'", path.display()))
    }
}

/// In-memory store used by tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemStore {
    entries: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl ConfigStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
