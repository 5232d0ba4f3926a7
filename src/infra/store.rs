//! Key/value stores backing session persistence.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, RwLock},
};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::application::ports::KeyValueStore;

use super::error::InfraError;
use super::lock::{mutex_lock, rw_read, rw_write};

const SOURCE: &str = "infra::store";

/// Process-local store; contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        rw_read(&self.values, SOURCE, "memory_get").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        rw_write(&self.values, SOURCE, "memory_set").insert(key.to_string(), value.to_string());
    }
}

/// Store persisted as a single JSON object. Every update replaces the file
/// through a rename, so a reader sees either the old or the new session.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, InfraError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|err| {
                InfraError::storage(format!("failed to parse `{}`: {err}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(InfraError::Io(err)),
        };
        debug!(path = %path.display(), keys = values.len(), "opened session store");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<(), InfraError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let body = serde_json::to_string_pretty(values)
            .map_err(|err| InfraError::storage(format!("failed to encode session: {err}")))?;

        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(body.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|err| InfraError::Io(err.error))?;
        Ok(())
    }

    fn write(&self, entries: &[(&str, &str)]) {
        let mut values = mutex_lock(&self.values, SOURCE, "file_write");
        for (key, value) in entries {
            values.insert((*key).to_string(), (*value).to_string());
        }
        if let Err(err) = self.flush(&values) {
            warn!(
                path = %self.path.display(),
                keys = entries.len(),
                error = %err,
                "failed to persist session values"
            );
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        mutex_lock(&self.values, SOURCE, "file_get").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.write(&[(key, value)]);
    }

    fn set_many(&self, entries: &[(&str, &str)]) {
        self.write(entries);
    }
}
