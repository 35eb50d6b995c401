use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const TASKS_KEY: &str = "tasks";
pub const THEME_KEY: &str = "theme";

/// Synchronous string-keyed storage the task snapshot and the theme live in.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One file per key inside `data_dir`, named after the key. The file holds
/// the stored value verbatim, so `tasks` is JSON and `theme` a bare word.
#[derive(Debug, Clone)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file store");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        validate_key(key)?;
        Ok(self.data_dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => {
                debug!(file = %path.display(), bytes = raw.len(), "read key");
                Ok(Some(raw))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed reading {}", path.display())),
        }
    }

    #[tracing::instrument(skip(self, value))]
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        write_atomic(&path, value).with_context(|| format!("failed to save key {key}"))
    }

    #[tracing::instrument(skip(self))]
    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed removing {}", path.display())),
        }
    }
}

fn validate_key(key: &str) -> anyhow::Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(anyhow!("invalid storage key: {key:?}"))
    }
}

#[tracing::instrument(skip(path, payload))]
fn write_atomic(path: &Path, payload: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), bytes = payload.len(), "saving atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(payload.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{FileStore, KeyValueStore, MemoryStore};

    #[test]
    fn file_store_reads_back_what_it_wrote() {
        let temp = tempdir().expect("tempdir");
        let mut store = FileStore::open(&temp.path().join("nested")).expect("open store");

        assert_eq!(store.get("tasks").expect("get"), None);
        store.set("tasks", "[]").expect("set");
        assert_eq!(store.get("tasks").expect("get").as_deref(), Some("[]"));

        store.set("tasks", "[1]").expect("overwrite");
        assert_eq!(store.get("tasks").expect("get").as_deref(), Some("[1]"));

        store.remove("tasks").expect("remove");
        store.remove("tasks").expect("remove twice");
        assert_eq!(store.get("tasks").expect("get"), None);
    }

    #[test]
    fn file_store_keeps_each_value_verbatim_under_its_key() {
        let temp = tempdir().expect("tempdir");
        let mut store = FileStore::open(temp.path()).expect("open store");
        store.set("theme", "dark").expect("set");

        let path = store.path_for("theme").expect("path");
        assert_eq!(path, temp.path().join("theme"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "dark");
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let temp = tempdir().expect("tempdir");
        let mut store = FileStore::open(temp.path()).expect("open store");
        assert!(store.set("../escape", "x").is_err());
        assert!(store.get("a/b").is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn memory_store_is_independent_per_key() {
        let mut store = MemoryStore::new().with_entry("theme", "dark");
        store.set("tasks", "[]").expect("set");
        assert_eq!(store.get("theme").expect("get").as_deref(), Some("dark"));
        store.remove("theme").expect("remove");
        assert_eq!(store.get("theme").expect("get"), None);
        assert_eq!(store.get("tasks").expect("get").as_deref(), Some("[]"));
    }
}
