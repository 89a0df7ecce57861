//! Durable key-value storage for the session.
//!
//! Layout mirrors a browser's local storage: a flat map of string keys to
//! string values. The session uses two keys, `token` and `user` (the user
//! serialized as JSON).

use anyhow::{Context, Result};
#[cfg(test)]
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// Trait for durable storage so tests can swap in memory
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    /// Write several keys together. Stores that can do so write them in one step.
    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// Storage backed by a single JSON file
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "session.json";

    /// Open (without creating) the store under `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> BTreeMap<String, String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "ignoring corrupt session file: {}", e);
                BTreeMap::new()
            }
        }
    }

    fn write_all(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if map.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path)
                    .with_context(|| format!("Failed to remove {}", self.path.display()))?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Write to a sibling temp file then rename, so a crash never leaves half a token
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = open_private(&tmp)?;
            file.write_all(serde_json::to_string_pretty(map)?.as_bytes())?;
            file.flush()?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> Result<fs::File> {
    fs::File::create(path).with_context(|| format!("Failed to open {}", path.display()))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_all().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_all();
        map.insert(key.to_string(), value.to_string());
        self.write_all(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_all();
        if map.remove(key).is_some() {
            self.write_all(&map)?;
        }
        Ok(())
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut map = self.read_all();
        for (key, value) in entries {
            map.insert(key.to_string(), value.to_string());
        }
        self.write_all(&map)
    }
}

/// In-memory storage, lost when the process exits
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    map: RefCell<BTreeMap<String, String>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.map
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.map.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path());
        assert!(store.get(TOKEN_KEY).is_none());

        store.set(TOKEN_KEY, "abc123").unwrap();
        store.set(USER_KEY, r#"{"id":"M1"}"#).unwrap();
        assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("abc123"));

        // A second handle sees the same data
        let other = FileStore::in_dir(dir.path());
        assert_eq!(other.get(USER_KEY).as_deref(), Some(r#"{"id":"M1"}"#));
    }

    #[test]
    fn test_file_store_removes_file_when_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path());
        store.set(TOKEN_KEY, "abc").unwrap();
        assert!(store.path().exists());

        store.remove(TOKEN_KEY).unwrap();
        assert!(!store.path().exists());
        // Removing a missing key is fine
        store.remove(USER_KEY).unwrap();
    }

    #[test]
    fn test_file_store_creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStore::in_dir(&nested);
        store.set(TOKEN_KEY, "t").unwrap();
        assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("t"));
    }

    #[test]
    fn test_set_all_writes_every_key() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path());
        store.set("keep", "me").unwrap();
        store
            .set_all(&[(TOKEN_KEY, "tok"), (USER_KEY, r#"{"id":"A1"}"#)])
            .unwrap();
        assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("tok"));
        assert_eq!(store.get(USER_KEY).as_deref(), Some(r#"{"id":"A1"}"#));
        assert_eq!(store.get("keep").as_deref(), Some("me"));
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(FileStore::FILE_NAME), "not json").unwrap();
        let store = FileStore::in_dir(dir.path());
        assert!(store.get(TOKEN_KEY).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path());
        store.set(TOKEN_KEY, "secret").unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert!(store.get("k").is_none());
    }
}
