use std::collections::BTreeMap;
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use serde_json::Value;

#[derive(Debug)]
pub enum StoreError {
    NotFound { collection: String, id: String },
    AlreadyExists { collection: String, id: String },
    InvalidKey(String),
    IO(io::Error),
    Json(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { collection, id } => {
                write!(f, "no document {}/{}", collection, id)
            }
            StoreError::AlreadyExists { collection, id } => {
                write!(f, "document {}/{} already exists", collection, id)
            }
            StoreError::InvalidKey(key) => {
                write!(f, "{:?} is not a valid collection or document id", key)
            }
            StoreError::IO(error) => error.fmt(f),
            StoreError::Json(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(value: io::Error) -> Self {
        StoreError::IO(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Json(value)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// JSON documents grouped in named collections.
pub trait DocumentStore: Send + Sync {
    fn read(&self, collection: &str, id: &str) -> Result<Value>;

    /// Fails with `AlreadyExists` rather than overwriting.
    fn create(&self, collection: &str, id: &str, document: &Value) -> Result<()>;

    /// Fails with `NotFound` if there is nothing to replace.
    fn update(&self, collection: &str, id: &str, document: &Value) -> Result<()>;

    fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Document ids in the collection, sorted. Unknown collections are empty.
    fn list(&self, collection: &str) -> Result<Vec<String>>;

    fn put(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        match self.update(collection, id, document) {
            Err(StoreError::NotFound { .. }) => {
                self.create(collection, id, document)
            }
            other => other,
        }
    }
}

static KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,127}$").expect("key pattern")
});

fn check_key(key: &str) -> Result<()> {
    if KEY.is_match(key) {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

/// One pretty-printed JSON file per document at `root/collection/id.json`.
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, collection: &str, id: &str) -> Result<PathBuf> {
        check_key(collection)?;
        check_key(id)?;
        Ok(self.root.join(collection).join(format!("{}.json", id)))
    }

    fn write(&self, path: &Path, document: &Value) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(document)?)?;
        Ok(())
    }
}

impl DocumentStore for DirectoryStore {
    fn read(&self, collection: &str, id: &str) -> Result<Value> {
        let path = self.path(collection, id)?;
        let contents = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(not_found(collection, id));
            }
            Err(error) => return Err(error.into()),
        };
        Ok(serde_json::from_slice(&contents)?)
    }

    fn create(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        let path = self.path(collection, id)?;
        if path.exists() {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        log::debug!("creating {}", path.display());
        self.write(&path, document)
    }

    fn update(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        let path = self.path(collection, id)?;
        if !path.exists() {
            return Err(not_found(collection, id));
        }
        log::debug!("updating {}", path.display());
        self.write(&path, document)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let path = self.path(collection, id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                Err(not_found(collection, id))
            }
            Err(error) => Err(error.into()),
        }
    }

    fn list(&self, collection: &str) -> Result<Vec<String>> {
        check_key(collection)?;
        let directory = self.root.join(collection);
        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(error) => return Err(error.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|extension| extension == "json")
                && let Some(stem) = path.file_stem().and_then(|stem| stem.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Keeps documents in memory; nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<(String, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn documents(
        &self,
    ) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), Value>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, collection: &str, id: &str) -> Result<Value> {
        self.documents()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| not_found(collection, id))
    }

    fn create(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        check_key(collection)?;
        check_key(id)?;
        let mut documents = self.documents();
        let key = (collection.to_string(), id.to_string());
        if documents.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                collection: key.0,
                id: key.1,
            });
        }
        documents.insert(key, document.clone());
        Ok(())
    }

    fn update(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        let mut documents = self.documents();
        match documents.get_mut(&(collection.to_string(), id.to_string())) {
            Some(existing) => {
                *existing = document.clone();
                Ok(())
            }
            None => Err(not_found(collection, id)),
        }
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.documents()
            .remove(&(collection.to_string(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(collection, id))
    }

    fn list(&self, collection: &str) -> Result<Vec<String>> {
        Ok(self
            .documents()
            .keys()
            .filter(|(owner, _)| owner == collection)
            .map(|(_, id)| id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exercise(store: &dyn DocumentStore) {
        let document = json!({ "name": "checkout" });
        store.create("workflows", "wf-1", &document).unwrap();
        assert!(matches!(
            store.create("workflows", "wf-1", &document),
            Err(StoreError::AlreadyExists { .. })
        ));
        assert_eq!(store.read("workflows", "wf-1").unwrap(), document);

        store
            .update("workflows", "wf-1", &json!({ "name": "renamed" }))
            .unwrap();
        assert_eq!(store.read("workflows", "wf-1").unwrap()["name"], "renamed");
        assert!(matches!(
            store.update("workflows", "wf-2", &document),
            Err(StoreError::NotFound { .. })
        ));

        store.put("workflows", "wf-2", &document).unwrap();
        store.put("workflows", "wf-0", &document).unwrap();
        assert_eq!(
            store.list("workflows").unwrap(),
            vec!["wf-0", "wf-1", "wf-2"]
        );
        assert!(store.list("compiled").unwrap().is_empty());

        store.delete("workflows", "wf-1").unwrap();
        assert!(matches!(
            store.read("workflows", "wf-1"),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("workflows", "wf-1"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_directory_store() {
        let directory = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(directory.path());
        exercise(&store);
        assert!(directory.path().join("workflows/wf-2.json").exists());
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let directory = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(directory.path());
        for key in ["../escape", "a/b", "", ".hidden"] {
            assert!(matches!(
                store.create("workflows", key, &json!({})),
                Err(StoreError::InvalidKey(_))
            ));
        }
    }
}
