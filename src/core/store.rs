//! core::store
//!
//! The storage contract the engine depends on, plus two implementations.
//!
//! # Contract
//!
//! - [`ObjectStore`]: immutable content keyed by its fingerprint
//!   (`store(hash, bytes)` / `retrieve(hash)`).
//! - [`RefStore`]: small mutable records (head/current pointers, managed
//!   units, graft tables) keyed by a slash separated name.
//!
//! Both are synchronous and local. Nothing here is safe for two processes
//! mutating the same repository; the CLI serialises writers with
//! [`crate::core::lock::RepoLock`].
//!
//! # Layout of [`FileStore`]
//!
//! ```text
//! .strata/
//!   objects/da/39a3ee5e6b4b0d3255bfef95601890afd80709
//!   refs/stage
//!   refs/units/<name>
//!   tmp/                  partial writes before their rename
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::fingerprint::hash_str;
use super::types::Fingerprint;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("content under {0} does not match its fingerprint")]
    Corrupt(Fingerprint),
}

/// Content-addressed byte storage.
pub trait ObjectStore {
    /// Store `bytes` under `hash`. Returns `false` if it was already present.
    fn store(&self, hash: &Fingerprint, bytes: &[u8]) -> Result<bool, StoreError>;

    /// Retrieve the bytes stored under `hash`.
    fn retrieve(&self, hash: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError>;

    /// Check whether `hash` is present.
    fn contains(&self, hash: &Fingerprint) -> Result<bool, StoreError>;
}

/// Mutable named records.
pub trait RefStore {
    fn read_ref(&self, name: &str) -> Result<Option<String>, StoreError>;

    fn write_ref(&self, name: &str, content: &str) -> Result<(), StoreError>;

    fn delete_ref(&self, name: &str) -> Result<(), StoreError>;
}

/// Both halves of the storage contract.
pub trait Repository: ObjectStore + RefStore {}

impl<T: ObjectStore + RefStore> Repository for T {}

fn validate_ref_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || name.starts_with('/')
        || name.ends_with('/')
        || name
            .split('/')
            .any(|c| c.is_empty() || c == "." || c == "..")
    {
        return Err(StoreError::InvalidRefName(name.to_string()));
    }
    Ok(())
}

/// Plain-file storage under a repository directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    objects_dir: PathBuf,
    refs_dir: PathBuf,
    temp_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at the given directories. Directories are
    /// created lazily on first write.
    ///
    /// Partial writes live in a `tmp` directory next to `refs_dir`, so no
    /// temporary name can shadow a ref or an object.
    pub fn new(objects_dir: PathBuf, refs_dir: PathBuf) -> Self {
        let temp_dir = match refs_dir.parent() {
            Some(parent) => parent.join("tmp"),
            None => PathBuf::from("tmp"),
        };
        Self {
            objects_dir,
            refs_dir,
            temp_dir,
        }
    }

    fn object_path(&self, hash: &Fingerprint) -> PathBuf {
        let hex = hash.as_str();
        self.objects_dir.join(&hex[..2]).join(&hex[2..])
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_ref_name(name)?;
        Ok(self.refs_dir.join(name))
    }

    /// Write through a temp file and rename so readers never see a partial file.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let io = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        fs::create_dir_all(&self.temp_dir).map_err(io)?;
        let temp_path = self.temp_dir.join(format!(
            "{}-{}",
            hash_str(&path.to_string_lossy()).short(16),
            std::process::id()
        ));
        let mut file = File::create(&temp_path).map_err(io)?;
        file.write_all(bytes).map_err(io)?;
        file.sync_all().map_err(io)?;
        fs::rename(&temp_path, path).map_err(io)
    }
}

impl ObjectStore for FileStore {
    fn store(&self, hash: &Fingerprint, bytes: &[u8]) -> Result<bool, StoreError> {
        let path = self.object_path(hash);
        if path.exists() {
            return Ok(false);
        }
        self.write_atomic(&path, bytes)?;
        tracing::trace!(hash = %hash.short(10), bytes = bytes.len(), "stored object");
        Ok(true)
    }

    fn retrieve(&self, hash: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.object_path(hash);
        match fs::read(&path) {
            Ok(bytes) => {
                if !hash.check(&bytes) {
                    return Err(StoreError::Corrupt(hash.clone()));
                }
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn contains(&self, hash: &Fingerprint) -> Result<bool, StoreError> {
        Ok(self.object_path(hash).exists())
    }
}

impl RefStore for FileStore {
    fn read_ref(&self, name: &str) -> Result<Option<String>, StoreError> {
        let path = self.ref_path(name)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn write_ref(&self, name: &str, content: &str) -> Result<(), StoreError> {
        let path = self.ref_path(name)?;
        self.write_atomic(&path, content.as_bytes())
    }

    fn delete_ref(&self, name: &str) -> Result<(), StoreError> {
        let path = self.ref_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

/// In-memory storage, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RefCell<HashMap<Fingerprint, Vec<u8>>>,
    refs: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.objects.borrow().len()
    }
}

impl ObjectStore for MemoryStore {
    fn store(&self, hash: &Fingerprint, bytes: &[u8]) -> Result<bool, StoreError> {
        let mut objects = self.objects.borrow_mut();
        if objects.contains_key(hash) {
            return Ok(false);
        }
        objects.insert(hash.clone(), bytes.to_vec());
        Ok(true)
    }

    fn retrieve(&self, hash: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.objects.borrow().get(hash).cloned())
    }

    fn contains(&self, hash: &Fingerprint) -> Result<bool, StoreError> {
        Ok(self.objects.borrow().contains_key(hash))
    }
}

impl RefStore for MemoryStore {
    fn read_ref(&self, name: &str) -> Result<Option<String>, StoreError> {
        validate_ref_name(name)?;
        Ok(self.refs.borrow().get(name).cloned())
    }

    fn write_ref(&self, name: &str, content: &str) -> Result<(), StoreError> {
        validate_ref_name(name)?;
        self.refs
            .borrow_mut()
            .insert(name.to_string(), content.to_string());
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<(), StoreError> {
        validate_ref_name(name)?;
        self.refs.borrow_mut().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::hash_bytes;
    use tempfile::TempDir;

    fn file_store(temp: &TempDir) -> FileStore {
        FileStore::new(temp.path().join("objects"), temp.path().join("refs"))
    }

    #[test]
    fn file_store_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = file_store(&temp);
        let hash = hash_bytes(b"payload");

        assert!(!store.contains(&hash).unwrap());
        assert!(store.store(&hash, b"payload").unwrap());
        assert!(store.contains(&hash).unwrap());
        assert_eq!(store.retrieve(&hash).unwrap().unwrap(), b"payload");
    }

    #[test]
    fn second_store_is_noop() {
        let temp = TempDir::new().unwrap();
        let store = file_store(&temp);
        let hash = hash_bytes(b"payload");
        assert!(store.store(&hash, b"payload").unwrap());
        assert!(!store.store(&hash, b"payload").unwrap());
    }

    #[test]
    fn objects_are_fanned_out() {
        let temp = TempDir::new().unwrap();
        let store = file_store(&temp);
        let hash = hash_bytes(b"x");
        store.store(&hash, b"x").unwrap();
        let expected = temp
            .path()
            .join("objects")
            .join(&hash.as_str()[..2])
            .join(&hash.as_str()[2..]);
        assert!(expected.exists());
    }

    #[test]
    fn missing_object_is_none() {
        let temp = TempDir::new().unwrap();
        let store = file_store(&temp);
        assert!(store.retrieve(&hash_bytes(b"nope")).unwrap().is_none());
    }

    #[test]
    fn refs_differing_by_extension_are_kept_apart() {
        let temp = TempDir::new().unwrap();
        let store = file_store(&temp);
        let tmp_unit = hash_bytes(b"tmp unit").to_string();
        let md_unit = hash_bytes(b"md unit").to_string();

        store.write_ref("units/notes.tmp", &tmp_unit).unwrap();
        store.write_ref("units/notes.md", &md_unit).unwrap();
        store.write_ref("units/notes.md", &md_unit).unwrap();

        assert_eq!(store.read_ref("units/notes.tmp").unwrap(), Some(tmp_unit));
        assert_eq!(store.read_ref("units/notes.md").unwrap(), Some(md_unit));
        let leftovers = fs::read_dir(temp.path().join("tmp")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn corrupt_object_detected() {
        let temp = TempDir::new().unwrap();
        let store = file_store(&temp);
        let hash = hash_bytes(b"good");
        store.store(&hash, b"good").unwrap();
        fs::write(store.object_path(&hash), b"evil").unwrap();
        assert!(matches!(
            store.retrieve(&hash),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn refs_roundtrip_and_delete() {
        let temp = TempDir::new().unwrap();
        let store = file_store(&temp);
        store.write_ref("units/docs", "HD::>>null").unwrap();
        assert_eq!(
            store.read_ref("units/docs").unwrap().as_deref(),
            Some("HD::>>null")
        );
        store.delete_ref("units/docs").unwrap();
        assert!(store.read_ref("units/docs").unwrap().is_none());
        // deleting twice is fine
        store.delete_ref("units/docs").unwrap();
    }

    #[test]
    fn bad_ref_names_rejected() {
        let store = MemoryStore::new();
        for name in ["", "/abs", "trailing/", "a/../b", "a//b"] {
            assert!(store.write_ref(name, "x").is_err(), "{name}");
        }
    }

    #[test]
    fn memory_store_counts() {
        let store = MemoryStore::new();
        store.store(&hash_bytes(b"a"), b"a").unwrap();
        store.store(&hash_bytes(b"a"), b"a").unwrap();
        store.store(&hash_bytes(b"b"), b"b").unwrap();
        assert_eq!(store.object_count(), 2);
    }
}
