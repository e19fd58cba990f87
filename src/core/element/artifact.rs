//! core::element::artifact
//!
//! Leaf content blobs bound to workspace files.

use std::fs;
use std::path::{Path, PathBuf};

use super::ElementError;
use crate::core::fingerprint::{hash_bytes, hash_file};
use crate::core::store::ObjectStore;
use crate::core::types::{ElementName, Fingerprint};

/// A fingerprinted workspace file.
///
/// The fingerprint is the SHA-1 of the file's raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    name: ElementName,
    path: PathBuf,
    fingerprint: Option<Fingerprint>,
}

impl Artifact {
    /// Bind an artifact to an existing workspace file and fingerprint it.
    ///
    /// # Errors
    ///
    /// - [`ElementError::Invalid`] if the file name is not a valid element name
    /// - [`ElementError::MissingFile`] if the file does not exist
    pub fn new(path: &Path) -> Result<Self, ElementError> {
        let name = name_of(path)?;
        if !path.is_file() {
            return Err(ElementError::MissingFile(path.to_path_buf()));
        }
        let fingerprint = hash_file(path).map_err(ElementError::io(path))?;
        Ok(Self {
            name,
            path: path.to_path_buf(),
            fingerprint: Some(fingerprint),
        })
    }

    /// Rebuild an artifact from a stored descriptor. The workspace is not
    /// consulted.
    pub fn from_stored(name: ElementName, path: PathBuf, fingerprint: Option<Fingerprint>) -> Self {
        Self {
            name,
            path,
            fingerprint,
        }
    }

    pub fn name(&self) -> &ElementName {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    /// Re-hash the workspace file. A vanished file leaves no fingerprint.
    pub fn refresh_fingerprint(&mut self) -> Option<&Fingerprint> {
        self.fingerprint = hash_file(&self.path).ok();
        self.fingerprint.as_ref()
    }

    /// The file content as text.
    pub fn describe(&self) -> Result<String, ElementError> {
        let bytes = self.read()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read(&self) -> Result<Vec<u8>, ElementError> {
        fs::read(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ElementError::MissingFile(self.path.clone()),
            _ => ElementError::Io {
                path: self.path.clone(),
                source: e,
            },
        })
    }

    /// Store the file bytes under the artifact's fingerprint.
    ///
    /// # Errors
    ///
    /// [`ElementError::Stale`] if the file no longer matches the fingerprint.
    pub fn persist<S: ObjectStore + ?Sized>(&self, store: &S) -> Result<(), ElementError> {
        let bytes = self.read()?;
        let actual = hash_bytes(&bytes);
        if self.fingerprint.as_ref() != Some(&actual) {
            return Err(ElementError::Stale(self.path.clone()));
        }
        store.store(&actual, &bytes)?;
        Ok(())
    }

    /// Fetch the stored bytes for this artifact.
    pub fn retrieve<S: ObjectStore + ?Sized>(&self, store: &S) -> Result<Vec<u8>, ElementError> {
        let fingerprint = self
            .fingerprint
            .as_ref()
            .ok_or_else(|| ElementError::Stale(self.path.clone()))?;
        store
            .retrieve(fingerprint)?
            .ok_or_else(|| ElementError::MissingContent(fingerprint.clone()))
    }

    /// Write the stored bytes to `dest`, skipping the write when the file
    /// already holds them.
    pub fn materialize<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
        dest: &Path,
    ) -> Result<(), ElementError> {
        if dest.is_file() && hash_file(dest).ok().as_ref() == self.fingerprint.as_ref() {
            return Ok(());
        }
        if dest.is_dir() {
            fs::remove_dir_all(dest).map_err(ElementError::io(dest))?;
        }
        let bytes = self.retrieve(store)?;
        fs::write(dest, bytes).map_err(ElementError::io(dest))
    }
}

pub(super) fn name_of(path: &Path) -> Result<ElementName, ElementError> {
    let raw = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ElementName::new(raw)?)
}
