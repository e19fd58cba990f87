//! core::paths
//!
//! Centralized path routing for Strata storage locations.
//!
//! # Storage Layout
//!
//! All repository data is stored under `<workspace>/.strata/`:
//! - `config.toml` - Repository configuration
//! - `lock` - Exclusive lock file
//! - `objects/` - Content-addressed objects, fanned out by hash prefix
//! - `refs/` - Head/current pointers, managed units, graft tables
//!
//! No code outside this module should compute `*.join(".strata")` paths.
//!
//! # Example
//!
//! ```
//! use strata::core::paths::RepoPaths;
//! use std::path::PathBuf;
//!
//! let paths = RepoPaths::new(PathBuf::from("/work"));
//!
//! assert_eq!(paths.objects_dir(), PathBuf::from("/work/.strata/objects"));
//! assert_eq!(paths.unit_dir("docs"), PathBuf::from("/work/docs"));
//! ```

use std::path::{Path, PathBuf};

/// Name of the repository directory inside a workspace.
pub const REPO_DIR: &str = ".strata";

/// Storage locations for one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPaths {
    /// The versioned workspace root.
    pub workspace: PathBuf,
}

impl RepoPaths {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    /// Find the nearest enclosing workspace of `start`.
    ///
    /// Returns `None` if no ancestor holds a repository directory.
    pub fn discover(start: &Path) -> Option<Self> {
        start
            .ancestors()
            .find(|dir| dir.join(REPO_DIR).is_dir())
            .map(|dir| Self::new(dir.to_path_buf()))
    }

    /// `.strata/`
    pub fn repo_dir(&self) -> PathBuf {
        self.workspace.join(REPO_DIR)
    }

    /// `.strata/config.toml`
    pub fn config_path(&self) -> PathBuf {
        self.repo_dir().join("config.toml")
    }

    /// `.strata/lock`
    pub fn lock_path(&self) -> PathBuf {
        self.repo_dir().join("lock")
    }

    /// `.strata/objects/`
    pub fn objects_dir(&self) -> PathBuf {
        self.repo_dir().join("objects")
    }

    /// `.strata/refs/`
    pub fn refs_dir(&self) -> PathBuf {
        self.repo_dir().join("refs")
    }

    /// Root directory of a logical unit.
    pub fn unit_dir(&self, name: &str) -> PathBuf {
        self.workspace.join(name)
    }

    /// Whether the repository directory exists.
    pub fn is_initialized(&self) -> bool {
        self.repo_dir().is_dir()
    }

    /// Create the repository directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.objects_dir())?;
        std::fs::create_dir_all(self.refs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout() {
        let paths = RepoPaths::new(PathBuf::from("/w"));
        assert_eq!(paths.repo_dir(), PathBuf::from("/w/.strata"));
        assert_eq!(paths.config_path(), PathBuf::from("/w/.strata/config.toml"));
        assert_eq!(paths.lock_path(), PathBuf::from("/w/.strata/lock"));
        assert_eq!(paths.refs_dir(), PathBuf::from("/w/.strata/refs"));
    }

    #[test]
    fn discover_walks_up() {
        let temp = TempDir::new().unwrap();
        let paths = RepoPaths::new(temp.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        let nested = temp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(RepoPaths::discover(&nested), Some(paths.clone()));
        assert!(paths.is_initialized());
    }

    #[test]
    fn discover_outside_repository() {
        let temp = TempDir::new().unwrap();
        let lone = temp.path().join("lone");
        std::fs::create_dir_all(&lone).unwrap();
        // An enclosing repository above the temp dir would be found too;
        // only assert when there is none.
        if RepoPaths::discover(temp.path()).is_none() {
            assert!(RepoPaths::discover(&lone).is_none());
        }
    }
}
