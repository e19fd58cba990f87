//! engine::unit
//!
//! Logical units: independently versioned subdirectories of the workspace.
//!
//! A unit named `docs` is bound to `<workspace>/docs` and keeps its refs
//! under `units/docs`.

use std::ops::{Deref, DerefMut};

use crate::core::types::ElementName;

use super::{CommittableElement, EngineError, Session};

/// Ref namespace for units.
pub const UNIT_REF_PREFIX: &str = "units";

/// A named committable element rooted at `<workspace>/<name>`.
#[derive(Debug, Clone)]
pub struct LogicalUnit {
    element: CommittableElement,
}

impl LogicalUnit {
    pub fn load(session: &Session, name: ElementName) -> Result<Self, EngineError> {
        let root = session.paths().unit_dir(name.as_str());
        let ref_name = Self::ref_name(&name);
        let element = CommittableElement::load(session, name, root, ref_name)?;
        Ok(Self { element })
    }

    pub fn ref_name(name: &ElementName) -> String {
        format!("{UNIT_REF_PREFIX}/{name}")
    }

    pub fn element(&self) -> &CommittableElement {
        &self.element
    }
}

impl Deref for LogicalUnit {
    type Target = CommittableElement;

    fn deref(&self) -> &Self::Target {
        &self.element
    }
}

impl DerefMut for LogicalUnit {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.element
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::paths::RepoPaths;
    use crate::core::store::{MemoryStore, RefStore};
    use crate::engine::SequentialIdentity;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn unit_is_bound_to_its_directory() {
        let temp = TempDir::new().unwrap();
        let session = Session::with_parts(
            RepoPaths::new(temp.path().to_path_buf()),
            Config::default(),
            Box::new(MemoryStore::new()),
            Box::new(SequentialIdentity::new()),
        );
        fs::create_dir_all(temp.path().join("docs")).unwrap();
        fs::write(temp.path().join("docs/readme.md"), "hello").unwrap();
        fs::write(temp.path().join("outside.txt"), "not mine").unwrap();

        let name = ElementName::new("docs").unwrap();
        let mut unit = LogicalUnit::load(&session, name.clone()).unwrap();
        assert_eq!(unit.root(), temp.path().join("docs"));
        assert_eq!(unit.contents().len(), 1);

        let head = unit.commit_valid_path(&session, "ada", "docs").unwrap().unwrap();
        let stored = session.store().read_ref("units/docs").unwrap().unwrap();
        assert!(stored.contains(head.as_str()));
        assert_eq!(LogicalUnit::ref_name(&name), "units/docs");
    }

    #[test]
    fn missing_directory_scans_empty() {
        let temp = TempDir::new().unwrap();
        let session = Session::with_parts(
            RepoPaths::new(temp.path().to_path_buf()),
            Config::default(),
            Box::new(MemoryStore::new()),
            Box::new(SequentialIdentity::new()),
        );
        let unit = LogicalUnit::load(&session, ElementName::new("ghost").unwrap()).unwrap();
        assert!(unit.contents().is_empty());
        assert!(unit.head().is_none());
    }
}
