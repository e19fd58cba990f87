//! core::element
//!
//! The content-addressable element model.
//!
//! # Variants
//!
//! - [`Artifact`] - leaf blob bound to a workspace file
//! - [`Container`] - ordered set of child elements bound to a directory
//! - [`State`] - immutable commit record (see [`crate::core::history`])
//! - [`StageState`] - a State that also snapshots every managed unit
//!
//! Every variant answers the same questions through [`Element`]:
//! `describe()`, `descriptor()`, `name()` and `status()`.
//!
//! # Fingerprints
//!
//! Fingerprints are never recomputed behind the caller's back. After the
//! workspace changes, call [`Element::refresh_fingerprint`] (or
//! [`Container::refresh_fingerprint`] on a tree) before trusting a hash.

mod artifact;
mod container;

pub use artifact::Artifact;
pub use container::{Container, ContainerDiff, Ignore, CONTAINER_HEADER_VERSION};

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::codec::{CodecError, MemberLine, Token};
use super::history::{StageState, State};
use super::store::{ObjectStore, StoreError};
use super::types::{Fingerprint, TypeError};

/// Errors raised while building, persisting or restoring elements.
#[derive(Debug, Error)]
pub enum ElementError {
    #[error("invalid element: {0}")]
    Invalid(#[from] TypeError),

    #[error("workspace file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("content {0} is not in the repository")]
    MissingContent(Fingerprint),

    #[error("'{}' is not inside container '{}'", path.display(), container.display())]
    OutsideContainer { path: PathBuf, container: PathBuf },

    #[error("'{}' exists but is not a container", .0.display())]
    NotAContainer(PathBuf),

    #[error("'{}' changed since it was fingerprinted", .0.display())]
    Stale(PathBuf),

    #[error("stored content {0} does not match its fingerprint")]
    Corrupt(Fingerprint),

    #[error("i/o error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("workspace walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed stored content: {0}")]
    Codec(#[from] CodecError),
}

impl ElementError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| ElementError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The kind of an element. Determines descriptor tokens and child ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    State,
    StageState,
    Container,
    Artifact,
}

impl ElementKind {
    /// Sort rank inside a container: states, then containers, then artifacts.
    pub fn rank(self) -> u8 {
        match self {
            ElementKind::State | ElementKind::StageState => 0,
            ElementKind::Container => 1,
            ElementKind::Artifact => 2,
        }
    }

    /// Descriptor token.
    pub fn token(self) -> Token {
        match self {
            ElementKind::State | ElementKind::StageState => Token::State,
            ElementKind::Container => Token::Container,
            ElementKind::Artifact => Token::Artifact,
        }
    }
}

/// Where an element currently exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementStatus {
    /// The bound workspace entity exists.
    pub in_workspace: bool,
    /// The fingerprinted content is in the repository.
    pub in_repository: bool,
    /// The workspace entity still hashes to the recorded fingerprint.
    pub matches_workspace: bool,
}

/// Any element of the model.
#[derive(Debug, Clone)]
pub enum Element {
    Artifact(Artifact),
    Container(Container),
    State(State),
    StageState(StageState),
}

impl Element {
    /// Wrap a state, choosing the stage variant when it carries a unit snapshot.
    pub fn from_state(state: State) -> Self {
        match StageState::try_from(state) {
            Ok(stage) => Element::StageState(stage),
            Err(state) => Element::State(state),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Artifact(_) => ElementKind::Artifact,
            Element::Container(_) => ElementKind::Container,
            Element::State(_) => ElementKind::State,
            Element::StageState(_) => ElementKind::StageState,
        }
    }

    /// Element name. States are named by their id.
    pub fn name(&self) -> &str {
        match self {
            Element::Artifact(a) => a.name().as_str(),
            Element::Container(c) => c.name().as_str(),
            Element::State(s) => s.id().as_str(),
            Element::StageState(s) => s.state().id().as_str(),
        }
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            Element::Artifact(a) => a.fingerprint(),
            Element::Container(c) => c.fingerprint(),
            Element::State(s) => Some(s.fingerprint()),
            Element::StageState(s) => Some(s.state().fingerprint()),
        }
    }

    /// Workspace location, for elements bound to one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Element::Artifact(a) => Some(a.path()),
            Element::Container(c) => Some(c.path()),
            Element::State(_) | Element::StageState(_) => None,
        }
    }

    /// Full content string.
    pub fn describe(&self) -> Result<String, ElementError> {
        match self {
            Element::Artifact(a) => a.describe(),
            Element::Container(c) => Ok(c.describe()),
            Element::State(s) => Ok(s.describe()),
            Element::StageState(s) => Ok(s.state().describe()),
        }
    }

    /// Compact `token::>>name::>>hash` line.
    pub fn descriptor(&self) -> MemberLine {
        MemberLine::new(
            self.kind().token(),
            [
                self.name(),
                Fingerprint::encode_nullable(self.fingerprint()),
            ],
        )
    }

    /// Re-derive the fingerprint from the workspace. States are immutable
    /// and keep theirs.
    pub fn refresh_fingerprint(&mut self) -> Option<&Fingerprint> {
        match self {
            Element::Artifact(a) => a.refresh_fingerprint(),
            Element::Container(c) => c.refresh_fingerprint(),
            Element::State(s) => Some(s.fingerprint()),
            Element::StageState(s) => Some(s.state().fingerprint()),
        }
    }

    /// Existence and validity in the workspace and the repository.
    ///
    /// Containers are rescanned with `ignore`, which should be the same set
    /// the tree was scanned with.
    pub fn status<S>(
        &self,
        workspace: &Path,
        repository: &S,
        ignore: &Ignore,
    ) -> Result<ElementStatus, StoreError>
    where
        S: ObjectStore + ?Sized,
    {
        let in_repository = match self.fingerprint() {
            Some(fp) => repository.contains(fp)?,
            None => false,
        };
        let status = match self {
            Element::Artifact(a) => {
                let path = resolve(workspace, a.path());
                let in_workspace = path.is_file();
                let matches_workspace = in_workspace
                    && a.fingerprint().is_some()
                    && crate::core::fingerprint::hash_file(&path).ok().as_ref() == a.fingerprint();
                ElementStatus {
                    in_workspace,
                    in_repository,
                    matches_workspace,
                }
            }
            Element::Container(c) => {
                let path = resolve(workspace, c.path());
                let in_workspace = path.is_dir();
                let matches_workspace = in_workspace
                    && Container::scan(c.name().clone(), &path, ignore)
                        .map(|fresh| fresh.fingerprint() == c.fingerprint())
                        .unwrap_or(false);
                ElementStatus {
                    in_workspace,
                    in_repository,
                    matches_workspace,
                }
            }
            Element::State(_) | Element::StageState(_) => ElementStatus {
                in_workspace: false,
                in_repository,
                matches_workspace: false,
            },
        };
        Ok(status)
    }

    /// Sort key inside a container.
    pub(crate) fn sort_key(&self) -> (u8, String) {
        (self.kind().rank(), self.name().to_string())
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

impl From<Artifact> for Element {
    fn from(a: Artifact) -> Self {
        Element::Artifact(a)
    }
}

impl From<Container> for Element {
    fn from(c: Container) -> Self {
        Element::Container(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn kinds_rank_states_first() {
        assert!(ElementKind::State.rank() < ElementKind::Container.rank());
        assert!(ElementKind::Container.rank() < ElementKind::Artifact.rank());
        assert_eq!(ElementKind::StageState.rank(), ElementKind::State.rank());
    }

    #[test]
    fn artifact_descriptor_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        std::fs::write(&path, "abc").unwrap();
        let element = Element::from(Artifact::new(&path).unwrap());
        assert_eq!(
            element.descriptor().encode(),
            "IT::>>a.txt::>>a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn artifact_status_tracks_workspace_and_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        std::fs::write(&path, "abc").unwrap();
        let artifact = Artifact::new(&path).unwrap();
        let store = MemoryStore::new();
        let element = Element::from(artifact.clone());

        let status = element
            .status(temp.path(), &store, &Ignore::default())
            .unwrap();
        assert!(status.in_workspace);
        assert!(status.matches_workspace);
        assert!(!status.in_repository);

        artifact.persist(&store).unwrap();
        std::fs::write(&path, "changed").unwrap();
        let status = element
            .status(temp.path(), &store, &Ignore::default())
            .unwrap();
        assert!(status.in_repository);
        assert!(!status.matches_workspace);

        std::fs::remove_file(&path).unwrap();
        let status = element
            .status(temp.path(), &store, &Ignore::default())
            .unwrap();
        assert!(!status.in_workspace);
    }

    #[test]
    fn container_status_detects_drift() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("f"), "1").unwrap();
        let name = crate::core::types::ElementName::new("root").unwrap();
        let container = Container::scan(name, temp.path(), &Ignore::default()).unwrap();
        let element = Element::from(container);
        let store = MemoryStore::new();

        let ignore = Ignore::default();
        assert!(element.status(temp.path(), &store, &ignore).unwrap().matches_workspace);
        std::fs::write(temp.path().join("g"), "2").unwrap();
        assert!(!element.status(temp.path(), &store, &ignore).unwrap().matches_workspace);
    }

    #[test]
    fn container_status_uses_the_given_ignore_set() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("f"), "1").unwrap();
        std::fs::write(temp.path().join("build.log"), "noise").unwrap();
        let ignore = Ignore::with_names(["build.log"]);
        let name = crate::core::types::ElementName::new("root").unwrap();
        let element = Element::from(Container::scan(name, temp.path(), &ignore).unwrap());
        let store = MemoryStore::new();

        assert!(element.status(temp.path(), &store, &ignore).unwrap().matches_workspace);
        std::fs::write(temp.path().join("build.log"), "more noise").unwrap();
        assert!(element.status(temp.path(), &store, &ignore).unwrap().matches_workspace);
        assert!(
            !element
                .status(temp.path(), &store, &Ignore::default())
                .unwrap()
                .matches_workspace
        );
    }
}
