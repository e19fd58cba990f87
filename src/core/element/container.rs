//! core::element::container
//!
//! Directory trees as fingerprinted, ordered child collections.
//!
//! # Fingerprint
//!
//! A container hashes the header line `CONTAINER::>>1` followed by one
//! descriptor line per child, newline separated. Children are ordered by
//! kind (states, containers, artifacts) and then by name, so two scans of
//! the same directory always produce the same hash.
//!
//! # Invariants
//!
//! - Children are unique by name; adding a same-named child replaces it.
//! - `add` and `remove` recompute every container on the touched path.
//! - A container's own path is the parent directory of each direct child.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use super::artifact::name_of;
use super::{Artifact, Element, ElementError, ElementKind};
use crate::core::codec::{self, MemberLine, Token};
use crate::core::fingerprint::hash_str;
use crate::core::history::State;
use crate::core::paths::REPO_DIR;
use crate::core::store::ObjectStore;
use crate::core::types::{ElementName, Fingerprint};

/// Version field of the container header line.
pub const CONTAINER_HEADER_VERSION: &str = "1";

/// Names skipped when scanning or restoring a directory.
///
/// The repository directory is always ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ignore {
    names: BTreeSet<String>,
}

impl Default for Ignore {
    fn default() -> Self {
        Self {
            names: BTreeSet::from([REPO_DIR.to_string()]),
        }
    }
}

impl Ignore {
    /// The default set plus `names`.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ignore = Self::default();
        ignore.names.extend(names.into_iter().map(Into::into));
        ignore
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Paths that differ between two container trees, relative to their roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDiff {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
}

impl ContainerDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

type ChildKey = (u8, String);

/// A fingerprinted directory.
#[derive(Debug, Clone)]
pub struct Container {
    name: ElementName,
    path: PathBuf,
    children: BTreeMap<ChildKey, Element>,
    fingerprint: Option<Fingerprint>,
}

impl Container {
    /// An empty container bound to `path`.
    pub fn new(name: ElementName, path: PathBuf) -> Self {
        let mut container = Self {
            name,
            path,
            children: BTreeMap::new(),
            fingerprint: None,
        };
        container.rehash();
        container
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

    /// Children in canonical order.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.values()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// The header line followed by each child's descriptor.
    pub fn describe(&self) -> String {
        let mut lines = vec![MemberLine::new(
            Token::ContainerHeader,
            [CONTAINER_HEADER_VERSION],
        )];
        lines.extend(self.children.values().map(Element::descriptor));
        codec::join(&lines)
    }

    fn rehash(&mut self) {
        self.fingerprint = Some(hash_str(&self.describe()));
    }

    fn rehash_all(&mut self) {
        for child in self.children.values_mut() {
            if let Element::Container(c) = child {
                c.rehash_all();
            }
        }
        self.rehash();
    }

    /// Insert as a direct child, replacing any child with the same name.
    fn put(&mut self, element: Element) {
        let name = element.name().to_string();
        self.children.retain(|(_, n), _| *n != name);
        self.children.insert(element.sort_key(), element);
    }

    /// Add a child or deep descendant.
    ///
    /// Elements whose parent directory is this container's directory become
    /// direct children. Elements further below are inserted through
    /// intermediate containers, created as needed. States have no path and
    /// are always added directly.
    ///
    /// # Errors
    ///
    /// - [`ElementError::OutsideContainer`] if the element lies elsewhere
    /// - [`ElementError::NotAContainer`] if an artifact blocks the path
    pub fn add(&mut self, element: Element) -> Result<(), ElementError> {
        self.insert(element, true)
    }

    fn insert(&mut self, element: Element, rehash: bool) -> Result<(), ElementError> {
        let Some(path) = element.path().map(Path::to_path_buf) else {
            self.put(element);
            if rehash {
                self.rehash();
            }
            return Ok(());
        };

        let outside = || ElementError::OutsideContainer {
            path: path.clone(),
            container: self.path.clone(),
        };
        let relative = path.strip_prefix(&self.path).map_err(|_| outside())?;
        let mut components = relative.components();
        let first = match components.next() {
            Some(Component::Normal(first)) => first.to_string_lossy().into_owned(),
            _ => return Err(outside()),
        };

        if components.next().is_none() {
            self.put(element);
        } else {
            let sub_name = ElementName::new(first)?;
            let sub_path = self.path.join(sub_name.as_str());
            let key = (ElementKind::Container.rank(), sub_name.as_str().to_string());
            if !self.children.contains_key(&key) {
                if self.get(sub_name.as_str()).is_some() {
                    return Err(ElementError::NotAContainer(sub_path));
                }
                self.children
                    .insert(key.clone(), Container::new(sub_name, sub_path).into());
            }
            if let Some(Element::Container(sub)) = self.children.get_mut(&key) {
                sub.insert(element, rehash)?;
            }
        }

        if rehash {
            self.rehash();
        }
        Ok(())
    }

    /// Remove a direct child by name.
    pub fn remove(&mut self, name: &str) -> Option<Element> {
        let key = self.children.keys().find(|(_, n)| n == name).cloned()?;
        let removed = self.children.remove(&key);
        self.rehash();
        removed
    }

    /// A direct child by name.
    pub fn get(&self, name: &str) -> Option<&Element> {
        self.children.values().find(|c| c.name() == name)
    }

    /// A descendant by path relative to this container.
    pub fn find(&self, relative: &Path) -> Option<&Element> {
        let mut components = relative.components().filter_map(|c| match c {
            Component::Normal(n) => Some(n.to_string_lossy()),
            _ => None,
        });
        let first = components.next()?;
        let mut current = self.get(&first)?;
        for name in components {
            match current {
                Element::Container(c) => current = c.get(&name)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Refresh every child from the workspace, drop the vanished ones and
    /// recompute. A vanished directory refreshes to no fingerprint.
    ///
    /// New workspace entries are not picked up; use [`Container::scan`].
    pub fn refresh_fingerprint(&mut self) -> Option<&Fingerprint> {
        if !self.path.is_dir() {
            self.fingerprint = None;
            return None;
        }
        for child in self.children.values_mut() {
            child.refresh_fingerprint();
        }
        self.children.retain(|_, child| child.fingerprint().is_some());
        self.rehash();
        self.fingerprint.as_ref()
    }

    /// Build a tree from a workspace directory.
    ///
    /// Entries are visited in file name order. Symlinks and ignored names
    /// are skipped.
    pub fn scan(name: ElementName, dir: &Path, ignore: &Ignore) -> Result<Self, ElementError> {
        if !dir.is_dir() {
            return Err(ElementError::NotAContainer(dir.to_path_buf()));
        }
        let mut root = Container::new(name, dir.to_path_buf());
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !ignore.is_ignored(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = entry?;
            let file_type = entry.file_type();
            if file_type.is_dir() {
                let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
                if root.find(relative).is_none() {
                    let child = Container::new(name_of(entry.path())?, entry.path().to_path_buf());
                    root.insert(child.into(), false)?;
                }
            } else if file_type.is_file() {
                root.insert(Artifact::new(entry.path())?.into(), false)?;
            }
        }
        root.rehash_all();
        tracing::debug!(
            dir = %dir.display(),
            children = root.len(),
            "scanned container"
        );
        Ok(root)
    }

    /// Store every artifact's bytes and every container's description.
    pub fn persist<S: ObjectStore + ?Sized>(&self, store: &S) -> Result<(), ElementError> {
        for child in self.children.values() {
            match child {
                Element::Artifact(a) => a.persist(store)?,
                Element::Container(c) => c.persist(store)?,
                Element::State(_) | Element::StageState(_) => {}
            }
        }
        let description = self.describe();
        let hash = hash_str(&description);
        if self.fingerprint.as_ref() != Some(&hash) {
            return Err(ElementError::Stale(self.path.clone()));
        }
        store.store(&hash, description.as_bytes())?;
        Ok(())
    }

    /// Rebuild a stored tree bound to `dir` without touching the workspace.
    pub fn load<S: ObjectStore + ?Sized>(
        store: &S,
        name: ElementName,
        hash: &Fingerprint,
        dir: &Path,
    ) -> Result<Self, ElementError> {
        let bytes = store
            .retrieve(hash)?
            .ok_or_else(|| ElementError::MissingContent(hash.clone()))?;
        let lines = codec::lines(&bytes)?;
        let header = lines
            .first()
            .map(|l| MemberLine::parse(l, None))
            .transpose()?
            .ok_or(codec::CodecError::Missing("CONTAINER"))?;
        if header.token != Token::ContainerHeader {
            return Err(codec::CodecError::Missing("CONTAINER").into());
        }

        let mut container = Container {
            name,
            path: dir.to_path_buf(),
            children: BTreeMap::new(),
            fingerprint: None,
        };
        for line in &lines[1..] {
            let member = MemberLine::parse(line, None)?;
            let token = member.token.as_str();
            member.expect_fields(token, 2)?;
            let child_name = ElementName::new(member.fields[0].as_str())?;
            let child_hash = Fingerprint::parse_nullable(&member.fields[1])?
                .ok_or_else(|| codec::CodecError::InvalidField(line.to_string()))?;
            let child = match member.token {
                Token::Artifact => {
                    if !store.contains(&child_hash)? {
                        return Err(ElementError::MissingContent(child_hash));
                    }
                    let path = dir.join(child_name.as_str());
                    Artifact::from_stored(child_name, path, Some(child_hash)).into()
                }
                Token::Container => {
                    let path = dir.join(child_name.as_str());
                    Container::load(store, child_name, &child_hash, &path)?.into()
                }
                Token::State => Element::from_state(State::load(store, &child_hash)?),
                _ => return Err(codec::CodecError::InvalidField(line.to_string()).into()),
            };
            container.put(child);
        }
        container.rehash();
        if container.fingerprint.as_ref() != Some(hash) {
            return Err(ElementError::Corrupt(hash.clone()));
        }
        Ok(container)
    }

    /// Write the stored tree into `dir`.
    ///
    /// Entries of `dir` that are neither children nor ignored are removed.
    /// Symlinks and other entries [`Container::scan`] never tracks are left
    /// alone.
    pub fn materialize<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
        dir: &Path,
        ignore: &Ignore,
    ) -> Result<(), ElementError> {
        if dir.is_file() {
            fs::remove_file(dir).map_err(ElementError::io(dir))?;
        }
        fs::create_dir_all(dir).map_err(ElementError::io(dir))?;

        for entry in fs::read_dir(dir).map_err(ElementError::io(dir))? {
            let entry = entry.map_err(ElementError::io(dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if ignore.is_ignored(&name) || self.get(&name).is_some() {
                continue;
            }
            let path = entry.path();
            let file_type = entry.file_type().map_err(ElementError::io(&path))?;
            if !file_type.is_dir() && !file_type.is_file() {
                continue;
            }
            if file_type.is_dir() {
                fs::remove_dir_all(&path).map_err(ElementError::io(&path))?;
            } else {
                fs::remove_file(&path).map_err(ElementError::io(&path))?;
            }
            tracing::debug!(path = %path.display(), "removed untracked entry");
        }

        for child in self.children.values() {
            let target = dir.join(child.name());
            match child {
                Element::Artifact(a) => a.materialize(store, &target)?,
                Element::Container(c) => c.materialize(store, &target, ignore)?,
                Element::State(_) | Element::StageState(_) => {}
            }
        }
        Ok(())
    }

    /// Every artifact below this container, keyed by relative path.
    pub fn flatten(&self) -> BTreeMap<PathBuf, Option<Fingerprint>> {
        let mut out = BTreeMap::new();
        self.flatten_into(Path::new(""), &mut out);
        out
    }

    fn flatten_into(&self, prefix: &Path, out: &mut BTreeMap<PathBuf, Option<Fingerprint>>) {
        for child in self.children.values() {
            let path = prefix.join(child.name());
            match child {
                Element::Artifact(a) => {
                    out.insert(path, a.fingerprint().cloned());
                }
                Element::Container(c) => c.flatten_into(&path, out),
                Element::State(_) | Element::StageState(_) => {}
            }
        }
    }

    /// Artifact paths added, removed or modified going from `old` to `new`.
    pub fn compare(old: &Container, new: &Container) -> ContainerDiff {
        let before = old.flatten();
        let after = new.flatten();
        let mut diff = ContainerDiff::default();
        for (path, hash) in &after {
            match before.get(path) {
                None => diff.added.push(path.clone()),
                Some(prev) if prev != hash => diff.modified.push(path.clone()),
                Some(_) => {}
            }
        }
        diff.removed = before
            .keys()
            .filter(|p| !after.contains_key(*p))
            .cloned()
            .collect();
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use tempfile::TempDir;

    fn name(s: &str) -> ElementName {
        ElementName::new(s).unwrap()
    }

    fn workspace() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/deep")).unwrap();
        fs::write(temp.path().join("README"), "hello").unwrap();
        fs::write(temp.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(temp.path().join("src/deep/x"), "x").unwrap();
        temp
    }

    #[test]
    fn empty_container_hashes_header() {
        let c = Container::new(name("root"), PathBuf::from("/tmp/none"));
        assert_eq!(c.describe(), "CONTAINER::>>1");
        assert_eq!(c.fingerprint(), Some(&hash_str("CONTAINER::>>1")));
    }

    #[test]
    fn children_ordered_containers_before_artifacts() {
        let temp = workspace();
        let c = Container::scan(name("root"), temp.path(), &Ignore::default()).unwrap();
        let names: Vec<_> = c.children().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["src", "README"]);
        assert!(c.describe().starts_with("CONTAINER::>>1\nCO::>>src::>>"));
    }

    #[test]
    fn hash_is_deterministic_across_refreshes() {
        let temp = workspace();
        let mut c = Container::scan(name("root"), temp.path(), &Ignore::default()).unwrap();
        let first = c.fingerprint().cloned();
        assert_eq!(c.refresh_fingerprint().cloned(), first);
        let rescanned = Container::scan(name("root"), temp.path(), &Ignore::default()).unwrap();
        assert_eq!(rescanned.fingerprint().cloned(), first);
    }

    #[test]
    fn deep_add_creates_intermediates() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("a/b/f"), "f").unwrap();
        let mut root = Container::new(name("root"), temp.path().to_path_buf());
        let before = root.fingerprint().cloned();

        root.add(Artifact::new(&temp.path().join("a/b/f")).unwrap().into())
            .unwrap();

        assert_ne!(root.fingerprint().cloned(), before);
        assert!(matches!(
            root.find(Path::new("a/b/f")),
            Some(Element::Artifact(_))
        ));
        assert!(matches!(root.find(Path::new("a/b")), Some(Element::Container(_))));
        let scanned = Container::scan(name("root"), temp.path(), &Ignore::default()).unwrap();
        assert_eq!(root.fingerprint(), scanned.fingerprint());
    }

    #[test]
    fn add_outside_rejected() {
        let temp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        fs::write(other.path().join("f"), "f").unwrap();
        let mut root = Container::new(name("root"), temp.path().to_path_buf());
        let artifact = Artifact::new(&other.path().join("f")).unwrap();
        assert!(matches!(
            root.add(artifact.into()),
            Err(ElementError::OutsideContainer { .. })
        ));
    }

    #[test]
    fn artifact_blocking_path_is_not_a_container() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "file").unwrap();
        let mut root = Container::new(name("root"), temp.path().to_path_buf());
        root.add(Artifact::new(&temp.path().join("a")).unwrap().into())
            .unwrap();

        let fake = Artifact::from_stored(name("b"), temp.path().join("a/b"), None);
        assert!(matches!(
            root.add(fake.into()),
            Err(ElementError::NotAContainer(_))
        ));
    }

    #[test]
    fn same_name_replaces_and_remove_recomputes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f");
        fs::write(&path, "one").unwrap();
        let mut root = Container::new(name("root"), temp.path().to_path_buf());
        let empty = root.fingerprint().cloned();
        root.add(Artifact::new(&path).unwrap().into()).unwrap();
        fs::write(&path, "two").unwrap();
        root.add(Artifact::new(&path).unwrap().into()).unwrap();
        assert_eq!(root.len(), 1);

        assert!(root.remove("f").is_some());
        assert_eq!(root.fingerprint().cloned(), empty);
        assert!(root.remove("f").is_none());
    }

    #[test]
    fn refresh_drops_vanished_children() {
        let temp = workspace();
        let mut c = Container::scan(name("root"), temp.path(), &Ignore::default()).unwrap();
        fs::remove_file(temp.path().join("README")).unwrap();
        c.refresh_fingerprint();
        assert!(c.get("README").is_none());
        assert!(c.get("src").is_some());
    }

    #[test]
    fn vanished_directory_refreshes_to_null() {
        let temp = workspace();
        let dir = temp.path().join("src");
        let mut c = Container::scan(name("src"), &dir, &Ignore::default()).unwrap();
        fs::remove_dir_all(&dir).unwrap();
        assert!(c.refresh_fingerprint().is_none());
    }

    #[test]
    fn scan_skips_ignored_names() {
        let temp = workspace();
        fs::create_dir_all(temp.path().join(REPO_DIR).join("objects")).unwrap();
        fs::write(temp.path().join("target"), "build").unwrap();
        let ignore = Ignore::with_names(["target"]);
        let c = Container::scan(name("root"), temp.path(), &ignore).unwrap();
        assert!(c.get(REPO_DIR).is_none());
        assert!(c.get("target").is_none());
    }

    #[test]
    fn persist_load_materialize() {
        let temp = workspace();
        let store = MemoryStore::new();
        let original = Container::scan(name("root"), temp.path(), &Ignore::default()).unwrap();
        original.persist(&store).unwrap();
        let hash = original.fingerprint().cloned().unwrap();

        let restore = TempDir::new().unwrap();
        fs::write(restore.path().join("stray"), "junk").unwrap();
        let loaded = Container::load(&store, name("root"), &hash, restore.path()).unwrap();
        loaded
            .materialize(&store, restore.path(), &Ignore::default())
            .unwrap();

        assert!(!restore.path().join("stray").exists());
        assert_eq!(
            fs::read_to_string(restore.path().join("src/deep/x")).unwrap(),
            "x"
        );
        let rescanned =
            Container::scan(name("root"), restore.path(), &Ignore::default()).unwrap();
        assert_eq!(rescanned.fingerprint(), Some(&hash));
    }

    #[test]
    fn load_missing_content_errors() {
        let store = MemoryStore::new();
        let hash = hash_str("nothing stored");
        assert!(matches!(
            Container::load(&store, name("root"), &hash, Path::new("/tmp")),
            Err(ElementError::MissingContent(_))
        ));
    }

    #[test]
    fn materialize_keeps_ignored_entries() {
        let temp = workspace();
        let store = MemoryStore::new();
        let c = Container::scan(name("root"), temp.path(), &Ignore::default()).unwrap();
        c.persist(&store).unwrap();
        fs::create_dir_all(temp.path().join(REPO_DIR)).unwrap();
        fs::write(temp.path().join(REPO_DIR).join("keep"), "k").unwrap();
        c.materialize(&store, temp.path(), &Ignore::default()).unwrap();
        assert!(temp.path().join(REPO_DIR).join("keep").exists());
    }

    #[cfg(unix)]
    #[test]
    fn materialize_leaves_symlinks_alone() {
        let temp = workspace();
        let store = MemoryStore::new();
        let c = Container::scan(name("root"), temp.path(), &Ignore::default()).unwrap();
        c.persist(&store).unwrap();

        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("notes"), "mine").unwrap();
        std::os::unix::fs::symlink(outside.path().join("notes"), temp.path().join("link"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("src/dir-link")).unwrap();
        assert_eq!(
            Container::scan(name("root"), temp.path(), &Ignore::default())
                .unwrap()
                .fingerprint(),
            c.fingerprint()
        );

        c.materialize(&store, temp.path(), &Ignore::default()).unwrap();
        assert!(fs::symlink_metadata(temp.path().join("link")).is_ok());
        assert!(fs::symlink_metadata(temp.path().join("src/dir-link")).is_ok());
        assert_eq!(
            fs::read_to_string(outside.path().join("notes")).unwrap(),
            "mine"
        );
    }

    #[test]
    fn compare_lists_changes() {
        let temp = workspace();
        let before = Container::scan(name("root"), temp.path(), &Ignore::default()).unwrap();
        fs::write(temp.path().join("README"), "changed").unwrap();
        fs::remove_file(temp.path().join("src/deep/x")).unwrap();
        fs::write(temp.path().join("new"), "n").unwrap();
        let after = Container::scan(name("root"), temp.path(), &Ignore::default()).unwrap();

        let diff = Container::compare(&before, &after);
        assert_eq!(diff.added, vec![PathBuf::from("new")]);
        assert_eq!(diff.modified, vec![PathBuf::from("README")]);
        assert_eq!(diff.removed, vec![PathBuf::from("src/deep/x")]);
        assert!(Container::compare(&after, &after).is_empty());
    }
}
