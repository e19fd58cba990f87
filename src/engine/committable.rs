//! engine::committable
//!
//! The commit/revert state machine shared by logical units and the stage.
//!
//! A [`CommittableElement`] binds a directory to a history. It tracks:
//!
//! - `head`: the newest state
//! - `current`: the state the directory is materialised as, with the route
//!   by which it was reached from `head`
//! - `contents`: the live container mirroring the directory
//!
//! # Ref record
//!
//! Each element persists one ref (e.g. `units/docs`):
//!
//! ```text
//! HD::>>0a1b...            head hash or null
//! CU::>>9f8e...::>>*1+2    current hash or null, and its route
//! GR::>>child::>>parent    one line per graft
//! RE::>>old::>>new         one line per replacement
//! ```
//!
//! # Readiness
//!
//! Commits only happen when the directory differs from the current state,
//! unless `force_commit` is configured. A commit that is not ready logs a
//! warning and returns `Ok(None)`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::codec::{self, MemberLine, Token};
use crate::core::element::{Container, ContainerDiff, Element, ElementError};
use crate::core::history::{
    HistoryCrawler, Path as Route, State, StateDraft, StateGraph, Step, UnitSnapshot,
};
use crate::core::store::RefStore;
use crate::core::types::{ElementName, Fingerprint};

use super::{EngineError, Session};

/// How a new state links into the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommitKind {
    /// Parent is the head.
    Head,
    /// Parent is the current state; a diverging head is kept as second parent.
    ValidPath,
    /// Like `ValidPath` but without content.
    Temporary,
}

/// A directory with its own history.
#[derive(Debug, Clone)]
pub struct CommittableElement {
    name: ElementName,
    root: PathBuf,
    ref_name: String,
    graph: StateGraph,
    head: Option<Fingerprint>,
    current: Option<State>,
    contents: Container,
}

impl CommittableElement {
    /// Load the element's refs and history and scan its directory.
    pub fn load(
        session: &Session,
        name: ElementName,
        root: PathBuf,
        ref_name: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let ref_name = ref_name.into();
        let store = session.store();
        let mut graph = StateGraph::new();
        let mut head = None;
        let mut current = None;

        if let Some(text) = store.read_ref(&ref_name)? {
            for line in codec::lines(text.as_bytes())? {
                let member = MemberLine::parse(line, None)?;
                if graph.apply_table_line(&member)? {
                    continue;
                }
                match member.token {
                    Token::Head => {
                        member.expect_fields("HD", 1)?;
                        head = Fingerprint::parse_nullable(&member.fields[0])?;
                    }
                    Token::Current => {
                        member.expect_fields("CU", 2)?;
                        let route: Route = member.fields[1].parse()?;
                        current = Fingerprint::parse_nullable(&member.fields[0])?
                            .map(|hash| (hash, route));
                    }
                    _ => return Err(codec::CodecError::InvalidField(line.to_string()).into()),
                }
            }
        }

        graph.load(
            store,
            head.iter()
                .chain(current.as_ref().map(|(hash, _)| hash))
                .cloned(),
        )?;
        let current = match current {
            Some((hash, route)) => Some(
                graph
                    .get(&hash)
                    .cloned()
                    .ok_or(ElementError::MissingContent(hash))?
                    .with_route(route),
            ),
            None => None,
        };

        let contents = scan_or_empty(session, &name, &root)?;
        tracing::debug!(
            element = %name,
            head = ?head.as_ref().map(|h| h.short(10)),
            states = graph.len(),
            "loaded committable element"
        );
        Ok(Self {
            name,
            root,
            ref_name,
            graph,
            head,
            current,
            contents,
        })
    }

    pub fn name(&self) -> &ElementName {
        &self.name
    }

    /// Directory the element is bound to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn head(&self) -> Option<&Fingerprint> {
        self.head.as_ref()
    }

    pub fn head_state(&self) -> Option<&State> {
        self.head.as_ref().and_then(|h| self.graph.get(h))
    }

    /// The state the directory is materialised as.
    pub fn current(&self) -> Option<&State> {
        self.current.as_ref()
    }

    pub fn contents(&self) -> &Container {
        &self.contents
    }

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    /// Searches bound to this element's head.
    pub fn crawler(&self) -> HistoryCrawler<'_> {
        HistoryCrawler::new(&self.graph, self.head.as_ref())
    }

    /// Mainline history from the head.
    pub fn log(&self) -> Vec<State> {
        self.crawler().log()
    }

    /// Rescan the directory.
    pub fn refresh_contents(&mut self, session: &Session) -> Result<(), EngineError> {
        self.contents = scan_or_empty(session, &self.name, &self.root)?;
        Ok(())
    }

    /// Whether the directory differs from the current state.
    pub fn ready_to_commit(&mut self, session: &Session) -> Result<bool, EngineError> {
        if session.force_commit() {
            return Ok(true);
        }
        self.refresh_contents(session)?;
        let recorded = self.current.as_ref().and_then(State::content);
        Ok(self.contents.fingerprint().is_some() && self.contents.fingerprint() != recorded)
    }

    /// Paths changed in the directory since the current state.
    pub fn changes(&mut self, session: &Session) -> Result<ContainerDiff, EngineError> {
        self.refresh_contents(session)?;
        let recorded = match self.current.as_ref().and_then(State::content) {
            Some(hash) => {
                Container::load(session.store(), self.name.clone(), hash, &self.root)?
            }
            None => Container::new(self.name.clone(), self.root.clone()),
        };
        Ok(Container::compare(&recorded, &self.contents))
    }

    /// Lines of `relative` as recorded in the current state.
    ///
    /// `None` when there is no current content or the path is not a
    /// recorded artifact.
    pub fn recorded_lines(
        &self,
        session: &Session,
        relative: &Path,
    ) -> Result<Option<Vec<String>>, EngineError> {
        let Some(hash) = self.current.as_ref().and_then(State::content) else {
            return Ok(None);
        };
        let recorded = Container::load(session.store(), self.name.clone(), hash, &self.root)?;
        let Some(Element::Artifact(artifact)) = recorded.find(relative) else {
            return Ok(None);
        };
        let bytes = artifact.retrieve(session.store())?;
        Ok(Some(
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect(),
        ))
    }

    // =========================================================================
    // Commits
    // =========================================================================

    /// New head on top of the old head. Current follows.
    pub fn commit(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
    ) -> Result<Option<Fingerprint>, EngineError> {
        self.commit_as(session, CommitKind::Head, author, message, None)
    }

    /// New state on top of the current state. A diverging head becomes a
    /// second parent. Head and current both move to the new state.
    pub fn commit_valid_path(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
    ) -> Result<Option<Fingerprint>, EngineError> {
        self.commit_as(session, CommitKind::ValidPath, author, message, None)
    }

    /// Placeholder state without content, chained like a valid path commit.
    pub fn commit_temporary(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
    ) -> Result<Option<Fingerprint>, EngineError> {
        self.commit_as(session, CommitKind::Temporary, author, message, None)
    }

    /// Store the directory as a new state after `prev` and graft it as an
    /// extra parent of `next`. The directory is then restored to the
    /// current state.
    pub fn commit_insert(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
        prev: &Fingerprint,
        next: &Fingerprint,
    ) -> Result<Option<Fingerprint>, EngineError> {
        self.insert_with(session, author, message, prev, next, None)
    }

    /// Replace the state at `hash` with one carrying the directory's
    /// content and fresh metadata. Links to the old state follow the
    /// replacement.
    pub fn commit_update(
        &mut self,
        session: &Session,
        hash: &Fingerprint,
        author: &str,
        message: &str,
    ) -> Result<Option<Fingerprint>, EngineError> {
        self.update_with(session, hash, author, message, None)
    }

    /// A differing unit snapshot counts as a change.
    fn ready_with(
        &mut self,
        session: &Session,
        units: Option<&UnitSnapshot>,
    ) -> Result<bool, EngineError> {
        let units_changed = units.is_some()
            && units != self.current.as_ref().and_then(State::units);
        Ok(self.ready_to_commit(session)? || units_changed)
    }

    fn not_ready(&self, operation: &str) -> Option<Fingerprint> {
        tracing::warn!(
            element = %self.name,
            operation,
            "nothing to commit, workspace matches the current state"
        );
        None
    }

    pub(crate) fn commit_as(
        &mut self,
        session: &Session,
        kind: CommitKind,
        author: &str,
        message: &str,
        units: Option<UnitSnapshot>,
    ) -> Result<Option<Fingerprint>, EngineError> {
        if !self.ready_with(session, units.as_ref())? {
            return Ok(self.not_ready("commit"));
        }

        let mut draft = StateDraft::new(author, message);
        draft.units = units;
        match kind {
            CommitKind::Head => {
                draft.content = self.stored_contents(session)?;
                draft.previous = self.head.iter().cloned().collect();
                draft.valid_previous = self.head.clone();
            }
            CommitKind::ValidPath | CommitKind::Temporary => {
                if kind == CommitKind::ValidPath {
                    draft.content = self.stored_contents(session)?;
                }
                let base = self
                    .current
                    .as_ref()
                    .map(|s| s.fingerprint().clone())
                    .or_else(|| self.head.clone());
                draft.previous = base.iter().cloned().collect();
                if let Some(head) = &self.head {
                    if !draft.previous.contains(head) {
                        draft.previous.push(head.clone());
                    }
                }
                draft.valid_previous = base;
            }
        }

        let hash = self.record(session, draft)?;
        self.head = Some(hash.clone());
        self.current = self.graph.get(&hash).map(|s| s.clone().with_route(Route::default()));
        self.persist_refs(session)?;
        tracing::info!(
            element = %self.name,
            state = %hash.short(10),
            kind = ?kind,
            "committed"
        );
        Ok(Some(hash))
    }

    pub(crate) fn insert_with(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
        prev: &Fingerprint,
        next: &Fingerprint,
        units: Option<UnitSnapshot>,
    ) -> Result<Option<Fingerprint>, EngineError> {
        let (Some(prev), Some(next)) = (
            self.graph.get(prev).map(|s| s.fingerprint().clone()),
            self.graph.get(next).map(|s| s.fingerprint().clone()),
        ) else {
            tracing::warn!(element = %self.name, %prev, %next, "insert endpoints not in history");
            return Ok(None);
        };
        if prev == next || !self.is_ancestor(&prev, &next) {
            tracing::warn!(
                element = %self.name,
                prev = %prev.short(10),
                next = %next.short(10),
                "insert needs prev to be a strict ancestor of next"
            );
            return Ok(None);
        }
        if !self.ready_with(session, units.as_ref())? {
            return Ok(self.not_ready("insert"));
        }

        let mut draft = StateDraft::new(author, message);
        draft.units = units;
        draft.content = self.stored_contents(session)?;
        draft.previous = vec![prev.clone()];
        draft.valid_previous = Some(prev);
        let hash = self.record(session, draft)?;
        self.graph.add_graft(&next, &hash);
        self.persist_refs(session)?;
        tracing::info!(
            element = %self.name,
            state = %hash.short(10),
            before = %next.short(10),
            "inserted state"
        );

        if let Some(current) = self.current.as_ref().map(|s| s.fingerprint().clone()) {
            self.revert(session, &current)?;
        }
        Ok(Some(hash))
    }

    pub(crate) fn update_with(
        &mut self,
        session: &Session,
        hash: &Fingerprint,
        author: &str,
        message: &str,
        units: Option<UnitSnapshot>,
    ) -> Result<Option<Fingerprint>, EngineError> {
        let Some(old) = self.graph.get(hash).cloned() else {
            tracing::warn!(element = %self.name, state = %hash, "state to update not in history");
            return Ok(None);
        };
        if !self.ready_with(session, units.as_ref())? {
            return Ok(self.not_ready("update"));
        }

        let mut draft = StateDraft::new(author, message);
        draft.units = units.or_else(|| old.units().cloned());
        draft.content = self.stored_contents(session)?;
        draft.previous = old.previous().to_vec();
        draft.valid_previous = old.valid_previous().cloned();
        draft.valid = old.metadata().valid;
        let new = self.record(session, draft)?;
        self.graph.add_replacement(old.fingerprint(), &new);

        self.head = self.head.as_ref().map(|h| self.graph.resolve(h));
        if let Some(current) = self.current.take() {
            let resolved = self.graph.resolve(current.fingerprint());
            self.current = match self.graph.get(&resolved) {
                Some(state) if &resolved != current.fingerprint() => {
                    Some(state.clone().with_route(current.route().clone()))
                }
                _ => Some(current),
            };
        }
        self.persist_refs(session)?;
        tracing::info!(
            element = %self.name,
            old = %old.fingerprint().short(10),
            new = %new.short(10),
            "updated state"
        );
        Ok(Some(new))
    }

    /// True when `ancestor` is reachable from `descendant` through parents.
    fn is_ancestor(&self, ancestor: &Fingerprint, descendant: &Fingerprint) -> bool {
        let Some(start) = self.graph.get(descendant) else {
            return false;
        };
        HistoryCrawler::new(&self.graph, Some(descendant))
            .find_commit_hash(start, ancestor, &HashSet::new(), true)
            .is_some()
    }

    /// Persist the scanned contents and return their hash.
    fn stored_contents(&self, session: &Session) -> Result<Option<Fingerprint>, EngineError> {
        self.contents.persist(session.store())?;
        Ok(self.contents.fingerprint().cloned())
    }

    fn record(&mut self, session: &Session, draft: StateDraft) -> Result<Fingerprint, EngineError> {
        let state = session.mint(draft);
        state.persist(session.store())?;
        Ok(self.graph.insert(state))
    }

    /// Write head, current and the graft table to the element's ref.
    pub fn persist_refs(&self, session: &Session) -> Result<(), EngineError> {
        let mut lines = vec![
            MemberLine::new(Token::Head, [Fingerprint::encode_nullable(self.head.as_ref())]),
            MemberLine::new(
                Token::Current,
                [
                    Fingerprint::encode_nullable(self.current.as_ref().map(State::fingerprint))
                        .to_string(),
                    self.current
                        .as_ref()
                        .map(|s| s.route().to_string())
                        .unwrap_or_else(|| Route::default().to_string()),
                ],
            ),
        ];
        lines.extend(self.graph.table_lines());
        session.store().write_ref(&self.ref_name, &codec::join(&lines))?;
        Ok(())
    }

    // =========================================================================
    // Reverts
    // =========================================================================

    /// Materialise `target` into the directory and make it current.
    ///
    /// Returns `false` when the target cannot be restored. A failed restore
    /// re-materialises the previous current state.
    pub fn set_current(&mut self, session: &Session, target: State) -> Result<bool, EngineError> {
        let Some(content) = target.content().cloned() else {
            tracing::warn!(
                element = %self.name,
                state = %target.fingerprint().short(10),
                "temporary state has no content to restore"
            );
            return Ok(false);
        };

        if let Err(err) = self.materialize(session, &content) {
            tracing::warn!(
                element = %self.name,
                state = %target.fingerprint().short(10),
                error = %err,
                "restore failed, rolling back"
            );
            if let Some(previous) = self.current.as_ref().and_then(State::content).cloned() {
                if let Err(err) = self.materialize(session, &previous) {
                    tracing::warn!(element = %self.name, error = %err, "rollback failed");
                }
            }
            self.refresh_contents(session)?;
            return Ok(false);
        }

        self.refresh_contents(session)?;
        tracing::info!(
            element = %self.name,
            state = %target.fingerprint().short(10),
            route = %target.route(),
            "reverted"
        );
        self.current = Some(target);
        self.persist_refs(session)?;
        Ok(true)
    }

    fn materialize(&self, session: &Session, content: &Fingerprint) -> Result<(), ElementError> {
        let tree = Container::load(session.store(), self.name.clone(), content, &self.root)?;
        tree.materialize(session.store(), &self.root, session.ignore())
    }

    fn restore(&mut self, session: &Session, target: Option<State>) -> Result<bool, EngineError> {
        match target {
            Some(state) => self.set_current(session, state),
            None => {
                tracing::warn!(element = %self.name, "no such state in history");
                Ok(false)
            }
        }
    }

    /// Revert to `hash`, searching depth first from the head.
    pub fn revert(&mut self, session: &Session, hash: &Fingerprint) -> Result<bool, EngineError> {
        self.revert_hash(session, hash, true)
    }

    /// Revert one step away from the current state.
    pub fn revert_relative(
        &mut self,
        session: &Session,
        branch: usize,
        distance: i64,
    ) -> Result<bool, EngineError> {
        let step = Step::new(branch, distance)?;
        let crawler = self.crawler();
        let target = self
            .current
            .clone()
            .or_else(|| crawler.head_state())
            .and_then(|start| crawler.find_commit_relative(&start, step, &HashSet::new()));
        self.restore(session, target)
    }

    /// Revert along `path` from the head.
    pub fn revert_path(&mut self, session: &Session, path: &Route) -> Result<bool, EngineError> {
        let crawler = self.crawler();
        let target = crawler
            .head_state()
            .and_then(|head| crawler.find_commit_path(&head, path, &HashSet::new()));
        self.restore(session, target)
    }

    /// Revert to `hash` with an explicit search order.
    pub fn revert_hash(
        &mut self,
        session: &Session,
        hash: &Fingerprint,
        depth_first: bool,
    ) -> Result<bool, EngineError> {
        let crawler = self.crawler();
        let target = crawler
            .head_state()
            .and_then(|head| crawler.find_commit_hash(&head, hash, &HashSet::new(), depth_first));
        self.restore(session, target)
    }
}

fn scan_or_empty(
    session: &Session,
    name: &ElementName,
    root: &Path,
) -> Result<Container, EngineError> {
    if root.is_dir() {
        Ok(Container::scan(name.clone(), root, session.ignore())?)
    } else {
        Ok(Container::new(name.clone(), root.to_path_buf()))
    }
}
