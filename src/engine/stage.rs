//! engine::stage
//!
//! The stage: the whole workspace as one committable element, plus the
//! logical units it manages.
//!
//! Stage commits are stage states: besides the workspace content they
//! record the current commit of every managed unit. Reverting the stage
//! restores the workspace and then moves each unit back to its recorded
//! commit.
//!
//! # Storage
//!
//! - `stage/head` - the stage's own head, current and graft table
//! - `stage/units` - one `LS::>>name` line per managed unit and an
//!   `ST::>>name` line for the focused unit (`null` when none)

use std::collections::BTreeMap;
use std::fs;
use std::ops::Deref;

use serde::Serialize;

use crate::core::codec::{self, MemberLine, Token};
use crate::core::element::ContainerDiff;
use crate::core::history::{Path as Route, StageState, State, UnitSnapshot};
use crate::core::store::RefStore;
use crate::core::types::{ElementName, Fingerprint};

use super::committable::CommitKind;
use super::{CommittableElement, EngineError, LogicalUnit, Session};

/// Ref holding the stage's own history pointers.
pub const STAGE_REF: &str = "stage/head";

/// Ref listing managed units and the focus.
pub const UNITS_REF: &str = "stage/units";

/// Element name of the workspace root container.
pub const STAGE_NAME: &str = "workspace";

/// Result of committing every unit and then the stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitAllOutcome {
    /// New commit per unit, `None` where the unit had nothing to commit.
    pub units: BTreeMap<ElementName, Option<Fingerprint>>,
    /// New stage commit.
    pub stage: Option<Fingerprint>,
}

/// The workspace root with its managed units.
#[derive(Debug, Clone)]
pub struct Stage {
    element: CommittableElement,
    units: BTreeMap<ElementName, LogicalUnit>,
    focus: Option<ElementName>,
}

impl Stage {
    /// Load the stage, its unit list and every managed unit.
    pub fn load(session: &Session) -> Result<Self, EngineError> {
        let element = CommittableElement::load(
            session,
            ElementName::new(STAGE_NAME)?,
            session.paths().workspace.clone(),
            STAGE_REF,
        )?;

        let mut units = BTreeMap::new();
        let mut focus = None;
        if let Some(text) = session.store().read_ref(UNITS_REF)? {
            for line in codec::lines(text.as_bytes())? {
                let member = MemberLine::parse(line, None)?;
                match member.token {
                    Token::LogicalUnit => {
                        member.expect_fields("LS", 1)?;
                        let name = ElementName::new(member.fields[0].as_str())?;
                        let unit = LogicalUnit::load(session, name.clone())?;
                        units.insert(name, unit);
                    }
                    Token::Stage => {
                        member.expect_fields("ST", 1)?;
                        focus = match member.fields[0].as_str() {
                            "null" => None,
                            name => Some(ElementName::new(name)?),
                        };
                    }
                    _ => return Err(codec::CodecError::InvalidField(line.to_string()).into()),
                }
            }
        }
        if focus.as_ref().is_some_and(|f| !units.contains_key(f)) {
            tracing::warn!(focus = ?focus, "focused unit is not managed, clearing focus");
            focus = None;
        }

        tracing::debug!(units = units.len(), focus = ?focus, "loaded stage");
        Ok(Self {
            element,
            units,
            focus,
        })
    }

    fn persist_units(&self, session: &Session) -> Result<(), EngineError> {
        let mut lines: Vec<MemberLine> = self
            .units
            .keys()
            .map(|name| MemberLine::new(Token::LogicalUnit, [name.as_str()]))
            .collect();
        lines.push(MemberLine::new(
            Token::Stage,
            [self.focus.as_ref().map_or("null", ElementName::as_str)],
        ));
        session.store().write_ref(UNITS_REF, &codec::join(&lines))?;
        Ok(())
    }

    pub fn element(&self) -> &CommittableElement {
        &self.element
    }

    // =========================================================================
    // Unit management
    // =========================================================================

    /// Start versioning `<workspace>/<name>` as a logical unit.
    ///
    /// The directory is created if missing. Returns `false` if the unit is
    /// already managed.
    pub fn manage(&mut self, session: &Session, name: &str) -> Result<bool, EngineError> {
        let name = ElementName::new(name)?;
        if self.units.contains_key(&name) {
            return Ok(false);
        }
        if session.ignore().is_ignored(name.as_str()) {
            return Err(EngineError::Ignored(name.to_string()));
        }
        let dir = session.paths().unit_dir(name.as_str());
        if dir.exists() && !dir.is_dir() {
            return Err(EngineError::NotADirectory(name.to_string()));
        }
        fs::create_dir_all(&dir)?;

        let unit = LogicalUnit::load(session, name.clone())?;
        self.units.insert(name.clone(), unit);
        self.persist_units(session)?;
        tracing::info!(unit = %name, "managing unit");
        Ok(true)
    }

    /// Stop managing a unit. Its history and directory are kept.
    ///
    /// Returns `false` if the unit was not managed.
    pub fn ignore(&mut self, session: &Session, name: &str) -> Result<bool, EngineError> {
        let Some((name, _)) = self.units.remove_entry(name) else {
            return Ok(false);
        };
        if self.focus.as_ref() == Some(&name) {
            self.focus = None;
        }
        self.persist_units(session)?;
        tracing::info!(unit = %name, "no longer managing unit");
        Ok(true)
    }

    /// Focus a managed unit.
    pub fn focus(&mut self, session: &Session, name: &str) -> Result<(), EngineError> {
        let Some((name, _)) = self.units.get_key_value(name) else {
            return Err(EngineError::UnknownUnit(name.to_string()));
        };
        self.focus = Some(name.clone());
        self.persist_units(session)
    }

    pub fn unfocus(&mut self, session: &Session) -> Result<(), EngineError> {
        self.focus = None;
        self.persist_units(session)
    }

    pub fn focused(&self) -> Option<&LogicalUnit> {
        self.focus.as_ref().and_then(|name| self.units.get(name))
    }

    pub fn focused_mut(&mut self) -> Option<&mut LogicalUnit> {
        self.focus.as_ref().and_then(|name| self.units.get_mut(name))
    }

    pub fn units(&self) -> impl Iterator<Item = &LogicalUnit> {
        self.units.values()
    }

    pub fn unit(&self, name: &str) -> Option<&LogicalUnit> {
        self.units.get(name)
    }

    pub fn unit_mut(&mut self, name: &str) -> Option<&mut LogicalUnit> {
        self.units.get_mut(name)
    }

    /// Current commit of every managed unit.
    pub fn snapshot(&self) -> UnitSnapshot {
        self.units
            .iter()
            .map(|(name, unit)| (name.clone(), unit.current().map(|s| s.fingerprint().clone())))
            .collect()
    }

    // =========================================================================
    // Commits
    // =========================================================================

    /// Valid path commit on every managed unit.
    pub fn commit_logical_units(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
    ) -> Result<BTreeMap<ElementName, Option<Fingerprint>>, EngineError> {
        let mut outcome = BTreeMap::new();
        for (name, unit) in &mut self.units {
            let hash = unit.commit_valid_path(session, author, message)?;
            outcome.insert(name.clone(), hash);
        }
        Ok(outcome)
    }

    pub fn commit(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
    ) -> Result<Option<Fingerprint>, EngineError> {
        let units = self.snapshot();
        self.element
            .commit_as(session, CommitKind::Head, author, message, Some(units))
    }

    pub fn commit_valid_path(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
    ) -> Result<Option<Fingerprint>, EngineError> {
        let units = self.snapshot();
        self.element
            .commit_as(session, CommitKind::ValidPath, author, message, Some(units))
    }

    pub fn commit_temporary(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
    ) -> Result<Option<Fingerprint>, EngineError> {
        let units = self.snapshot();
        self.element
            .commit_as(session, CommitKind::Temporary, author, message, Some(units))
    }

    pub fn commit_insert(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
        prev: &Fingerprint,
        next: &Fingerprint,
    ) -> Result<Option<Fingerprint>, EngineError> {
        let units = self.snapshot();
        self.element
            .insert_with(session, author, message, prev, next, Some(units))
    }

    pub fn commit_update(
        &mut self,
        session: &Session,
        hash: &Fingerprint,
        author: &str,
        message: &str,
    ) -> Result<Option<Fingerprint>, EngineError> {
        let units = self.snapshot();
        self.element
            .update_with(session, hash, author, message, Some(units))
    }

    /// Commit every unit, then the stage.
    pub fn commit_all(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
    ) -> Result<CommitAllOutcome, EngineError> {
        let units = self.commit_logical_units(session, author, message)?;
        let stage = self.commit_valid_path(session, author, message)?;
        Ok(CommitAllOutcome { units, stage })
    }

    // =========================================================================
    // Reverts
    // =========================================================================

    /// Move every unit recorded in `snapshot` back to its recorded commit.
    ///
    /// Units no longer managed are skipped. Returns `false` if any unit
    /// could not be restored.
    pub fn revert_logical_units(
        &mut self,
        session: &Session,
        snapshot: &StageState,
    ) -> Result<bool, EngineError> {
        let mut all_restored = true;
        for (name, hash) in snapshot.units() {
            let Some(unit) = self.units.get_mut(name) else {
                tracing::debug!(unit = %name, "recorded unit is no longer managed");
                continue;
            };
            let Some(hash) = hash else {
                tracing::debug!(unit = %name, "unit had no commit when staged");
                continue;
            };
            all_restored &= unit.revert(session, hash)?;
        }
        Ok(all_restored)
    }

    fn restore_units(&mut self, session: &Session, reverted: bool) -> Result<bool, EngineError> {
        if !reverted {
            return Ok(false);
        }
        let staged = self
            .element
            .current()
            .cloned()
            .and_then(|state| StageState::try_from(state).ok());
        match staged {
            Some(staged) => self.revert_logical_units(session, &staged),
            None => Ok(true),
        }
    }

    pub fn revert(&mut self, session: &Session, hash: &Fingerprint) -> Result<bool, EngineError> {
        let reverted = self.element.revert(session, hash)?;
        self.restore_units(session, reverted)
    }

    pub fn revert_relative(
        &mut self,
        session: &Session,
        branch: usize,
        distance: i64,
    ) -> Result<bool, EngineError> {
        let reverted = self.element.revert_relative(session, branch, distance)?;
        self.restore_units(session, reverted)
    }

    pub fn revert_path(&mut self, session: &Session, path: &Route) -> Result<bool, EngineError> {
        let reverted = self.element.revert_path(session, path)?;
        self.restore_units(session, reverted)
    }

    pub fn revert_hash(
        &mut self,
        session: &Session,
        hash: &Fingerprint,
        depth_first: bool,
    ) -> Result<bool, EngineError> {
        let reverted = self.element.revert_hash(session, hash, depth_first)?;
        self.restore_units(session, reverted)
    }

    /// Paths changed in the workspace since the current stage state.
    pub fn changes(&mut self, session: &Session) -> Result<ContainerDiff, EngineError> {
        self.element.changes(session)
    }

    /// Mainline stage history.
    pub fn log(&self) -> Vec<State> {
        self.element.log()
    }
}

impl Deref for Stage {
    type Target = CommittableElement;

    fn deref(&self) -> &Self::Target {
        &self.element
    }
}
