//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens a [`Session`] and, for mutating commands, takes the repository lock
//! 2. Resolves the [`Target`]: an explicit `--unit`, else the focused unit,
//!    else the stage
//! 3. Calls the engine and formats the result
//!
//! Handlers do NOT touch repository storage directly.

mod amend;
mod commit;
mod completion;
mod diff;
mod init;
mod insert;
mod log_cmd;
mod revert;
mod status;
mod units;

pub use amend::amend;
pub use commit::commit;
pub use completion::completion;
pub use diff::diff;
pub use init::init;
pub use insert::insert;
pub use log_cmd::log;
pub use revert::revert;
pub use status::status;
pub use units::{focus, ignore, manage, units};

use anyhow::{anyhow, bail, Context as _, Result};

use crate::cli::args::Command;
use crate::cli::Context;
use crate::core::element::ContainerDiff;
use crate::core::history::{Path as Route, State};
use crate::core::lock::RepoLock;
use crate::core::types::Fingerprint;
use crate::engine::{CommittableElement, EngineError, LogicalUnit, Session, Stage};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init => init::init(ctx),
        Command::Status { unit, json } => status::status(ctx, unit.as_deref(), json),
        Command::Commit {
            message,
            unit,
            all,
            temporary,
        } => commit::commit(ctx, &message, unit.as_deref(), all, temporary),
        Command::Revert {
            hash,
            relative,
            path,
            bfs,
            unit,
        } => {
            let how = match (hash, relative, path) {
                (Some(hash), _, _) => revert::RevertTo::Hash { hash, bfs },
                (_, Some(relative), _) => revert::RevertTo::relative(&relative)?,
                (_, _, Some(path)) => revert::RevertTo::Path(path),
                _ => bail!("give a hash, --relative or --path"),
            };
            revert::revert(ctx, how, unit.as_deref())
        }
        Command::Log { unit, json } => log_cmd::log(ctx, unit.as_deref(), json),
        Command::Diff { path, unit, json } => diff::diff(ctx, &path, unit.as_deref(), json),
        Command::Manage { name } => units::manage(ctx, &name),
        Command::Ignore { name } => units::ignore(ctx, &name),
        Command::Focus { name, clear } => units::focus(ctx, name.as_deref(), clear),
        Command::Units { json } => units::units(ctx, json),
        Command::Insert {
            prev,
            next,
            message,
            unit,
        } => insert::insert(ctx, &prev, &next, &message, unit.as_deref()),
        Command::Amend {
            hash,
            message,
            unit,
        } => amend::amend(ctx, &hash, &message, unit.as_deref()),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Open the workspace enclosing the working directory.
pub(crate) fn open_session(ctx: &Context) -> Result<Session> {
    let dir = ctx.working_dir()?;
    Session::open(&dir).context("failed to open workspace")
}

/// Take the repository lock for a mutating command.
pub(crate) fn lock(session: &Session) -> Result<RepoLock> {
    RepoLock::acquire(session.paths()).context("failed to lock repository")
}

/// What a command operates on.
pub(crate) enum Target<'a> {
    Stage(&'a mut Stage),
    Unit(&'a mut LogicalUnit),
}

impl<'a> Target<'a> {
    /// An explicit unit, else the focused unit, else the stage.
    pub(crate) fn resolve(stage: &'a mut Stage, unit: Option<&str>) -> Result<Self> {
        let name = unit
            .map(str::to_string)
            .or_else(|| stage.focused().map(|u| u.name().to_string()));
        match name {
            Some(name) => match stage.unit_mut(&name) {
                Some(unit) => Ok(Target::Unit(unit)),
                None => Err(EngineError::UnknownUnit(name).into()),
            },
            None => Ok(Target::Stage(stage)),
        }
    }

    pub(crate) fn label(&self) -> String {
        match self {
            Target::Stage(_) => "stage".to_string(),
            Target::Unit(unit) => format!("unit '{}'", unit.name()),
        }
    }

    pub(crate) fn element(&self) -> &CommittableElement {
        match self {
            Target::Stage(stage) => stage.element(),
            Target::Unit(unit) => unit.element(),
        }
    }

    pub(crate) fn changes(&mut self, session: &Session) -> Result<ContainerDiff, EngineError> {
        match self {
            Target::Stage(stage) => stage.changes(session),
            Target::Unit(unit) => unit.changes(session),
        }
    }

    pub(crate) fn commit_valid_path(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
    ) -> Result<Option<Fingerprint>, EngineError> {
        match self {
            Target::Stage(stage) => stage.commit_valid_path(session, author, message),
            Target::Unit(unit) => unit.commit_valid_path(session, author, message),
        }
    }

    pub(crate) fn commit_temporary(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
    ) -> Result<Option<Fingerprint>, EngineError> {
        match self {
            Target::Stage(stage) => stage.commit_temporary(session, author, message),
            Target::Unit(unit) => unit.commit_temporary(session, author, message),
        }
    }

    pub(crate) fn commit_insert(
        &mut self,
        session: &Session,
        author: &str,
        message: &str,
        prev: &Fingerprint,
        next: &Fingerprint,
    ) -> Result<Option<Fingerprint>, EngineError> {
        match self {
            Target::Stage(stage) => stage.commit_insert(session, author, message, prev, next),
            Target::Unit(unit) => unit.commit_insert(session, author, message, prev, next),
        }
    }

    pub(crate) fn commit_update(
        &mut self,
        session: &Session,
        hash: &Fingerprint,
        author: &str,
        message: &str,
    ) -> Result<Option<Fingerprint>, EngineError> {
        match self {
            Target::Stage(stage) => stage.commit_update(session, hash, author, message),
            Target::Unit(unit) => unit.commit_update(session, hash, author, message),
        }
    }

    pub(crate) fn revert_hash(
        &mut self,
        session: &Session,
        hash: &Fingerprint,
        depth_first: bool,
    ) -> Result<bool, EngineError> {
        match self {
            Target::Stage(stage) => stage.revert_hash(session, hash, depth_first),
            Target::Unit(unit) => unit.revert_hash(session, hash, depth_first),
        }
    }

    pub(crate) fn revert_relative(
        &mut self,
        session: &Session,
        branch: usize,
        distance: i64,
    ) -> Result<bool, EngineError> {
        match self {
            Target::Stage(stage) => stage.revert_relative(session, branch, distance),
            Target::Unit(unit) => unit.revert_relative(session, branch, distance),
        }
    }

    pub(crate) fn revert_path(&mut self, session: &Session, path: &Route) -> Result<bool, EngineError> {
        match self {
            Target::Stage(stage) => stage.revert_path(session, path),
            Target::Unit(unit) => unit.revert_path(session, path),
        }
    }
}

/// Resolve a full hash or a unique prefix among the states reachable from
/// the element's head.
pub(crate) fn resolve_hash(element: &CommittableElement, text: &str) -> Result<Fingerprint> {
    if let Ok(full) = Fingerprint::new(text) {
        return Ok(full);
    }
    let prefix = text.to_ascii_lowercase();
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("'{}' is not a state hash", text);
    }
    let matches: Vec<Fingerprint> = element
        .crawler()
        .all_reachable()
        .iter()
        .map(State::fingerprint)
        .filter(|fp| fp.as_str().starts_with(&prefix))
        .cloned()
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.clone()),
        [] => Err(anyhow!("no state matches '{}'", text)),
        _ => Err(anyhow!("'{}' is ambiguous ({} states match)", text, matches.len())),
    }
}
