//! engine::session
//!
//! The explicit context threaded through every engine call.
//!
//! A [`Session`] bundles what a process-wide singleton would otherwise
//! hold: the workspace paths, the merged configuration, the storage
//! backend, and the source of state ids and timestamps.
//!
//! # Example
//!
//! ```no_run
//! use strata::engine::Session;
//! use std::path::Path;
//!
//! let session = Session::open(Path::new(".")).unwrap();
//! println!("workspace: {}", session.paths().workspace.display());
//! ```

use std::cell::Cell;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, TimeZone, Utc};
use thiserror::Error;

use crate::core::config::{Config, ConfigError, RepoConfig};
use crate::core::element::Ignore;
use crate::core::history::{State, StateDraft};
use crate::core::paths::RepoPaths;
use crate::core::store::{FileStore, Repository};
use crate::core::types::{StateId, UtcTimestamp};

/// Errors opening or creating a repository.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not a strata workspace (or any parent): {}", .0.display())]
    NotARepository(PathBuf),

    #[error("workspace already initialised: {}", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("i/o error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Supplies ids and timestamps for new states.
pub trait IdentitySource {
    fn state_id(&self) -> StateId;

    fn timestamp(&self) -> UtcTimestamp;
}

/// Random ids and the wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentity;

impl IdentitySource for SystemIdentity {
    fn state_id(&self) -> StateId {
        StateId::generate()
    }

    fn timestamp(&self) -> UtcTimestamp {
        UtcTimestamp::now()
    }
}

/// Numbered ids and a clock that advances one second per call.
///
/// Makes state hashes reproducible.
#[derive(Debug)]
pub struct SequentialIdentity {
    next_id: Cell<u64>,
    ticks: Cell<i64>,
    epoch: DateTime<Utc>,
}

impl SequentialIdentity {
    pub fn new() -> Self {
        Self::starting_at(Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default())
    }

    pub fn starting_at(epoch: DateTime<Utc>) -> Self {
        Self {
            next_id: Cell::new(1),
            ticks: Cell::new(0),
            epoch,
        }
    }
}

impl Default for SequentialIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySource for SequentialIdentity {
    fn state_id(&self) -> StateId {
        let n = self.next_id.get();
        self.next_id.set(n + 1);
        StateId::from_string(format!("state-{n:06}"))
    }

    fn timestamp(&self) -> UtcTimestamp {
        let t = self.ticks.get();
        self.ticks.set(t + 1);
        UtcTimestamp::from_datetime(self.epoch + Duration::seconds(t))
    }
}

/// Everything an engine operation needs besides the element itself.
pub struct Session {
    paths: RepoPaths,
    config: Config,
    store: Box<dyn Repository>,
    identity: Box<dyn IdentitySource>,
    ignore: Ignore,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("paths", &self.paths)
            .field("config", &self.config)
            .field("ignore", &self.ignore)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a repository in `workspace` and open it.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyInitialized`] if `workspace` already holds one
    pub fn init(workspace: &Path) -> Result<Self, SessionError> {
        let paths = RepoPaths::new(workspace.to_path_buf());
        if paths.is_initialized() {
            return Err(SessionError::AlreadyInitialized(paths.workspace));
        }
        paths.ensure_dirs().map_err(|source| SessionError::Io {
            path: paths.repo_dir(),
            source,
        })?;
        Config::write_repo(&paths.workspace, &RepoConfig::default())?;
        tracing::info!(workspace = %paths.workspace.display(), "initialised repository");
        Self::open_at(paths)
    }

    /// Open the repository enclosing `start`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotARepository`] if no ancestor holds one
    /// - [`SessionError::Config`] if a config file is malformed
    pub fn open(start: &Path) -> Result<Self, SessionError> {
        let paths = RepoPaths::discover(start)
            .ok_or_else(|| SessionError::NotARepository(start.to_path_buf()))?;
        Self::open_at(paths)
    }

    fn open_at(paths: RepoPaths) -> Result<Self, SessionError> {
        let config = Config::load(Some(paths.workspace.as_path()))?;
        let store = FileStore::new(paths.objects_dir(), paths.refs_dir());
        Ok(Self::with_parts(
            paths,
            config,
            Box::new(store),
            Box::new(SystemIdentity),
        ))
    }

    /// Assemble a session from explicit parts.
    pub fn with_parts(
        paths: RepoPaths,
        config: Config,
        store: Box<dyn Repository>,
        identity: Box<dyn IdentitySource>,
    ) -> Self {
        let ignore = Ignore::with_names(config.ignore().iter().cloned());
        Self {
            paths,
            config,
            store,
            identity,
            ignore,
        }
    }

    pub fn paths(&self) -> &RepoPaths {
        &self.paths
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the configuration, e.g. to apply CLI overrides.
    pub fn set_config(&mut self, config: Config) {
        self.ignore = Ignore::with_names(config.ignore().iter().cloned());
        self.config = config;
    }

    pub fn store(&self) -> &dyn Repository {
        self.store.as_ref()
    }

    pub fn ignore(&self) -> &Ignore {
        &self.ignore
    }

    pub fn force_commit(&self) -> bool {
        self.config.force_commit()
    }

    pub fn depth_first(&self) -> bool {
        self.config.search_depth_first()
    }

    /// Fix `draft` into a state with a fresh id and timestamp.
    pub fn mint(&self, draft: StateDraft) -> State {
        State::mint(draft, self.identity.state_id(), self.identity.timestamp())
    }
}
