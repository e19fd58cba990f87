//! engine
//!
//! The commit/revert state machine on top of the core model.
//!
//! # Architecture
//!
//! The engine owns every mutation of a workspace's history:
//!
//! 1. **Load**: read an element's refs and pull its history into a
//!    [`StateGraph`](crate::core::history::StateGraph)
//! 2. **Scan**: mirror the bound directory as a live container
//! 3. **Commit**: persist the contents and mint a new state
//! 4. **Revert**: locate a target with the crawler and materialise it
//! 5. **Persist**: write head, current and graft tables back to the refs
//!
//! # Components
//!
//! - [`Session`] - paths, config, storage and identity for one process
//! - [`CommittableElement`] - the shared state machine
//! - [`LogicalUnit`] - an independently versioned subdirectory
//! - [`Stage`] - the whole workspace plus its managed units
//!
//! # Invariants
//!
//! - Stored states are never modified; amendments go through replacements
//! - Operational misses (nothing to commit, unknown target, failed restore)
//!   are logged and reported as `None` / `false`, never as errors
//! - Errors are reserved for invalid input and broken storage
//!
//! # Example
//!
//! ```no_run
//! use strata::engine::{Session, Stage};
//! use std::path::Path;
//!
//! let session = Session::open(Path::new(".")).unwrap();
//! let mut stage = Stage::load(&session).unwrap();
//! stage.manage(&session, "docs").unwrap();
//! stage.commit_all(&session, "ada", "snapshot").unwrap();
//! ```

pub mod committable;
pub mod session;
pub mod stage;
pub mod unit;

pub use committable::CommittableElement;
pub use session::{IdentitySource, SequentialIdentity, Session, SessionError, SystemIdentity};
pub use stage::{CommitAllOutcome, Stage};
pub use unit::LogicalUnit;

use thiserror::Error;

use crate::core::codec::CodecError;
use crate::core::element::ElementError;
use crate::core::history::PathError;
use crate::core::store::StoreError;
use crate::core::types::TypeError;

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Element(#[from] ElementError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed ref: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("invalid path: {0}")]
    Path(#[from] PathError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The named unit is not managed by the stage.
    #[error("'{0}' is not a managed unit")]
    UnknownUnit(String),

    /// The name is on the ignore list and can never be scanned.
    #[error("cannot manage '{0}': the name is ignored")]
    Ignored(String),

    /// The unit directory exists as a file.
    #[error("cannot manage '{0}': not a directory")]
    NotADirectory(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
