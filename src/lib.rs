//! Strata - content-addressed version control for workspace units
//!
//! Strata records a workspace as a Merkle tree of artifacts and containers,
//! links recorded states into a DAG, and moves the workspace between states.
//! Subdirectories can be managed as logical units with their own histories;
//! the stage versions the workspace as a whole together with the heads of
//! its units.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Commit and revert state machine over a [`engine::Session`]
//! - [`core`] - Fingerprints, elements, the state graph, storage and diff
//! - [`logging`] - Tracing subscriber setup
//! - [`ui`] - Output formatting
//!
//! # Invariants
//!
//! 1. Every stored object is named by the SHA-1 of its serialized form
//! 2. Stored objects are never rewritten; history edits add graft and
//!    replacement records instead
//! 3. The workspace only changes through a commit or a revert

pub mod cli;
pub mod core;
pub mod engine;
pub mod logging;
pub mod ui;
