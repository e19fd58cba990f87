//! core::history
//!
//! Commit history as a DAG of immutable states.
//!
//! # Modules
//!
//! - [`state`] - [`State`] and [`StageState`] records and their stored form
//! - [`path`] - [`Path`] and [`Step`] routes through the DAG
//! - [`graph`] - [`StateGraph`] arena with graft and replacement tables
//! - [`crawler`] - [`HistoryCrawler`] relative, path and hash searches
//!
//! # Branches
//!
//! Branch numbers are 1-based. Branch 1 of a state is its first parent,
//! which for ordinary commits is also its valid previous state.

pub mod crawler;
pub mod graph;
pub mod path;
pub mod state;

pub use crawler::HistoryCrawler;
pub use graph::StateGraph;
pub use path::{Path, PathError, Step};
pub use state::{StageState, State, StateDraft, StateMetadata, UnitSnapshot};
