//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All terminal output goes through this module so that quiet mode and
//! JSON output are handled in one place.

pub mod output;
