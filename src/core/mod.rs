//! core
//!
//! Domain types, storage and algorithms for Strata.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Fingerprint, ElementName, StateId, UtcTimestamp
//! - [`fingerprint`] - SHA-1 hashing of bytes, strings and files
//! - [`codec`] - Member-line encoding of stored records
//! - [`element`] - Artifacts, containers and the element sum type
//! - [`history`] - States, routes, the state graph and its crawler
//! - [`diff`] - Hunt–McIlroy line diffs
//! - [`store`] - Object and ref storage contract and implementations
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for repository storage
//! - [`lock`] - Exclusive repository lock
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Stored content is self-verifying: every object is keyed by its hash
//! - Nothing in `core` holds global state

pub mod codec;
pub mod config;
pub mod diff;
pub mod element;
pub mod fingerprint;
pub mod history;
pub mod lock;
pub mod paths;
pub mod store;
pub mod types;
