//! Shared test utilities for the config-server workspace.
//!
//! This crate provides standardised fixtures to eliminate duplication
//! across crate test suites. It is a dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: [`ConfigRemote`], a bare remote plus a seed clone that pushes commits
//! - [`tree`]: writing plain configuration file trees for filesystem backends

pub mod git;
pub mod tree;

pub use git::{ConfigRemote, MAIN};
pub use tree::write_tree;
