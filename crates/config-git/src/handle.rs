//! Snapshot of a materialized local mirror

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use config_fs::NormalizedPath;
use serde::Serialize;

/// What kind of ref a label resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Branch,
    Tag,
    Commit,
}

/// State of a local mirror after a materialization.
///
/// Handed out by value: the owning repository swaps its own copy only after
/// every filesystem mutation of a refresh has completed, so a handle never
/// describes a half-updated tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryHandle {
    /// Remote URI the mirror was cloned from
    pub uri: String,

    /// Root of the working tree
    pub local_path: PathBuf,

    /// Label currently checked out
    pub current_ref: String,

    pub label_kind: LabelKind,

    /// Commit id of HEAD after checkout
    pub version: String,

    /// Commit id of the remote tracking branch at the last fetch, for branch labels
    pub last_known_remote_ref: Option<String>,

    /// Whether tracked files carried uncommitted modifications
    pub dirty: bool,

    pub refreshed_at: DateTime<Utc>,
}

impl RepositoryHandle {
    /// Root of the working tree as a normalized path.
    pub fn root(&self) -> NormalizedPath {
        NormalizedPath::new(&self.local_path)
    }

    /// Whether the served version lags behind what the remote advertised.
    pub fn is_stale(&self) -> bool {
        self.last_known_remote_ref
            .as_ref()
            .is_some_and(|remote| remote != &self.version)
    }
}
