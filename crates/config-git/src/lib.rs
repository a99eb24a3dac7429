//! Git-backed configuration mirrors
//!
//! A [`VersionedSourceRepository`] owns one local clone of one remote and
//! turns "give me label X" into a serialized clone/fetch/checkout/merge
//! sequence. Reads happen while the repository lock is held so callers never
//! observe files from two different commits.

pub mod auth;
pub mod error;
pub mod handle;
pub mod label;
pub mod registry;
pub mod repository;
pub mod settings;
mod transport;

pub use auth::{CredentialSelector, CredentialStrategy, TokenProvider};
pub use error::{Error, Result};
pub use handle::{LabelKind, RepositoryHandle};
pub use registry::RepositoryRegistry;
pub use repository::VersionedSourceRepository;
pub use settings::{CredentialKind, CredentialSettings, RepositorySettings};
