//! Filesystem helpers for the config server
//!
//! Provides normalized path handling, deterministic local mirror naming,
//! advisory directory locks and format-detecting settings loading.

pub mod config;
pub mod error;
pub mod io;
pub mod lock;
pub mod naming;
pub mod path;
pub mod pattern;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use lock::DirLock;
pub use naming::{mirror_directory_name, slugify};
pub use path::NormalizedPath;
pub use pattern::GlobPattern;
