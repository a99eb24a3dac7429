//! Composite configuration resolution for the config server
//!
//! This crate ties the lower layers together:
//!
//! - **Backends**: git repositories (optionally routed by pattern), plain
//!   directories, or any [`EnvironmentRepository`]
//! - **Composite resolution**: priority-ordered, parallel, with per-backend
//!   fail isolation
//! - **Change notifications**: webhook payloads of the common git hosting
//!   services turned into the configuration identities they affect
//! - **Scoped cache**: resolved environments built at most once per key and
//!   rebuilt after invalidation
//!
//! # Architecture
//!
//! ```text
//!                 ConfigService
//!                       |
//!        +--------------+--------------+
//!        |              |              |
//!  CompositeResolver  EncryptionGateway  ScopedCache <- NotificationRouter
//!        |
//!  config-git / config-env
//! ```

pub mod backend;
pub mod cache;
pub mod composite;
pub mod error;
pub mod logging;
pub mod notification;
pub mod retry;
pub mod routing;
pub mod service;
pub mod settings;

pub use backend::{Backend, EnvironmentRepository, GitBackend, GitRoute, NativeBackend};
pub use cache::{ScopedCache, token_matches};
pub use composite::{BackendDescriptor, CompositeResolver};
pub use error::{Error, Result};
pub use notification::{Extraction, Extractor, Headers, NotificationPathSet, NotificationRouter};
pub use routing::RoutePatterns;
pub use service::{ConfigService, RenderFormat};
pub use settings::{BackendKind, BackendSettings, EncryptSettings, ServerSettings};
