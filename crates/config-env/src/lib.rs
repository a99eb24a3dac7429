//! Configuration environments for the config server
//!
//! This crate holds the resolved-document model ([`Environment`],
//! [`PropertySource`]) and everything needed to produce and present it:
//!
//! - [`PropertySourceAssembler`] finds the files that apply to a request in a
//!   materialized tree and orders them by precedence
//! - [`flatten`] and [`properties`] turn YAML, JSON and `.properties` files
//!   into flat dotted-key maps
//! - [`render`] rebuilds nested YAML/JSON (sequences included) or
//!   `.properties` output from a flat map
//! - [`placeholder`] resolves `${key:default}` references
//! - [`naming`] maps changed file names to the identities they may serve

pub mod assembler;
pub mod environment;
pub mod error;
pub mod flatten;
pub mod format;
pub mod naming;
pub mod path;
pub mod placeholder;
pub mod properties;
pub mod render;
pub mod request;
pub mod search;

pub use assembler::{OVERRIDES_SOURCE, PropertySourceAssembler};
pub use environment::{Environment, PropertyMap, PropertySource};
pub use error::{Error, Result};
pub use format::{Format, KNOWN_EXTENSIONS};
pub use placeholder::resolve_placeholders;
pub use request::{ConfigRequest, DEFAULT_PROFILE};
