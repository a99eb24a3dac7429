//! Configuration backends
//!
//! Every backend answers the same two questions through
//! [`EnvironmentRepository`]: which property sources apply to a request, and
//! where a named plain-text resource lives. [`Backend`] is the closed set of
//! built-in variants plus a slot for anything else (vendor secret stores).

mod git;
mod native;

pub use git::{GitBackend, GitRoute};
pub use native::NativeBackend;

use std::fmt;
use std::sync::Arc;

use config_env::{ConfigRequest, Environment};

use crate::Result;

/// Capability shared by every configuration backend.
pub trait EnvironmentRepository: Send + Sync + fmt::Debug {
    /// Resolve the environment for `request`.
    ///
    /// Property sources are ordered highest precedence first.
    fn find_one(&self, request: &ConfigRequest) -> Result<Environment>;

    /// Read one plain-text resource as served for `request`.
    fn find_resource(&self, request: &ConfigRequest, path: &str) -> Result<String> {
        let _ = request;
        Err(config_env::Error::NoSuchResource {
            path: path.to_string(),
        }
        .into())
    }

    /// Prepare eagerly at startup, for backends that can.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}

/// One configured backend.
#[derive(Debug, Clone)]
pub enum Backend {
    Git(Arc<GitBackend>),
    Native(Arc<NativeBackend>),
    Custom(Arc<dyn EnvironmentRepository>),
}

impl Backend {
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Git(_) => "git",
            Backend::Native(_) => "native",
            Backend::Custom(_) => "custom",
        }
    }

    fn repository(&self) -> &dyn EnvironmentRepository {
        match self {
            Backend::Git(git) => git.as_ref(),
            Backend::Native(native) => native.as_ref(),
            Backend::Custom(custom) => custom.as_ref(),
        }
    }
}

impl EnvironmentRepository for Backend {
    fn find_one(&self, request: &ConfigRequest) -> Result<Environment> {
        self.repository().find_one(request)
    }

    fn find_resource(&self, request: &ConfigRequest, path: &str) -> Result<String> {
        self.repository().find_resource(request, path)
    }

    fn warm_up(&self) -> Result<()> {
        self.repository().warm_up()
    }
}
