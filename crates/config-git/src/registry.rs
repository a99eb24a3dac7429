//! One repository instance per remote URI

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::settings::RepositorySettings;
use crate::{Result, VersionedSourceRepository};

/// Hands out a shared [`VersionedSourceRepository`] per distinct URI.
///
/// Several backends (for example pattern-routed sub-repositories) may point
/// at the same remote; sharing the instance makes them share its lock, so
/// serialization really is per URI rather than per backend.
#[derive(Debug, Default)]
pub struct RepositoryRegistry {
    repositories: Mutex<HashMap<String, Arc<VersionedSourceRepository>>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the repository for `settings.uri`, creating it on first use.
    ///
    /// When a repository for the URI already exists its original settings
    /// stay in force.
    pub fn get_or_create(
        &self,
        settings: RepositorySettings,
    ) -> Result<Arc<VersionedSourceRepository>> {
        let mut repositories = self
            .repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = repositories.get(&settings.uri) {
            if existing.settings() != &settings {
                tracing::debug!(
                    uri = %settings.uri,
                    "Reusing repository registered with different settings"
                );
            }
            return Ok(Arc::clone(existing));
        }

        let uri = settings.uri.clone();
        let repository = Arc::new(VersionedSourceRepository::new(settings)?);
        repositories.insert(uri, Arc::clone(&repository));
        Ok(repository)
    }

    pub fn get(&self, uri: &str) -> Option<Arc<VersionedSourceRepository>> {
        self.repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
