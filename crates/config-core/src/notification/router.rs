use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use config_env::naming::{ALL, path_tokens};

use super::extractor::{Extraction, Extractor, default_extractors};
use super::Headers;

/// Identities affected by a change: `*`, `app`, `app:profile` or `*:profile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationPathSet(IndexSet<String>);

impl NotificationPathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The set affecting every cached identity.
    pub fn all() -> Self {
        std::iter::once(ALL.to_string()).collect()
    }

    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        self.0.insert(token.into())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for NotificationPathSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a NotificationPathSet {
    type Item = &'a String;
    type IntoIter = indexmap::set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Picks the first extractor that understands a notification and expands
/// the paths it reports into configuration identities.
#[derive(Debug, Clone)]
pub struct NotificationRouter {
    extractors: Vec<Extractor>,
}

impl Default for NotificationRouter {
    fn default() -> Self {
        Self::new(default_extractors())
    }
}

impl NotificationRouter {
    pub fn new(extractors: Vec<Extractor>) -> Self {
        Self { extractors }
    }

    /// Route a notification to the identities it affects.
    ///
    /// Never fails: a notification no extractor understands yields an empty
    /// set, since the next refresh will pick the change up anyway.
    pub fn route(&self, headers: &Headers, payload: &Value) -> NotificationPathSet {
        for extractor in &self.extractors {
            let Extraction::Paths(paths) = extractor.run(headers, payload) else {
                continue;
            };
            let set: NotificationPathSet = paths
                .iter()
                .flat_map(|path| path_tokens(path))
                .collect();
            tracing::info!(
                extractor = extractor.name,
                paths = paths.len(),
                tokens = set.len(),
                "Routed change notification"
            );
            return set;
        }

        tracing::warn!("Change notification matched no known shape; ignoring it");
        NotificationPathSet::new()
    }
}
