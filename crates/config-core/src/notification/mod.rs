//! Turning change notifications into the configuration identities they touch

mod extractor;
mod router;

pub use extractor::{Extraction, Extractor, default_extractors};
pub use router::{NotificationPathSet, NotificationRouter};

/// Request headers with case-insensitive lookup by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((name.into(), value.into()));
        self
    }

    /// First value of header `name`, compared ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
    }

    /// Whether header `name` carries any of `values`, ignoring case.
    pub fn is_any(&self, name: &str, values: &[&str]) -> bool {
        self.get(name)
            .is_some_and(|v| values.iter().any(|expected| expected.eq_ignore_ascii_case(v)))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
