//! Identity of one configuration request

use std::fmt;

/// Profile assumed when a request names none.
pub const DEFAULT_PROFILE: &str = "default";

/// `(application, profiles, label)` as requested by a client.
///
/// Profiles keep the caller's order; earlier profiles take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigRequest {
    pub application: String,
    pub profiles: Vec<String>,
    pub label: Option<String>,
}

impl ConfigRequest {
    /// Build a request, trimming names and falling back to the default profile.
    pub fn new<S: AsRef<str>>(application: &str, profiles: &[S], label: Option<&str>) -> Self {
        let mut normalized: Vec<String> = Vec::with_capacity(profiles.len());
        for profile in profiles.iter().map(|p| p.as_ref().trim()) {
            if !profile.is_empty() && !normalized.iter().any(|p| p == profile) {
                normalized.push(profile.to_string());
            }
        }
        if normalized.is_empty() {
            normalized.push(DEFAULT_PROFILE.to_string());
        }

        Self {
            application: application.trim().to_string(),
            profiles: normalized,
            label: label.map(str::trim).filter(|l| !l.is_empty()).map(str::to_string),
        }
    }

    /// Build a request from a comma-separated profile list such as `dev,mysql`.
    pub fn parse(application: &str, profiles: &str, label: Option<&str>) -> Self {
        let split: Vec<&str> = profiles.split(',').collect();
        Self::new(application, &split, label)
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Cache key identifying this request: `app:p1,p2` with an optional `@label`.
    pub fn cache_key(&self) -> String {
        let mut key = format!("{}:{}", self.application, self.profiles.join(","));
        if let Some(label) = &self.label {
            key.push('@');
            key.push_str(label);
        }
        key
    }
}

impl fmt::Display for ConfigRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}
