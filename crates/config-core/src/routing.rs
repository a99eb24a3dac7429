//! Routing requests by application and profile patterns

use config_env::ConfigRequest;
use config_fs::GlobPattern;

use crate::{Error, Result};

/// Globs matched against `{application}/{profile}`.
///
/// A pattern without `/` names applications only and matches any profile.
/// A request matches when any of its profiles does.
#[derive(Debug, Clone, Default)]
pub struct RoutePatterns {
    patterns: Vec<GlobPattern>,
}

impl RoutePatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| compile(p.as_ref().trim()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, request: &ConfigRequest) -> bool {
        request.profiles.iter().any(|profile| {
            let candidate = format!("{}/{profile}", request.application);
            self.patterns.iter().any(|p| p.matches(&candidate))
        })
    }
}

fn compile(pattern: &str) -> Result<GlobPattern> {
    let full = if pattern.contains('/') {
        pattern.to_string()
    } else {
        format!("{pattern}/*")
    };
    GlobPattern::new(&full).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}
