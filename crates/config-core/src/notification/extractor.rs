//! Payload shapes of the git hosting services that send push notifications

use serde_json::Value;

use super::Headers;

/// Outcome of running one extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The notification is not of this shape; try the next extractor.
    NoMatch,
    /// Raw paths of the files the change touched.
    Paths(Vec<String>),
}

/// One recognizable notification shape.
///
/// `recognizes` looks only at the headers. `extract` digs the changed paths
/// out of the payload and answers [`Extraction::NoMatch`] when the expected
/// structure is missing or lists no changes.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    pub name: &'static str,
    pub recognizes: fn(&Headers) -> bool,
    pub extract: fn(&Value) -> Extraction,
}

impl Extractor {
    pub fn run(&self, headers: &Headers, payload: &Value) -> Extraction {
        if !(self.recognizes)(headers) {
            return Extraction::NoMatch;
        }
        (self.extract)(payload)
    }
}

/// Built-in extractors in the order they are tried.
pub fn default_extractors() -> Vec<Extractor> {
    vec![
        Extractor {
            name: "github",
            recognizes: |h| h.is_any("X-Github-Event", &["push"]),
            extract: commit_paths,
        },
        Extractor {
            name: "gitlab",
            recognizes: |h| h.is_any("X-Gitlab-Event", &["Push Hook", "System Hook"]),
            extract: commit_paths,
        },
        Extractor {
            name: "gitea",
            recognizes: |h| h.is_any("X-Gitea-Event", &["push"]),
            extract: commit_paths,
        },
        Extractor {
            name: "gogs",
            recognizes: |h| h.is_any("X-Gogs-Event", &["push"]),
            extract: commit_paths,
        },
        Extractor {
            name: "gitee",
            recognizes: |h| h.is_any("X-Gitee-Event", &["Push Hook"]),
            extract: commit_paths,
        },
        Extractor {
            name: "bitbucket",
            recognizes: |h| h.is_any("X-Event-Key", &["repo:push", "repo:refs_changed"]),
            extract: bitbucket_paths,
        },
        Extractor {
            name: "path",
            recognizes: |_| true,
            extract: explicit_paths,
        },
    ]
}

/// `commits[].added|modified|removed`, shared by most hosting services.
fn commit_paths(payload: &Value) -> Extraction {
    let Some(commits) = payload.get("commits").and_then(Value::as_array) else {
        return Extraction::NoMatch;
    };
    let paths: Vec<String> = commits
        .iter()
        .flat_map(|commit| ["added", "modified", "removed"].map(|field| commit.get(field)))
        .flatten()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if paths.is_empty() {
        Extraction::NoMatch
    } else {
        Extraction::Paths(paths)
    }
}

/// Bitbucket does not list files, so every application is affected.
fn bitbucket_paths(payload: &Value) -> Extraction {
    let has_changes = payload.get("push").is_some() || payload.get("changes").is_some();
    if has_changes {
        Extraction::Paths(vec!["application.yml".to_string()])
    } else {
        Extraction::NoMatch
    }
}

/// `{"path": "foo.yml"}` or `{"path": ["foo.yml", "bar.yml"]}`.
fn explicit_paths(payload: &Value) -> Extraction {
    let paths: Vec<String> = match payload.get("path") {
        Some(Value::String(path)) => vec![path.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    if paths.is_empty() {
        Extraction::NoMatch
    } else {
        Extraction::Paths(paths)
    }
}
