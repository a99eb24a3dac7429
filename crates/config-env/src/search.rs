//! Expansion of search path patterns into concrete directories

use config_fs::{GlobPattern, NormalizedPath, io};

use crate::Result;
use crate::request::ConfigRequest;

pub const APPLICATION_PLACEHOLDER: &str = "{application}";
pub const PROFILE_PLACEHOLDER: &str = "{profile}";
pub const LABEL_PLACEHOLDER: &str = "{label}";

/// Expand `patterns` against `request` into existing directories under `root`.
///
/// Patterns are expanded in declared order, one expansion per profile when
/// the pattern mentions `{profile}`. Segments containing `*` or `?` match
/// subdirectories by glob. Directories that do not exist are skipped, as
/// are expansions that would escape `root`. An empty pattern list searches
/// `root` itself.
pub fn expand_search_paths(
    root: &NormalizedPath,
    patterns: &[String],
    request: &ConfigRequest,
) -> Result<Vec<NormalizedPath>> {
    let defaults = [String::new()];
    let patterns = if patterns.is_empty() { &defaults[..] } else { patterns };

    let mut dirs: Vec<NormalizedPath> = Vec::new();
    for pattern in patterns {
        for relative in substitute(pattern, request) {
            if relative.split(['/', '\\']).any(|segment| segment == "..") {
                tracing::warn!(
                    pattern = %pattern,
                    expanded = %relative,
                    "Ignoring search path outside the repository"
                );
                continue;
            }
            for dir in resolve_globs(root, &relative)? {
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }
    }
    Ok(dirs)
}

/// Replace placeholders, producing one string per profile when needed.
fn substitute(pattern: &str, request: &ConfigRequest) -> Vec<String> {
    if pattern.contains(LABEL_PLACEHOLDER) && request.label.is_none() {
        return Vec::new();
    }

    let base = pattern
        .replace(APPLICATION_PLACEHOLDER, &request.application)
        .replace(LABEL_PLACEHOLDER, request.label().unwrap_or_default());

    if base.contains(PROFILE_PLACEHOLDER) {
        request
            .profiles
            .iter()
            .map(|profile| base.replace(PROFILE_PLACEHOLDER, profile))
            .collect()
    } else {
        vec![base]
    }
}

fn resolve_globs(root: &NormalizedPath, relative: &str) -> Result<Vec<NormalizedPath>> {
    let mut current = vec![root.clone()];
    for segment in relative.split(['/', '\\']).filter(|s| !s.is_empty() && *s != ".") {
        let mut next = Vec::new();
        if segment.contains(['*', '?']) {
            let pattern = GlobPattern::new(segment)?;
            for dir in &current {
                for child in io::list_dirs(dir)? {
                    if child.file_name().is_some_and(|name| pattern.matches(name)) {
                        next.push(child);
                    }
                }
            }
        } else {
            next.extend(current.iter().map(|dir| dir.join(segment)));
        }
        current = next;
    }
    current.retain(NormalizedPath::is_dir);
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn relative(root: &NormalizedPath, dirs: &[NormalizedPath]) -> Vec<String> {
        dirs.iter().filter_map(|d| d.relative_to(root)).collect()
    }

    fn tree(dirs: &[&str]) -> (TempDir, NormalizedPath) {
        let temp = TempDir::new().unwrap();
        for dir in dirs {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        let root = NormalizedPath::new(temp.path());
        (temp, root)
    }

    #[test]
    fn empty_patterns_search_root() {
        let (_temp, root) = tree(&[]);
        let request = ConfigRequest::parse("foo", "dev", None);
        let dirs = expand_search_paths(&root, &[], &request).unwrap();
        assert_eq!(relative(&root, &dirs), vec![""]);
    }

    #[test]
    fn placeholders_expand_per_profile_in_order() {
        let (_temp, root) = tree(&["foo/dev", "foo/prod", "shared"]);
        let request = ConfigRequest::parse("foo", "prod,dev", None);
        let patterns = vec!["{application}/{profile}".to_string(), "shared".to_string()];

        let dirs = expand_search_paths(&root, &patterns, &request).unwrap();
        assert_eq!(relative(&root, &dirs), vec!["foo/prod", "foo/dev", "shared"]);
    }

    #[test]
    fn missing_directories_are_skipped() {
        let (_temp, root) = tree(&["present"]);
        let request = ConfigRequest::parse("foo", "dev", None);
        let patterns = vec!["absent".to_string(), "present".to_string()];
        let dirs = expand_search_paths(&root, &patterns, &request).unwrap();
        assert_eq!(relative(&root, &dirs), vec!["present"]);
    }

    #[test]
    fn label_patterns_need_a_label() {
        let (_temp, root) = tree(&["v1"]);
        let patterns = vec!["{label}".to_string()];

        let without = ConfigRequest::parse("foo", "dev", None);
        assert!(expand_search_paths(&root, &patterns, &without).unwrap().is_empty());

        let with = ConfigRequest::parse("foo", "dev", Some("v1"));
        let dirs = expand_search_paths(&root, &patterns, &with).unwrap();
        assert_eq!(relative(&root, &dirs), vec!["v1"]);
    }

    #[test]
    fn glob_segments_match_subdirectories() {
        let (_temp, root) = tree(&["team-a/config", "team-b/config", "other/config"]);
        let request = ConfigRequest::parse("foo", "dev", None);
        let patterns = vec!["team-*/config".to_string()];
        let dirs = expand_search_paths(&root, &patterns, &request).unwrap();
        assert_eq!(relative(&root, &dirs), vec!["team-a/config", "team-b/config"]);
    }

    #[test]
    fn parent_segments_are_rejected() {
        let (_temp, root) = tree(&["inner"]);
        let request = ConfigRequest::parse("..", "dev", None);
        let patterns = vec!["{application}/inner".to_string()];
        assert!(expand_search_paths(&root, &patterns, &request).unwrap().is_empty());
    }
}
