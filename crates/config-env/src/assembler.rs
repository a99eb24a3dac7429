//! Assembling ordered property sources from a materialized file tree

use std::collections::HashSet;

use config_fs::NormalizedPath;

use crate::environment::{PropertyMap, PropertySource};
use crate::format::{KNOWN_EXTENSIONS, load_source};
use crate::naming::SHARED_APPLICATION;
use crate::request::ConfigRequest;
use crate::search::expand_search_paths;
use crate::{Error, Result};

/// Name given to the property source built from an overrides map.
pub const OVERRIDES_SOURCE: &str = "overrides";

/// Turns a file tree plus a [`ConfigRequest`] into ordered property sources.
///
/// Precedence, highest first:
///
/// 1. the overrides map, when non-empty
/// 2. for each requested profile in caller order: `{application}-{profile}`
///    then `application-{profile}`
/// 3. `{application}`
/// 4. `application`
///
/// Within one file name, search paths are tried in declared order and
/// extensions in [`KNOWN_EXTENSIONS`] order; every existing file contributes
/// its own source.
#[derive(Debug, Clone, Default)]
pub struct PropertySourceAssembler {
    search_paths: Vec<String>,
    overrides: PropertyMap,
}

impl PropertySourceAssembler {
    pub fn new(search_paths: Vec<String>) -> Self {
        Self {
            search_paths,
            overrides: PropertyMap::new(),
        }
    }

    /// Values that take precedence over every file.
    pub fn with_overrides(mut self, overrides: PropertyMap) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn search_paths(&self) -> &[String] {
        &self.search_paths
    }

    /// Build the property sources for `request` from the tree at `root`.
    ///
    /// Each file source is named `{name_prefix}{path relative to root}`. A
    /// missing directory or file is never an error; an unparseable file is.
    pub fn assemble(
        &self,
        root: &NormalizedPath,
        name_prefix: &str,
        request: &ConfigRequest,
    ) -> Result<Vec<PropertySource>> {
        let mut sources = Vec::new();
        if !self.overrides.is_empty() {
            sources.push(PropertySource::new(OVERRIDES_SOURCE, self.overrides.clone()));
        }

        let dirs = expand_search_paths(root, &self.search_paths, request)?;
        let mut seen = HashSet::new();

        for name in candidate_names(request) {
            for dir in &dirs {
                for ext in KNOWN_EXTENSIONS {
                    let file = dir.join(&format!("{name}.{ext}"));
                    if !file.is_file() || !seen.insert(file.clone()) {
                        continue;
                    }
                    let values = load_source(&file, &request.profiles)?;
                    let relative = file
                        .relative_to(root)
                        .unwrap_or_else(|| file.as_str().to_string());
                    tracing::debug!(
                        application = %request.application,
                        file = %relative,
                        keys = values.len(),
                        "Loaded property source"
                    );
                    sources.push(PropertySource::new(format!("{name_prefix}{relative}"), values));
                }
            }
        }

        Ok(sources)
    }

    /// Locate a plain-text resource for `request`.
    ///
    /// Profile-qualified variants (`nginx-{profile}.conf`) are tried first for
    /// each profile in order, then `path` itself, across the search paths.
    pub fn find_resource(
        &self,
        root: &NormalizedPath,
        request: &ConfigRequest,
        path: &str,
    ) -> Result<NormalizedPath> {
        let not_found = || Error::NoSuchResource {
            path: path.to_string(),
        };
        let trimmed = path.trim().trim_start_matches(['/', '\\']);
        if trimmed.is_empty() || trimmed.split(['/', '\\']).any(|s| s == "..") {
            return Err(not_found());
        }

        let mut candidates: Vec<String> = request
            .profiles
            .iter()
            .map(|profile| profile_variant(trimmed, profile))
            .collect();
        candidates.push(trimmed.to_string());

        let dirs = expand_search_paths(root, &self.search_paths, request)?;
        for candidate in &candidates {
            for dir in &dirs {
                let file = dir.join(candidate);
                if file.is_file() {
                    return Ok(file);
                }
            }
        }
        Err(not_found())
    }
}

/// File names to look for, highest precedence first, without extension.
fn candidate_names(request: &ConfigRequest) -> Vec<String> {
    let app = request.application.as_str();
    let shared = app == SHARED_APPLICATION;

    let mut names = Vec::new();
    for profile in &request.profiles {
        names.push(format!("{app}-{profile}"));
        if !shared {
            names.push(format!("{SHARED_APPLICATION}-{profile}"));
        }
    }
    names.push(app.to_string());
    if !shared {
        names.push(SHARED_APPLICATION.to_string());
    }
    names
}

/// `dir/name.ext` with `-{profile}` inserted before the extension.
fn profile_variant(path: &str, profile: &str) -> String {
    let (dir, file) = match path.rfind(['/', '\\']) {
        Some(idx) => path.split_at(idx + 1),
        None => ("", path),
    };
    match file.rfind('.') {
        Some(idx) if idx > 0 => format!("{dir}{}-{profile}{}", &file[..idx], &file[idx..]),
        _ => format!("{dir}{file}-{profile}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn candidate_names_follow_precedence() {
        let request = ConfigRequest::parse("foo", "dev,mysql", None);
        assert_eq!(
            candidate_names(&request),
            vec![
                "foo-dev",
                "application-dev",
                "foo-mysql",
                "application-mysql",
                "foo",
                "application",
            ]
        );
    }

    #[test]
    fn shared_application_is_not_listed_twice() {
        let request = ConfigRequest::parse("application", "dev", None);
        assert_eq!(candidate_names(&request), vec!["application-dev", "application"]);
    }

    #[rstest]
    #[case("nginx.conf", "dev", "nginx-dev.conf")]
    #[case("conf/nginx.conf", "dev", "conf/nginx-dev.conf")]
    #[case("Dockerfile", "dev", "Dockerfile-dev")]
    #[case(".env", "dev", ".env-dev")]
    fn profile_variants(#[case] path: &str, #[case] profile: &str, #[case] expected: &str) {
        assert_eq!(profile_variant(path, profile), expected);
    }
}
