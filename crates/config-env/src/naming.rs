//! Mapping stored file names to the configuration identities they may serve
//!
//! A file called `foo-local-dev.yml` could belong to application `foo` with
//! profile `local-dev`, to `foo-local` with profile `dev`, or to an
//! application literally named `foo-local-dev`. The store does not record
//! which was meant, so every reading is kept.

use crate::format::KNOWN_EXTENSIONS;

/// Stem shared by files that apply to every application.
pub const SHARED_APPLICATION: &str = "application";

/// Token matching every application and profile.
pub const ALL: &str = "*";

/// Every `(application, profile)` reading of a hyphenated stem.
///
/// Splits are returned left to right, followed by the whole stem as an
/// application without profile. Splits that leave either side empty are
/// skipped.
pub fn hyphen_splits(stem: &str) -> Vec<(String, Option<String>)> {
    let mut splits: Vec<_> = stem
        .match_indices('-')
        .map(|(i, _)| (&stem[..i], &stem[i + 1..]))
        .filter(|(app, profile)| !app.is_empty() && !profile.is_empty())
        .map(|(app, profile)| (app.to_string(), Some(profile.to_string())))
        .collect();
    if !stem.is_empty() {
        splits.push((stem.to_string(), None));
    }
    splits
}

/// Strip directories and a known extension from a changed file path.
///
/// Both `/` and `\` count as separators. Returns `None` for paths with no
/// file name.
pub fn file_stem(path: &str) -> Option<&str> {
    let name = path
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .filter(|n| !n.is_empty())?;
    let stem = match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && KNOWN_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext)) =>
        {
            stem
        }
        _ => name,
    };
    Some(stem)
}

/// Normalized configuration tokens affected by a change to `path`.
///
/// Tokens are `*` (everything), `*:profile`, `app:profile` or `app`. Files
/// shared by all applications map to `*` or `*:profile`; any other stem that
/// begins with `application` is not a configuration identity and yields
/// nothing.
pub fn path_tokens(path: &str) -> Vec<String> {
    let Some(stem) = file_stem(path) else {
        return Vec::new();
    };

    if stem == SHARED_APPLICATION {
        return vec![ALL.to_string()];
    }
    if let Some(profile) = stem.strip_prefix("application-") {
        if profile.is_empty() {
            return Vec::new();
        }
        return vec![format!("{ALL}:{profile}")];
    }
    if stem.starts_with(SHARED_APPLICATION) {
        return Vec::new();
    }

    hyphen_splits(stem)
        .into_iter()
        .map(|(app, profile)| match profile {
            Some(profile) => format!("{app}:{profile}"),
            None => app,
        })
        .collect()
}
