//! Deterministic directory names for local mirrors of remote repositories

use sha2::{Digest, Sha256};

/// Longest slug kept in a mirror directory name before the hash suffix.
const MAX_SLUG_LEN: usize = 48;

/// Hex characters of the URI digest appended to every mirror name.
const HASH_LEN: usize = 12;

/// Map a remote URI to a stable, filesystem-safe directory name.
///
/// The name is a readable slug of the URI followed by a digest of the full
/// URI, so two URIs that slugify identically still get distinct mirrors and
/// the same URI maps to the same directory across restarts.
///
/// `https://github.com/acme/config.git` -> `github-com-acme-config-git-<hash>`
pub fn mirror_directory_name(uri: &str) -> String {
    let without_scheme = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
    // drop credentials embedded in the authority
    let without_userinfo = match without_scheme.split_once('@') {
        Some((user, rest)) if !user.contains('/') => rest,
        _ => without_scheme,
    };

    let mut slug = slugify(without_userinfo);
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    let digest = format!("{:x}", Sha256::digest(uri.as_bytes()));
    let hash = &digest[..HASH_LEN];

    if slug.is_empty() {
        format!("repo-{}", hash)
    } else {
        format!("{}-{}", slug, hash)
    }
}

/// Convert arbitrary text into a flat slug of ASCII alphanumerics and dashes.
pub fn slugify(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut last_was_dash = true; // Start true to skip leading dashes

    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            result.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            result.push('-');
            last_was_dash = true;
        }
    }

    if result.ends_with('-') {
        result.pop();
    }

    result
}
