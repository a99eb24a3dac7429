//! `${key}` and `${key:default}` placeholder resolution over a merged map

use std::collections::HashSet;

use crate::environment::PropertyMap;

const PREFIX: &str = "${";
const SUFFIX: char = '}';
const DEFAULT_SEPARATOR: char = ':';

/// Resolve placeholders in every value of `map` against the map itself.
///
/// Unresolvable placeholders without a default, and placeholders that take
/// part in a reference cycle, are left verbatim.
pub fn resolve_placeholders(map: &PropertyMap) -> PropertyMap {
    map.iter()
        .map(|(key, value)| {
            let mut visiting = HashSet::from([key.as_str()]);
            (key.clone(), resolve_value(value, map, &mut visiting))
        })
        .collect()
}

fn resolve_value<'a>(value: &str, map: &'a PropertyMap, visiting: &mut HashSet<&'a str>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find(PREFIX) {
        out.push_str(&rest[..start]);
        let body_start = start + PREFIX.len();
        let Some(body_len) = matching_suffix(&rest[body_start..]) else {
            // unterminated: keep the remainder as-is
            out.push_str(&rest[start..]);
            return out;
        };
        let body = &rest[body_start..body_start + body_len];
        let whole = &rest[start..body_start + body_len + 1];
        out.push_str(&resolve_placeholder(body, whole, map, visiting));
        rest = &rest[body_start + body_len + 1..];
    }

    out.push_str(rest);
    out
}

fn resolve_placeholder<'a>(
    body: &str,
    whole: &str,
    map: &'a PropertyMap,
    visiting: &mut HashSet<&'a str>,
) -> String {
    let (name, default) = split_default(body);
    let name = resolve_value(name, map, visiting);

    match map.get_key_value(name.as_str()) {
        Some((key, value)) => {
            if !visiting.insert(key.as_str()) {
                tracing::debug!(key = %key, "Circular placeholder reference left unresolved");
                return whole.to_string();
            }
            let resolved = resolve_value(value, map, visiting);
            visiting.remove(key.as_str());
            resolved
        }
        None => match default {
            Some(default) => resolve_value(default, map, visiting),
            None => whole.to_string(),
        },
    }
}

/// Length of the placeholder body up to its matching `}`, honoring nesting.
fn matching_suffix(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '$' if chars.peek().is_some_and(|&(_, next)| next == '{') => {
                chars.next();
                depth += 1;
            }
            SUFFIX if depth == 0 => return Some(i),
            SUFFIX => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Split `name:default` at the first separator outside nested placeholders.
fn split_default(body: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '$' if chars.peek().is_some_and(|&(_, next)| next == '{') => {
                chars.next();
                depth += 1;
            }
            SUFFIX if depth > 0 => depth -= 1,
            DEFAULT_SEPARATOR if depth == 0 => return (&body[..i], Some(&body[i + 1..])),
            _ => {}
        }
    }
    (body, None)
}
