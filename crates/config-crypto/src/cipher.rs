//! The `{cipher}` tag and inline key-selection prefixes
//!
//! An encrypted value looks like `{cipher}{key:prod}{secret:s3}a1b2...`: the
//! tag, zero or more `{name:value}` hints, then the ciphertext.

use indexmap::IndexMap;

/// Literal tag marking an encrypted value.
pub const CIPHER_MARKER: &str = "{cipher}";

/// Hints used to select an encryptor, such as `key`, `name` or `profiles`.
pub type KeyHints = IndexMap<String, String>;

/// Whether `value` carries the cipher tag.
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(CIPHER_MARKER)
}

/// Split `{k1:v1}{k2:v2}rest` into hints and the remaining text.
///
/// Parsing stops at the first brace group without a `:` so ciphertext that
/// happens to start with `{` is not swallowed.
pub fn split_hints(text: &str) -> (KeyHints, &str) {
    let mut hints = KeyHints::new();
    let mut rest = text;
    while let Some(body) = rest.strip_prefix('{') {
        let Some(end) = body.find('}') else { break };
        let Some((name, value)) = body[..end].split_once(':') else {
            break;
        };
        hints.insert(name.to_string(), value.to_string());
        rest = &body[end + 1..];
    }
    (hints, rest)
}

/// Render hints back into their `{k:v}` prefix form.
pub fn format_hints(hints: &KeyHints) -> String {
    hints
        .iter()
        .map(|(name, value)| format!("{{{name}:{value}}}"))
        .collect()
}

/// An encrypted value with its tag removed and its hints parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherValue<'a> {
    pub hints: KeyHints,
    pub ciphertext: &'a str,
}

impl<'a> CipherValue<'a> {
    /// Parse a tagged value; `None` when the value is not encrypted.
    pub fn parse(value: &'a str) -> Option<Self> {
        let body = value.strip_prefix(CIPHER_MARKER)?;
        let (hints, ciphertext) = split_hints(body);
        Some(Self { hints, ciphertext })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn untagged_values_are_plain() {
        assert!(!is_encrypted("secret"));
        assert!(CipherValue::parse("secret").is_none());
    }

    #[test]
    fn parses_hints_in_order() {
        let parsed = CipherValue::parse("{cipher}{key:prod}{secret:s3}abcdef").unwrap();
        assert_eq!(parsed.ciphertext, "abcdef");
        let hints: Vec<_> = parsed.hints.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(hints, vec![("key", "prod"), ("secret", "s3")]);
    }

    #[test]
    fn brace_without_colon_is_ciphertext() {
        let (hints, rest) = split_hints("{key:a}{opaque}");
        assert_eq!(hints.get("key").map(String::as_str), Some("a"));
        assert_eq!(rest, "{opaque}");
    }

    #[test]
    fn unterminated_prefix_is_ciphertext() {
        let (hints, rest) = split_hints("{key:a");
        assert!(hints.is_empty());
        assert_eq!(rest, "{key:a");
    }

    #[test]
    fn hint_values_may_contain_colons() {
        let (hints, rest) = split_hints("{secret:a:b}x");
        assert_eq!(hints.get("secret").map(String::as_str), Some("a:b"));
        assert_eq!(rest, "x");
    }

    #[test]
    fn format_round_trips() {
        let (hints, _) = split_hints("{key:a}{name:b}");
        assert_eq!(format_hints(&hints), "{key:a}{name:b}");
    }
}
