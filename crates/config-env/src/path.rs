//! Dotted property keys and their segments
//!
//! Flat property sources address nested values with keys such as
//! `server.hosts[0].name`. These helpers split such keys into segments and
//! build them back up while flattening.
//!
//! ```
//! use config_env::path::{parse_key, KeySegment};
//!
//! assert_eq!(
//!     parse_key("servers[1].host"),
//!     vec![
//!         KeySegment::Key("servers".to_string()),
//!         KeySegment::Index(1),
//!         KeySegment::Key("host".to_string()),
//!     ]
//! );
//! ```

/// A segment of a dotted key - either a map key or a sequence index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySegment {
    Key(String),
    Index(usize),
}

/// Split a dotted key into segments.
///
/// Bracketed content that is not a non-negative integer (`map[a.b]`) is kept
/// as a single map key, so dots inside brackets do not split.
pub fn parse_key(key: &str) -> Vec<KeySegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = key.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if !current.is_empty() {
                    segments.push(KeySegment::Key(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(KeySegment::Key(std::mem::take(&mut current)));
                }
                let mut inner = String::new();
                for ch in chars.by_ref() {
                    if ch == ']' {
                        break;
                    }
                    inner.push(ch);
                }
                match inner.parse::<usize>() {
                    Ok(index) => segments.push(KeySegment::Index(index)),
                    Err(_) if !inner.is_empty() => segments.push(KeySegment::Key(inner)),
                    Err(_) => {}
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        segments.push(KeySegment::Key(current));
    }

    segments
}

/// Append a map key to a dotted prefix.
pub fn child_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else if key.contains('.') {
        // keep keys with dots addressable as one segment
        format!("{prefix}[{key}]")
    } else {
        format!("{prefix}.{key}")
    }
}

/// Append a sequence index to a dotted prefix.
pub fn index_key(prefix: &str, index: usize) -> String {
    format!("{prefix}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        assert_eq!(parse_key("name"), vec![KeySegment::Key("name".to_string())]);
    }

    #[test]
    fn parse_dotted() {
        assert_eq!(
            parse_key("spring.datasource.url"),
            vec![
                KeySegment::Key("spring".to_string()),
                KeySegment::Key("datasource".to_string()),
                KeySegment::Key("url".to_string()),
            ]
        );
    }

    #[test]
    fn parse_nested_indexes() {
        assert_eq!(
            parse_key("matrix[1][0]"),
            vec![
                KeySegment::Key("matrix".to_string()),
                KeySegment::Index(1),
                KeySegment::Index(0),
            ]
        );
    }

    #[test]
    fn parse_bracketed_map_key() {
        assert_eq!(
            parse_key("routes[api.v1].uri"),
            vec![
                KeySegment::Key("routes".to_string()),
                KeySegment::Key("api.v1".to_string()),
                KeySegment::Key("uri".to_string()),
            ]
        );
    }

    #[test]
    fn child_and_index_keys() {
        assert_eq!(child_key("", "a"), "a");
        assert_eq!(child_key("a", "b"), "a.b");
        assert_eq!(child_key("a", "b.c"), "a[b.c]");
        assert_eq!(index_key("list", 3), "list[3]");
    }
}
