//! Rendering flat property maps back into hierarchical documents
//!
//! Flat keys are rebuilt into nested maps, and keys with index segments
//! (`list[0]`, `list[1]`) into sequences sized to the highest index seen.
//! Missing indexes are filled with empty strings. Indexes above
//! [`MAX_SEQUENCE_INDEX`] are rejected rather than allocated.

use serde_json::{Map, Value};

use crate::environment::PropertyMap;
use crate::path::{KeySegment, parse_key};
use crate::{Error, Result};

/// Highest sequence index a key may address.
pub const MAX_SEQUENCE_INDEX: usize = 4095;

/// Rebuild the nested document described by a flat map.
///
/// Scalar values are coerced to booleans or numbers when their text
/// round-trips exactly; everything else stays a string. When a key is both
/// a scalar and a parent of other keys, the nested structure wins.
pub fn unflatten(map: &PropertyMap) -> Result<Value> {
    let mut root = Value::Object(Map::new());
    for (key, value) in map {
        let segments = parse_key(key);
        if segments.is_empty() {
            continue;
        }
        if let Some(index) = segments.iter().find_map(|s| match s {
            KeySegment::Index(i) if *i > MAX_SEQUENCE_INDEX => Some(*i),
            _ => None,
        }) {
            return Err(Error::IndexTooLarge {
                key: key.clone(),
                index,
                limit: MAX_SEQUENCE_INDEX,
            });
        }
        insert(&mut root, &segments, coerce(value));
    }
    Ok(root)
}

fn insert(node: &mut Value, segments: &[KeySegment], leaf: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = leaf;
        return;
    };

    let child = match first {
        KeySegment::Key(key) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else { return };
            map.entry(key.clone()).or_insert(Value::Null)
        }
        KeySegment::Index(index) => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            let Value::Array(items) = node else { return };
            if items.len() <= *index {
                items.resize(*index + 1, placeholder());
            }
            &mut items[*index]
        }
    };

    if !rest.is_empty() {
        insert(child, rest, leaf);
    } else if !(child.is_object() || child.is_array()) {
        // an existing nested structure is never replaced by a scalar
        *child = leaf;
    }
}

/// Value used for sequence slots no key addressed.
fn placeholder() -> Value {
    Value::String(String::new())
}

/// Render-time type coercion of a flat string value.
fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>()
        && i.to_string() == raw
    {
        return Value::Number(i.into());
    }
    if let Ok(f) = raw.parse::<f64>()
        && f.is_finite()
        && f.to_string() == raw
        && let Some(n) = serde_json::Number::from_f64(f)
    {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

/// Render a flat map as a YAML document.
pub fn to_yaml(map: &PropertyMap) -> Result<String> {
    let value = unflatten(map)?;
    serde_yaml::to_string(&value).map_err(|e| Error::Render {
        format: "YAML",
        message: e.to_string(),
    })
}

/// Render a flat map as a pretty-printed nested JSON document.
pub fn to_json(map: &PropertyMap) -> Result<String> {
    let value = unflatten(map)?;
    serde_json::to_string_pretty(&value).map_err(|e| Error::Render {
        format: "JSON",
        message: e.to_string(),
    })
}

/// Render a flat map as `.properties` text, one `key: value` line per key in key order.
pub fn to_properties(map: &PropertyMap) -> String {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    for (key, value) in entries {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&escape_properties_value(value));
        out.push('\n');
    }
    out
}

fn escape_properties_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
