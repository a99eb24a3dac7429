//! Flattening hierarchical documents into dotted-key property maps

use serde::Deserialize;
use serde_json::Value;
use serde_yaml::Value as YamlValue;

use crate::environment::PropertyMap;
use crate::path::{child_key, index_key};

/// Keys that restrict a YAML document to some profiles.
const ACTIVATION_KEYS: [&str; 2] = ["spring.config.activate.on-profile", "spring.profiles"];

/// Flatten a nested JSON value into dotted keys.
///
/// Scalars become their string form, `null` becomes an empty string, and an
/// empty map or sequence is kept as an empty-string entry so the key is not
/// lost.
pub fn flatten_value(value: &Value) -> PropertyMap {
    let mut map = PropertyMap::new();
    flatten_into(&mut map, "", value);
    map
}

fn flatten_into(map: &mut PropertyMap, prefix: &str, value: &Value) {
    match value {
        Value::Object(entries) if !entries.is_empty() => {
            for (key, nested) in entries {
                flatten_into(map, &child_key(prefix, key), nested);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, nested) in items.iter().enumerate() {
                flatten_into(map, &index_key(prefix, index), nested);
            }
        }
        Value::Object(_) | Value::Array(_) | Value::Null => {
            if !prefix.is_empty() {
                map.insert(prefix.to_string(), String::new());
            }
        }
        Value::String(s) => {
            map.insert(prefix.to_string(), s.clone());
        }
        Value::Bool(b) => {
            map.insert(prefix.to_string(), b.to_string());
        }
        Value::Number(n) => {
            map.insert(prefix.to_string(), n.to_string());
        }
    }
}

/// Parse and flatten a JSON document whose top level is an object.
pub fn flatten_json(content: &str) -> std::result::Result<PropertyMap, String> {
    let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    match value {
        Value::Object(_) => Ok(flatten_value(&value)),
        Value::Null => Ok(PropertyMap::new()),
        _ => Err("top-level value must be an object".to_string()),
    }
}

/// Parse every document of a YAML stream and flatten the ones that apply.
///
/// A document carrying `spring.config.activate.on-profile` (or the older
/// `spring.profiles`) applies only when one of `profiles` matches it; `!p`
/// negates. Applicable documents are layered in order, later ones
/// replacing earlier values.
pub fn flatten_yaml_documents(
    content: &str,
    profiles: &[String],
) -> std::result::Result<PropertyMap, String> {
    let mut merged = PropertyMap::new();

    for document in serde_yaml::Deserializer::from_str(content) {
        let yaml = YamlValue::deserialize(document).map_err(|e| e.to_string())?;
        let json = yaml_to_json(&yaml);
        let flat = match json {
            Value::Null => continue,
            Value::Object(_) => flatten_value(&json),
            _ => return Err("top-level value must be a mapping".to_string()),
        };

        let activation = ACTIVATION_KEYS.iter().find_map(|key| flat.get(*key));
        if let Some(expression) = activation
            && !profile_expression_matches(expression, profiles)
        {
            tracing::trace!(
                expression = %expression,
                "Skipping YAML document for inactive profile"
            );
            continue;
        }

        for (key, value) in flat {
            merged.insert(key, value);
        }
    }

    Ok(merged)
}

/// Whether a comma-separated activation expression matches any active profile.
fn profile_expression_matches(expression: &str, profiles: &[String]) -> bool {
    expression
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|p| match p.strip_prefix('!') {
            Some(negated) => !profiles.iter().any(|active| active == negated),
            None => profiles.iter().any(|active| active == p),
        })
}

/// Convert a YAML value into JSON, keeping mapping order.
///
/// Non-string mapping keys use their scalar text; tags are dropped.
pub fn yaml_to_json(value: &YamlValue) -> Value {
    match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(*b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(n.to_string()))
            }
        }
        YamlValue::String(s) => Value::String(s.clone()),
        YamlValue::Sequence(items) => Value::Array(items.iter().map(yaml_to_json).collect()),
        YamlValue::Mapping(mapping) => {
            let mut object = serde_json::Map::new();
            for (key, nested) in mapping {
                if let Some(key) = scalar_key(key) {
                    object.insert(key, yaml_to_json(nested));
                }
            }
            Value::Object(object)
        }
        YamlValue::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

fn scalar_key(key: &YamlValue) -> Option<String> {
    match key {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Tagged(tagged) => scalar_key(&tagged.value),
        _ => None,
    }
}
