//! The resolved configuration document and its property sources

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered flat map of dotted keys to string values.
pub type PropertyMap = IndexMap<String, String>;

/// One named, ordered key-value map contributing to an [`Environment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySource {
    /// Opaque, backend-qualified name (usually where the values came from)
    pub name: String,

    /// Flat dotted keys in the order they were read
    pub source: PropertyMap,
}

impl PropertySource {
    pub fn new(name: impl Into<String>, source: PropertyMap) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.source.get(key).map(String::as_str)
    }
}

/// Configuration resolved for one `(application, profiles, label)` request.
///
/// `property_sources` runs from highest to lowest precedence. Combining two
/// environments only ever concatenates in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: String,
    pub profiles: Vec<String>,
    pub label: Option<String>,

    /// Exact commit id (or backend equivalent) the sources were read at
    pub version: Option<String>,

    /// Backend specific state marker, reported verbatim
    pub state: Option<String>,

    pub property_sources: Vec<PropertySource>,
}

impl Environment {
    pub fn new(name: impl Into<String>, profiles: &[String], label: Option<&str>) -> Self {
        Self {
            name: name.into(),
            profiles: profiles.to_vec(),
            label: label.map(str::to_string),
            version: None,
            state: None,
            property_sources: Vec::new(),
        }
    }

    /// Insert `source` ahead of every existing source.
    pub fn add_first(&mut self, source: PropertySource) {
        self.property_sources.insert(0, source);
    }

    /// Append `source` below every existing source.
    pub fn add(&mut self, source: PropertySource) {
        self.property_sources.push(source);
    }

    /// Append every source of `other`, preserving its internal order.
    pub fn append(&mut self, other: Environment) {
        self.property_sources.extend(other.property_sources);
    }

    pub fn is_empty(&self) -> bool {
        self.property_sources.iter().all(PropertySource::is_empty)
    }

    /// Look up `key`, honoring precedence.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.property_sources.iter().find_map(|ps| ps.get(key))
    }

    /// All keys collapsed into one map; the first occurrence of a key wins.
    ///
    /// Keys keep the position of their highest-precedence occurrence.
    pub fn merged(&self) -> PropertyMap {
        let mut merged = PropertyMap::new();
        for source in &self.property_sources {
            for (key, value) in &source.source {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn source(name: &str, pairs: &[(&str, &str)]) -> PropertySource {
        PropertySource::new(
            name,
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn merged_prefers_first_source() {
        let mut env = Environment::new("foo", &["dev".to_string()], None);
        env.add(source("high", &[("x", "1"), ("y", "high")]));
        env.add(source("low", &[("x", "3"), ("z", "low")]));

        let merged = env.merged();
        let pairs: Vec<_> = merged.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(pairs, vec![("x", "1"), ("y", "high"), ("z", "low")]);
        assert_eq!(env.get("x"), Some("1"));
    }

    #[test]
    fn add_first_takes_precedence() {
        let mut env = Environment::new("foo", &[], None);
        env.add(source("file", &[("x", "2")]));
        env.add_first(source("overrides", &[("x", "1")]));
        assert_eq!(env.get("x"), Some("1"));
        assert_eq!(env.property_sources[0].name, "overrides");
    }

    #[test]
    fn append_concatenates_without_resorting() {
        let mut first = Environment::new("foo", &[], None);
        first.add(source("b", &[]));
        let mut second = Environment::new("foo", &[], None);
        second.add(source("a", &[]));
        second.add(source("c", &[]));

        first.append(second);
        let names: Vec<_> = first.property_sources.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn serializes_with_camel_case_sources() {
        let mut env = Environment::new("foo", &["dev".to_string()], Some("main"));
        env.version = Some("abc123".to_string());
        env.add(source("file:foo.yml", &[("b", "2"), ("a", "1")]));

        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "foo",
                "profiles": ["dev"],
                "label": "main",
                "version": "abc123",
                "state": null,
                "propertySources": [
                    {"name": "file:foo.yml", "source": {"b": "2", "a": "1"}}
                ]
            })
        );
        // preserve_order keeps source keys in insertion order
        let text = serde_json::to_string(&env).unwrap();
        assert!(text.find("\"b\"").unwrap() < text.find("\"a\"").unwrap());
    }
}
