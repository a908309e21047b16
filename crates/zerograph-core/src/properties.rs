//! Property maps that treat `null` as absence.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Properties of a node or relationship.
///
/// Assigning `null` removes the key, so no key ever maps to `null` and a
/// lookup of a missing key is indistinguishable from a `null` value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PropertySet(BTreeMap<String, Value>);

impl PropertySet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a property. A `null` value deletes the key instead.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        match value.into() {
            Value::Null => {
                self.0.remove(&key);
            }
            value => {
                self.0.insert(key, value);
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Merge entries in, with `null` values deleting keys.
    pub fn update<K, V, I>(&mut self, entries: I)
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    /// Build from a JSON object. Any other JSON value is rejected.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(map.into_iter().collect()),
            Value::Null => Some(Self::new()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Cypher map literal with keys sorted and quoted where needed.
    pub fn to_cypher(&self) -> String {
        let entries: Vec<String> = self
            .0
            .iter()
            .map(|(key, value)| format!("{}:{}", quote_identifier(key), value))
            .collect();
        format!("{{{}}}", entries.join(","))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for PropertySet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        set.update(iter);
        set
    }
}

impl<'de> Deserialize<'de> for PropertySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, Value>::deserialize(deserializer)?;
        Ok(map.into_iter().collect())
    }
}

impl IntoIterator for PropertySet {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for PropertySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cypher())
    }
}

/// Quote a label, type or key for Cypher unless it is a plain identifier.
pub fn quote_identifier(name: &str) -> String {
    let plain = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn null_assignment_deletes() {
        let mut props = PropertySet::new();
        props.set("name", "Alice");
        props.set("age", 33);
        props.set("name", Value::Null);
        assert!(!props.contains_key("name"));
        assert_eq!(props.get("age"), Some(&json!(33)));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn nulls_never_stored_from_iterators_or_json() {
        let props: PropertySet = [("a", json!(1)), ("b", Value::Null)].into_iter().collect();
        assert_eq!(props.len(), 1);

        let parsed: PropertySet = serde_json::from_value(json!({"x": null, "y": "z"})).unwrap();
        assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["y"]);
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a: PropertySet = [("x", 1), ("y", 2)].into_iter().collect();
        let b: PropertySet = [("y", 2), ("x", 1)].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn cypher_rendering_quotes_odd_keys() {
        let props: PropertySet = [("name", json!("Alice")), ("full name", json!("A B"))]
            .into_iter()
            .collect();
        assert_eq!(props.to_cypher(), r#"{`full name`:"A B",name:"Alice"}"#);
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
        assert_eq!(quote_identifier("1abc"), "`1abc`");
        assert_eq!(quote_identifier("abc1"), "abc1");
    }
}
