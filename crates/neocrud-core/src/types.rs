//! Core domain types for the property graph.
//!
//! These types are what the CRUD layer hands back to resolvers. They are
//! plain owned data: nothing in here borrows from a driver row buffer.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Store-assigned identity of a node or relationship.
pub type Identity = i64;

// ── Property Values ───────────────────────────────────────────────

/// A property value as stored on a node or relationship.
///
/// Closed on purpose: a backend value with no variant here is rejected by
/// the mapper instead of being passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(Properties),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                // u64 beyond i64::MAX and all fractional numbers
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        Self::Int(i.into())
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Properties> for PropertyValue {
    fn from(props: Properties) -> Self {
        Self::Map(props)
    }
}

// ── Properties ────────────────────────────────────────────────────

/// String-keyed property map that keeps keys in the order they were received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(Vec<(String, PropertyValue)>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value. A replaced key keeps its original position.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        let pos = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, PropertyValue)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

impl IntoIterator for Properties {
    type Item = (String, PropertyValue);
    type IntoIter = std::vec::IntoIter<(String, PropertyValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PropertiesVisitor;

        impl<'de> Visitor<'de> for PropertiesVisitor {
            type Value = Properties;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of property names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Properties, A::Error> {
                let mut props = Properties::new();
                while let Some((k, v)) = access.next_entry::<String, PropertyValue>()? {
                    props.insert(k, v);
                }
                Ok(props)
            }
        }

        deserializer.deserialize_map(PropertiesVisitor)
    }
}

// ── Entities ──────────────────────────────────────────────────────

/// Which kind of graph entity an identity refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Node,
    Relationship,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => f.write_str("Node"),
            Self::Relationship => f.write_str("Relationship"),
        }
    }
}

/// A node in the property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub identity: Identity,
    pub labels: Vec<String>,
    pub properties: Properties,
}

/// A directed, typed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub identity: Identity,
    pub start: Identity,
    pub end: Identity,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub properties: Properties,
}

/// Every node and every relationship in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodesAndRelationships {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

/// Result row of the predefined movie title search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub title: String,
    pub released: Option<i64>,
    pub tagline: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_keep_insertion_order() {
        let props = Properties::new()
            .with("zeta", 1)
            .with("alpha", "a")
            .with("mid", true);

        let keys: Vec<&str> = props.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);

        let json = serde_json::to_string(&props).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":"a","mid":true}"#);
    }

    #[test]
    fn replacing_a_key_keeps_its_position() {
        let mut props = Properties::new().with("a", 1).with("b", 2);
        let old = props.insert("a", 10);

        assert_eq!(old, Some(PropertyValue::Int(1)));
        let keys: Vec<&str> = props.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(props.get("a"), Some(&PropertyValue::Int(10)));
    }

    #[test]
    fn json_values_map_to_closed_variants() {
        let value = serde_json::json!({
            "name": "Ada",
            "born": 1815,
            "score": 9.5,
            "tags": ["math", "poetry"],
            "meta": {"verified": true, "note": null}
        });

        let PropertyValue::Map(props) = PropertyValue::from(value) else {
            panic!("expected a map");
        };
        assert_eq!(props.get("name").and_then(|v| v.as_str()), Some("Ada"));
        assert_eq!(props.get("born").and_then(|v| v.as_i64()), Some(1815));
        assert_eq!(props.get("score"), Some(&PropertyValue::Float(9.5)));
        assert_eq!(
            props.get("tags"),
            Some(&PropertyValue::List(vec!["math".into(), "poetry".into()]))
        );
        let Some(PropertyValue::Map(meta)) = props.get("meta") else {
            panic!("expected nested map");
        };
        assert!(meta.get("note").unwrap().is_null());
    }

    #[test]
    fn relationship_serializes_type_field() {
        let rel = Relationship {
            identity: 7,
            start: 1,
            end: 2,
            rel_type: "KNOWS".to_string(),
            properties: Properties::new().with("weight", 5),
        };

        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "KNOWS");
        assert_eq!(json["properties"]["weight"], 5);

        let back: Relationship = serde_json::from_value(json).unwrap();
        assert_eq!(back, rel);
    }

    #[test]
    fn empty_listing_serializes_as_empty_arrays() {
        let json = serde_json::to_value(NodesAndRelationships::default()).unwrap();
        assert_eq!(json, serde_json::json!({"nodes": [], "relationships": []}));
    }
}
