//! Backend-neutral rows, as produced by a [`Session`](crate::session::Session).

use neocrud_core::PropertyValue;

/// A node as the store reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: Vec<(String, PropertyValue)>,
}

/// A relationship as the store reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRelationship {
    pub id: i64,
    pub start_node_id: i64,
    pub end_node_id: i64,
    pub typ: String,
    pub properties: Vec<(String, PropertyValue)>,
}

/// One returned column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Node(RawNode),
    Relationship(RawRelationship),
    Scalar(PropertyValue),
}

impl Field {
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Scalar(PropertyValue::Null))
    }
}

/// One returned row, columns in statement order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Field)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, field: Field) -> Self {
        self.fields.push((column.to_string(), field));
        self
    }

    pub fn get(&self, column: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, f)| f)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}
