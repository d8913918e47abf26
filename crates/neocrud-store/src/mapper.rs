//! Conversion from store rows to domain entities.
//!
//! Every conversion copies; the returned entities own all their data.

use neocrud_core::{Movie, Node, Properties, PropertyValue, Relationship, StoreError};

use crate::record::{Field, RawNode, RawRelationship, Record};

pub struct ResultMapper;

impl ResultMapper {
    pub fn to_node(record: &Record, column: &str) -> Result<Node, StoreError> {
        match field(record, column)? {
            Field::Node(raw) => Ok(Self::node(raw)),
            other => Err(shape(column, "node", other)),
        }
    }

    pub fn to_relationship(record: &Record, column: &str) -> Result<Relationship, StoreError> {
        match field(record, column)? {
            Field::Relationship(raw) => Ok(Self::relationship(raw)),
            other => Err(shape(column, "relationship", other)),
        }
    }

    /// Like [`ResultMapper::to_relationship`], but a null column is `None`.
    pub fn optional_relationship(
        record: &Record,
        column: &str,
    ) -> Result<Option<Relationship>, StoreError> {
        match field(record, column)? {
            Field::Relationship(raw) => Ok(Some(Self::relationship(raw))),
            f if f.is_null() => Ok(None),
            other => Err(shape(column, "relationship", other)),
        }
    }

    pub fn to_movie(record: &Record, column: &str) -> Result<Movie, StoreError> {
        let Field::Node(raw) = field(record, column)? else {
            return Err(StoreError::RecordShape(format!(
                "column {column} is not a movie node"
            )));
        };
        let prop = |key: &str| raw.properties.iter().find(|(k, _)| k == key).map(|(_, v)| v);

        let title = prop("title")
            .and_then(PropertyValue::as_str)
            .ok_or_else(|| {
                StoreError::RecordShape(format!("movie node {} has no string title", raw.id))
            })?
            .to_string();

        Ok(Movie {
            title,
            released: prop("released").and_then(PropertyValue::as_i64),
            tagline: prop("tagline")
                .and_then(PropertyValue::as_str)
                .map(str::to_string),
        })
    }

    pub fn scalar(record: &Record, column: &str) -> Result<PropertyValue, StoreError> {
        match field(record, column)? {
            Field::Scalar(v) => Ok(v.clone()),
            other => Err(shape(column, "scalar", other)),
        }
    }

    pub fn nodes(records: &[Record], column: &str) -> Result<Vec<Node>, StoreError> {
        records.iter().map(|r| Self::to_node(r, column)).collect()
    }

    pub fn relationships(records: &[Record], column: &str) -> Result<Vec<Relationship>, StoreError> {
        records
            .iter()
            .map(|r| Self::to_relationship(r, column))
            .collect()
    }

    fn node(raw: &RawNode) -> Node {
        Node {
            identity: raw.id,
            labels: raw.labels.clone(),
            properties: properties(&raw.properties),
        }
    }

    fn relationship(raw: &RawRelationship) -> Relationship {
        Relationship {
            identity: raw.id,
            start: raw.start_node_id,
            end: raw.end_node_id,
            rel_type: raw.typ.clone(),
            properties: properties(&raw.properties),
        }
    }
}

fn properties(raw: &[(String, PropertyValue)]) -> Properties {
    raw.iter().cloned().collect()
}

fn field<'r>(record: &'r Record, column: &str) -> Result<&'r Field, StoreError> {
    record.get(column).ok_or_else(|| {
        let present: Vec<&str> = record.columns().collect();
        StoreError::RecordShape(format!(
            "missing column {column} (row has {})",
            present.join(", ")
        ))
    })
}

fn shape(column: &str, expected: &str, found: &Field) -> StoreError {
    let found = match found {
        Field::Node(_) => "node",
        Field::Relationship(_) => "relationship",
        Field::Scalar(PropertyValue::Null) => "null",
        Field::Scalar(_) => "scalar",
    };
    StoreError::RecordShape(format!("column {column} is a {found}, expected a {expected}"))
}
