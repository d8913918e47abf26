//! Neo4j connection management and the Bolt-backed session.

use async_trait::async_trait;
use neo4rs::{
    BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType,
    ConfigBuilder, Graph, Query, Row, Txn,
};

use neocrud_core::{PropertyValue, StoreConfig, StoreError};

use crate::builder::{ColumnKind, Statement};
use crate::record::{Field, RawNode, RawRelationship, Record};
use crate::session::{Release, Session, SessionSource};

/// Thread-safe Neo4j client with connection pooling.
///
/// The pool is bounded by `max_connections`; each leased session holds one
/// pooled connection for the lifetime of an explicit transaction.
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Get a reference to the underlying neo4rs Graph for direct operations.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}

#[async_trait]
impl SessionSource for GraphClient {
    async fn acquire(&self) -> Result<Box<dyn Session>, StoreError> {
        let txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Box::new(GraphSession { txn }))
    }
}

/// One pooled connection inside an open transaction.
///
/// Dropping it unreleased returns the connection to the pool, which resets
/// it and discards the transaction.
struct GraphSession {
    txn: Txn,
}

#[async_trait]
impl Session for GraphSession {
    async fn run(&mut self, statement: &Statement) -> Result<Vec<Record>, StoreError> {
        tracing::trace!(kind = ?statement.kind, "Running statement");
        let mut stream = self
            .txn
            .execute(to_query(statement))
            .await
            .map_err(|e| StoreError::Statement(e.to_string()))?;

        let mut records = Vec::new();
        while let Some(row) = stream
            .next(self.txn.handle())
            .await
            .map_err(|e| StoreError::Statement(e.to_string()))?
        {
            records.push(decode_row(&row, statement)?);
        }
        Ok(records)
    }

    async fn release(self: Box<Self>, release: Release) -> Result<(), StoreError> {
        let GraphSession { txn } = *self;
        let result = match release {
            Release::Commit => txn.commit().await,
            Release::Rollback => txn.rollback().await,
        };
        result.map_err(|e| StoreError::Statement(e.to_string()))
    }
}

// ── Parameter Encoding ───────────────────────────────────────────

fn to_query(statement: &Statement) -> Query {
    statement
        .params
        .iter()
        .fold(neo4rs::query(&statement.text), |q, (name, value)| {
            q.param(name, to_bolt(value))
        })
}

fn to_bolt(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::Null => BoltType::Null(BoltNull),
        PropertyValue::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        PropertyValue::Int(i) => BoltType::Integer(BoltInteger::new(*i)),
        PropertyValue::Float(f) => BoltType::Float(BoltFloat::new(*f)),
        PropertyValue::String(s) => BoltType::String(BoltString::new(s)),
        PropertyValue::List(items) => {
            let mut list = BoltList::with_capacity(items.len());
            for item in items {
                list.push(to_bolt(item));
            }
            BoltType::List(list)
        }
        PropertyValue::Map(props) => {
            let mut map = BoltMap::with_capacity(props.len());
            for (key, item) in props.iter() {
                map.put(BoltString::new(key), to_bolt(item));
            }
            BoltType::Map(map)
        }
    }
}

// ── Row Decoding ─────────────────────────────────────────────────

fn decode_row(row: &Row, statement: &Statement) -> Result<Record, StoreError> {
    let mut record = Record::new();
    for column in &statement.columns {
        let name = column.name;
        let field = match column.kind {
            ColumnKind::Node => match row.get::<Option<neo4rs::Node>>(name) {
                Ok(Some(node)) => Field::Node(decode_node(&node)?),
                Ok(None) => Field::Scalar(PropertyValue::Null),
                Err(e) => return Err(column_error(name, e)),
            },
            ColumnKind::Relationship => match row.get::<Option<neo4rs::Relation>>(name) {
                Ok(Some(rel)) => Field::Relationship(decode_relationship(&rel)?),
                Ok(None) => Field::Scalar(PropertyValue::Null),
                Err(e) => return Err(column_error(name, e)),
            },
            ColumnKind::Scalar => {
                let value: serde_json::Value =
                    row.get(name).map_err(|e| column_error(name, e))?;
                Field::Scalar(PropertyValue::from(value))
            }
        };
        record = record.with(name, field);
    }
    Ok(record)
}

fn decode_node(node: &neo4rs::Node) -> Result<RawNode, StoreError> {
    let mut properties = Vec::new();
    for key in node.keys() {
        let value: serde_json::Value = node.get(key).map_err(|e| unsupported(key, e))?;
        properties.push((key.to_string(), PropertyValue::from(value)));
    }
    Ok(RawNode {
        id: node.id(),
        labels: node.labels().iter().map(|l| l.to_string()).collect(),
        properties,
    })
}

fn decode_relationship(rel: &neo4rs::Relation) -> Result<RawRelationship, StoreError> {
    let mut properties = Vec::new();
    for key in rel.keys() {
        let value: serde_json::Value = rel.get(key).map_err(|e| unsupported(key, e))?;
        properties.push((key.to_string(), PropertyValue::from(value)));
    }
    Ok(RawRelationship {
        id: rel.id(),
        start_node_id: rel.start_node_id(),
        end_node_id: rel.end_node_id(),
        typ: rel.typ().to_string(),
        properties,
    })
}

fn column_error(column: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::RecordShape(format!("column {column}: {e}"))
}

fn unsupported(key: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::UnsupportedValue {
        key: key.to_string(),
        detail: e.to_string(),
    }
}
