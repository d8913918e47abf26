//! Named resolver operations over JSON arguments.
//!
//! Argument names and result shapes follow the GraphQL schema the CRUD
//! layer is served under: `Node`, `Relationship`, `NodesAndRelationships`
//! and `Movie` objects, `true` for deletes and `null` for absent reads.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use neocrud_core::{CrudError, Identity, Properties};
use neocrud_store::CrudService;

// ── Operations ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ReadNode,
    ReadRelationship,
    GetAllNodes,
    GetAllNodesAndRelationships,
    Neo4jMovies,
    CreateNode,
    UpdateNode,
    DeleteNode,
    CreateRelationship,
    UpdateRelationship,
    DeleteRelationship,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Self::ReadNode,
        Self::ReadRelationship,
        Self::GetAllNodes,
        Self::GetAllNodesAndRelationships,
        Self::Neo4jMovies,
        Self::CreateNode,
        Self::UpdateNode,
        Self::DeleteNode,
        Self::CreateRelationship,
        Self::UpdateRelationship,
        Self::DeleteRelationship,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ReadNode => "readNode",
            Self::ReadRelationship => "readRelationship",
            Self::GetAllNodes => "getAllNodes",
            Self::GetAllNodesAndRelationships => "getAllNodesAndRelationships",
            Self::Neo4jMovies => "neo4jMovies",
            Self::CreateNode => "createNode",
            Self::UpdateNode => "updateNode",
            Self::DeleteNode => "deleteNode",
            Self::CreateRelationship => "createRelationship",
            Self::UpdateRelationship => "updateRelationship",
            Self::DeleteRelationship => "deleteRelationship",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn is_mutation(self) -> bool {
        !matches!(
            self,
            Self::ReadNode
                | Self::ReadRelationship
                | Self::GetAllNodes
                | Self::GetAllNodesAndRelationships
                | Self::Neo4jMovies
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Arguments ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct IdentityArgs {
    identity: Identity,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoviesArgs {
    #[serde(default)]
    search_keyword: String,
}

#[derive(Debug, Default, Deserialize)]
struct NodeData {
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct UpdateNodeArgs {
    identity: Identity,
    #[serde(default)]
    data: NodeData,
}

#[derive(Debug, Deserialize)]
struct CreateRelationshipArgs {
    #[serde(rename = "type")]
    rel_type: String,
    start: Identity,
    end: Identity,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct UpdateRelationshipArgs {
    identity: Identity,
    #[serde(rename = "type", default)]
    rel_type: Option<String>,
    #[serde(default)]
    start: Option<Identity>,
    #[serde(default)]
    end: Option<Identity>,
    #[serde(default)]
    properties: Properties,
}

// ── Errors ───────────────────────────────────────────────────────

/// Stable error codes reported to resolver callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidIdentifier,
    BadRequest,
    NotFound,
    TypeChangeFailed,
    StoreUnavailable,
    StoreError,
    Timeout,
    UnknownOperation,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidIdentifier => "INVALID_IDENTIFIER",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::TypeChangeFailed => "TYPE_CHANGE_FAILED",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::StoreError => "STORE_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::UnknownOperation => "UNKNOWN_OPERATION",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed resolver call, as the caller sees it.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ResolverError {
    pub code: ErrorCode,
    pub retryable: bool,
    pub message: String,
}

impl ResolverError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::BadRequest,
            retryable: false,
            message: message.into(),
        }
    }

    pub fn unknown_operation(name: &str) -> Self {
        Self {
            code: ErrorCode::UnknownOperation,
            retryable: false,
            message: format!("Unknown operation {name:?}"),
        }
    }
}

impl From<CrudError> for ResolverError {
    fn from(err: CrudError) -> Self {
        let code = match &err {
            CrudError::InvalidIdentifier { .. } => ErrorCode::InvalidIdentifier,
            CrudError::InvalidArgument(_) => ErrorCode::BadRequest,
            CrudError::NotFound { .. } | CrudError::MissingEndpoints { .. } => ErrorCode::NotFound,
            CrudError::TypeChangeFailure { .. } => ErrorCode::TypeChangeFailed,
            CrudError::Timeout { .. } => ErrorCode::Timeout,
            CrudError::Store { source, .. } if source.is_transient() => {
                ErrorCode::StoreUnavailable
            }
            CrudError::Store { .. } => ErrorCode::StoreError,
            CrudError::TypeChangeAborted { source, .. } if source.is_transient() => {
                ErrorCode::StoreUnavailable
            }
            CrudError::TypeChangeAborted { .. } => ErrorCode::StoreError,
        };
        Self {
            code,
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

// ── Resolver ─────────────────────────────────────────────────────

/// Dispatches named operations to a [`CrudService`]. Clone is cheap.
#[derive(Clone)]
pub struct Resolver {
    service: CrudService,
}

impl Resolver {
    pub fn new(service: CrudService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &CrudService {
        &self.service
    }

    /// Run `operation` with `args` (a JSON object, or null for none).
    pub async fn resolve(&self, operation: &str, args: Value) -> Result<Value, ResolverError> {
        let op = Operation::parse(operation)
            .ok_or_else(|| ResolverError::unknown_operation(operation))?;
        tracing::debug!(operation = %op, mutation = op.is_mutation(), "Resolving");

        let result = self.dispatch(op, args).await;
        if let Err(e) = &result {
            tracing::warn!(
                operation = %op,
                code = %e.code,
                retryable = e.retryable,
                error = %e.message,
                "Operation failed"
            );
        }
        result
    }

    async fn dispatch(&self, op: Operation, args: Value) -> Result<Value, ResolverError> {
        let svc = &self.service;
        match op {
            Operation::ReadNode => {
                let a: IdentityArgs = parse_args(op, args)?;
                to_json(svc.read_node(a.identity).await?)
            }
            Operation::ReadRelationship => {
                let a: IdentityArgs = parse_args(op, args)?;
                to_json(svc.read_relationship(a.identity).await?)
            }
            Operation::GetAllNodes => to_json(svc.get_all_nodes().await?),
            Operation::GetAllNodesAndRelationships => {
                to_json(svc.get_all_nodes_and_relationships().await?)
            }
            Operation::Neo4jMovies => {
                let a: MoviesArgs = parse_args(op, args)?;
                to_json(svc.movies_query(&a.search_keyword).await?)
            }
            Operation::CreateNode => {
                let a: NodeData = parse_args(op, args)?;
                to_json(svc.create_node(&a.labels, a.properties).await?)
            }
            Operation::UpdateNode => {
                let a: UpdateNodeArgs = parse_args(op, args)?;
                to_json(
                    svc.update_node(a.identity, &a.data.labels, a.data.properties)
                        .await?,
                )
            }
            Operation::DeleteNode => {
                let a: IdentityArgs = parse_args(op, args)?;
                svc.delete_node(a.identity).await?;
                Ok(Value::Bool(true))
            }
            Operation::CreateRelationship => {
                let a: CreateRelationshipArgs = parse_args(op, args)?;
                to_json(
                    svc.create_relationship(&a.rel_type, a.start, a.end, a.properties)
                        .await?,
                )
            }
            Operation::UpdateRelationship => {
                let a: UpdateRelationshipArgs = parse_args(op, args)?;
                to_json(
                    svc.update_relationship(
                        a.identity,
                        a.rel_type.as_deref(),
                        a.start,
                        a.end,
                        a.properties,
                    )
                    .await?,
                )
            }
            Operation::DeleteRelationship => {
                let a: IdentityArgs = parse_args(op, args)?;
                svc.delete_relationship(a.identity).await?;
                Ok(Value::Bool(true))
            }
        }
    }
}

/// Deserialize operation arguments; a missing argument object reads as `{}`.
fn parse_args<T: DeserializeOwned>(op: Operation, args: Value) -> Result<T, ResolverError> {
    let args = match args {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(args)
        .map_err(|e| ResolverError::bad_request(format!("Invalid arguments for {op}: {e}")))
}

fn to_json<T: Serialize>(value: T) -> Result<Value, ResolverError> {
    serde_json::to_value(value).map_err(|e| ResolverError {
        code: ErrorCode::StoreError,
        retryable: false,
        message: format!("Result could not be encoded: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use neocrud_core::StoreError;
    use neocrud_store::MemoryStore;
    use serde_json::json;

    fn resolver() -> (MemoryStore, Resolver) {
        let store = MemoryStore::new(4);
        let resolver = Resolver::new(CrudService::new(Arc::new(store.clone())));
        (store, resolver)
    }

    #[test]
    fn test_operation_names_roundtrip() {
        for op in Operation::ALL {
            assert_eq!(Operation::parse(op.name()), Some(op));
        }
        assert_eq!(Operation::parse("dropDatabase"), None);
        assert!(Operation::CreateNode.is_mutation());
        assert!(!Operation::Neo4jMovies.is_mutation());
    }

    #[test]
    fn test_error_codes() {
        let cases = [
            (
                CrudError::InvalidIdentifier {
                    token: "a b".to_string(),
                },
                "INVALID_IDENTIFIER",
                false,
            ),
            (
                CrudError::MissingEndpoints { start: 1, end: 2 },
                "NOT_FOUND",
                false,
            ),
            (
                CrudError::Timeout {
                    operation: "readNode",
                    timeout_ms: 5,
                },
                "TIMEOUT",
                true,
            ),
            (
                CrudError::Store {
                    operation: "readNode",
                    target: None,
                    source: StoreError::Connection("refused".to_string()),
                },
                "STORE_UNAVAILABLE",
                true,
            ),
            (
                CrudError::Store {
                    operation: "deleteNode",
                    target: Some(3),
                    source: StoreError::Statement("still has relationships".to_string()),
                },
                "STORE_ERROR",
                false,
            ),
            (
                CrudError::TypeChangeAborted {
                    identity: 3,
                    requested: "KNOWS".to_string(),
                    source: StoreError::Connection("reset".to_string()),
                },
                "STORE_UNAVAILABLE",
                true,
            ),
        ];

        for (err, code, retryable) in cases {
            let resolved = ResolverError::from(err);
            assert_eq!(resolved.code.as_str(), code);
            assert_eq!(resolved.retryable, retryable);
            let encoded = serde_json::to_value(&resolved).unwrap();
            assert_eq!(encoded["code"], code);
        }
    }

    #[tokio::test]
    async fn test_create_and_read_node() {
        let (_, resolver) = resolver();
        let created = resolver
            .resolve(
                "createNode",
                json!({"labels": ["Person"], "properties": {"name": "Ada", "born": 1815}}),
            )
            .await
            .unwrap();
        assert_eq!(created["labels"], json!(["Person"]));
        assert_eq!(created["properties"], json!({"name": "Ada", "born": 1815}));

        let read = resolver
            .resolve("readNode", json!({"identity": created["identity"]}))
            .await
            .unwrap();
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn test_absent_read_is_null() {
        let (_, resolver) = resolver();
        let read = resolver
            .resolve("readRelationship", json!({"identity": 5}))
            .await
            .unwrap();
        assert_eq!(read, Value::Null);
    }

    #[tokio::test]
    async fn test_update_node_takes_data_object() {
        let (_, resolver) = resolver();
        let created = resolver.resolve("createNode", Value::Null).await.unwrap();
        let updated = resolver
            .resolve(
                "updateNode",
                json!({
                    "identity": created["identity"],
                    "data": {"labels": ["Movie"], "properties": {"title": "Up"}}
                }),
            )
            .await
            .unwrap();
        assert_eq!(updated["labels"], json!(["Movie"]));
        assert_eq!(updated["properties"]["title"], "Up");
    }

    #[tokio::test]
    async fn test_relationship_shape_and_delete() {
        let (_, resolver) = resolver();
        let a = resolver.resolve("createNode", json!({})).await.unwrap();
        let b = resolver.resolve("createNode", json!({})).await.unwrap();

        let rel = resolver
            .resolve(
                "createRelationship",
                json!({"type": "KNOWS", "start": a["identity"], "end": b["identity"]}),
            )
            .await
            .unwrap();
        assert_eq!(rel["type"], "KNOWS");
        assert_eq!(rel["start"], a["identity"]);
        assert_eq!(rel["end"], b["identity"]);

        let deleted = resolver
            .resolve("deleteRelationship", json!({"identity": rel["identity"]}))
            .await
            .unwrap();
        assert_eq!(deleted, Value::Bool(true));
    }

    #[tokio::test]
    async fn test_type_change_failure_code() {
        let (store, resolver) = resolver();
        let a = resolver.resolve("createNode", json!({})).await.unwrap();
        let rel = resolver
            .resolve(
                "createRelationship",
                json!({"type": "LIKES", "start": a["identity"], "end": a["identity"]}),
            )
            .await
            .unwrap();
        store.refuse_relationship_type("KNOWS", "locked");

        let err = resolver
            .resolve(
                "updateRelationship",
                json!({
                    "identity": rel["identity"],
                    "type": "KNOWS",
                    "properties": {"weight": 5}
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TypeChangeFailed);
        assert!(err.message.contains("locked"));
    }

    #[tokio::test]
    async fn test_bad_arguments() {
        let (store, resolver) = resolver();

        let err = resolver.resolve("readNode", json!({})).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);

        let err = resolver
            .resolve("deleteNode", json!({"identity": "seven"}))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);

        let err = resolver
            .resolve("createNode", json!({"labels": ["Person); MATCH (n"]}))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidIdentifier);

        let err = resolver.resolve("dropAll", Value::Null).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownOperation);

        assert_eq!(store.statements_run(), 0);
    }

    #[tokio::test]
    async fn test_movies_and_listing() {
        let (_, resolver) = resolver();
        resolver
            .resolve(
                "createNode",
                json!({"labels": ["Movie"], "properties": {"title": "The Matrix", "released": 1999, "tagline": "Welcome to the Real World"}}),
            )
            .await
            .unwrap();

        let movies = resolver
            .resolve("neo4jMovies", json!({"searchKeyword": "MATRIX"}))
            .await
            .unwrap();
        assert_eq!(
            movies,
            json!([{"title": "The Matrix", "released": 1999, "tagline": "Welcome to the Real World"}])
        );

        let all = resolver
            .resolve("getAllNodesAndRelationships", Value::Null)
            .await
            .unwrap();
        assert_eq!(all["nodes"].as_array().map(Vec::len), Some(1));
        assert_eq!(all["relationships"], json!([]));
    }
}
