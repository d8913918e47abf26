use thiserror::Error;

use crate::types::{EntityKind, Identity};

/// Failures reported by a store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not lease a session (connectivity, pool exhausted, auth).
    #[error("Store connection error: {0}")]
    Connection(String),

    /// The store rejected or failed a statement.
    #[error("Store statement error: {0}")]
    Statement(String),

    #[error("Unexpected record shape: {0}")]
    RecordShape(String),

    #[error("Unsupported property value for key {key}: {detail}")]
    UnsupportedValue { key: String, detail: String },
}

impl StoreError {
    /// Connectivity problems may succeed on retry; everything else won't.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// How a caller should treat a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input. Rejected before any I/O; never retry.
    Client,
    /// The targeted entity does not exist.
    NotFound,
    /// Part of a multi-statement operation was committed.
    Partial,
    /// Connectivity or timeout. Idempotent operations may be retried.
    Transient,
    /// The store failed the statement for a non-transient reason.
    Fatal,
}

/// Errors surfaced by CRUD operations.
#[derive(Error, Debug)]
pub enum CrudError {
    #[error("Cypher query cancelled because identifier {token:?} is not safe")]
    InvalidIdentifier { token: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{entity} with identity {identity} does not exist")]
    NotFound {
        entity: EntityKind,
        identity: Identity,
    },

    #[error("Cannot create relationship: node {start} or node {end} does not exist")]
    MissingEndpoints { start: Identity, end: Identity },

    /// Properties of the relationship were committed, its type was not.
    #[error(
        "Relationship {identity} properties were updated but its type could not be changed to {requested}: {detail}"
    )]
    TypeChangeFailure {
        identity: Identity,
        requested: String,
        detail: String,
    },

    /// The type-change statement failed at store level. The whole update,
    /// property write included, was rolled back.
    #[error(
        "Relationship {identity} type change to {requested} failed and the update was rolled back, properties unchanged: {source}"
    )]
    TypeChangeAborted {
        identity: Identity,
        requested: String,
        #[source]
        source: StoreError,
    },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("{operation} failed{}: {source}", describe_target(.target))]
    Store {
        operation: &'static str,
        target: Option<Identity>,
        #[source]
        source: StoreError,
    },
}

impl CrudError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidIdentifier { .. } | Self::InvalidArgument(_) => ErrorClass::Client,
            Self::NotFound { .. } | Self::MissingEndpoints { .. } => ErrorClass::NotFound,
            Self::TypeChangeFailure { .. } => ErrorClass::Partial,
            Self::Timeout { .. } => ErrorClass::Transient,
            Self::Store { source, .. } | Self::TypeChangeAborted { source, .. }
                if source.is_transient() =>
            {
                ErrorClass::Transient
            }
            Self::Store { .. } | Self::TypeChangeAborted { .. } => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// True when the store reported the failure, as opposed to a domain outcome.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::Store { .. } | Self::TypeChangeAborted { .. } | Self::Timeout { .. }
        )
    }
}

fn describe_target(target: &Option<Identity>) -> String {
    match target {
        Some(id) => format!(" for identity {id}"),
        None => String::new(),
    }
}
