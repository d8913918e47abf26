//! The CRUD service handle shared by every resolver call.
//!
//! Read operations live in [`queries`](crate::queries), writes in
//! [`mutations`](crate::mutations).

use std::sync::Arc;
use std::time::Duration;

use neocrud_core::{CrudError, Identity, StoreConfig, StoreError};

use crate::builder::Statement;
use crate::record::Record;
use crate::session::{Session, SessionScope, SessionSource};

/// CRUD operations over one store. Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct CrudService {
    pub(crate) scope: SessionScope,
}

impl CrudService {
    /// Service without a per-operation timeout.
    pub fn new(source: Arc<dyn SessionSource>) -> Self {
        Self {
            scope: SessionScope::new(source, None),
        }
    }

    /// Service using the configured statement timeout.
    pub fn from_config(source: Arc<dyn SessionSource>, config: &StoreConfig) -> Self {
        Self {
            scope: SessionScope::new(source, config.statement_timeout()),
        }
    }

    /// A handle on the same pool whose operations time out after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            scope: self.scope.with_timeout(Some(timeout)),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.scope.timeout()
    }
}

/// Reject negative identities before any I/O.
pub(crate) fn check_identity(name: &str, identity: Identity) -> Result<Identity, CrudError> {
    if identity < 0 {
        return Err(CrudError::InvalidArgument(format!(
            "{name} must be a non-negative identity, got {identity}"
        )));
    }
    Ok(identity)
}

/// Run one statement, attributing a store failure to `operation`.
pub(crate) async fn run(
    session: &mut (dyn Session + 'static),
    operation: &'static str,
    target: Option<Identity>,
    statement: &Statement,
) -> Result<Vec<Record>, CrudError> {
    session
        .run(statement)
        .await
        .map_err(|source| store_error(operation, target, source))
}

pub(crate) fn store_error(
    operation: &'static str,
    target: Option<Identity>,
    source: StoreError,
) -> CrudError {
    CrudError::Store {
        operation,
        target,
        source,
    }
}
