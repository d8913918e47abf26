//! Store connectivity contract and scoped session leasing.
//!
//! A [`SessionSource`] leases [`Session`]s; [`SessionScope`] is the only
//! code that does so. It hands the session to one operation's statement
//! sequence and releases it exactly once afterwards, whatever the
//! operation returned.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use neocrud_core::{CrudError, Identity, StoreError};

use crate::builder::Statement;
use crate::record::Record;

/// What to do with the work of a session when it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Commit,
    Rollback,
}

/// A leased connection to the store.
#[async_trait]
pub trait Session: Send {
    /// Run one parameterized statement and collect its rows.
    async fn run(&mut self, statement: &Statement) -> Result<Vec<Record>, StoreError>;

    /// Give the connection back to its pool.
    async fn release(self: Box<Self>, release: Release) -> Result<(), StoreError>;
}

/// A size-bounded pool of sessions.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn Session>, StoreError>;
}

/// Future returned by the body of [`SessionScope::with_session`].
pub type SessionFuture<'s, T> = Pin<Box<dyn Future<Output = Result<T, CrudError>> + Send + 's>>;

/// Leases one session per logical operation and guarantees its release.
///
/// Release happens on success, on domain errors, on store errors and on
/// timeout. If the whole operation future is dropped instead (caller-side
/// cancellation), the session is dropped with it and the backend returns
/// its connection to the pool.
#[derive(Clone)]
pub struct SessionScope {
    source: Arc<dyn SessionSource>,
    timeout: Option<Duration>,
}

impl SessionScope {
    pub fn new(source: Arc<dyn SessionSource>, timeout: Option<Duration>) -> Self {
        Self { source, timeout }
    }

    /// Same pool, different per-operation timeout.
    pub fn with_timeout(&self, timeout: Option<Duration>) -> Self {
        Self {
            source: Arc::clone(&self.source),
            timeout,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `body` against one leased session.
    ///
    /// The timeout, when set, bounds the whole operation: waiting for a
    /// free session counts against it. The session is committed when `body` succeeded or failed with a
    /// domain error (every statement ran), and rolled back when a statement
    /// failed at store level or the timeout expired.
    pub async fn with_session<T, F>(
        &self,
        operation: &'static str,
        target: Option<Identity>,
        body: F,
    ) -> Result<T, CrudError>
    where
        T: Send,
        F: for<'s> FnOnce(&'s mut (dyn Session + 'static)) -> SessionFuture<'s, T>,
    {
        let started = Instant::now();
        // One deadline covers waiting for a session and running the body.
        let deadline = self.timeout.map(|limit| (tokio::time::Instant::now() + limit, limit));
        let timed_out = |limit: Duration| CrudError::Timeout {
            operation,
            timeout_ms: limit.as_millis() as u64,
        };

        let acquired = match deadline {
            Some((at, limit)) => tokio::time::timeout_at(at, self.source.acquire())
                .await
                .map_err(|_| timed_out(limit))?,
            None => self.source.acquire().await,
        };
        let mut session = acquired.map_err(|source| CrudError::Store {
            operation,
            target,
            source,
        })?;
        tracing::debug!(operation, ?target, "Session acquired");

        let outcome = match deadline {
            Some((at, limit)) => tokio::time::timeout_at(at, body(session.as_mut()))
                .await
                .unwrap_or_else(|_| Err(timed_out(limit))),
            None => body(session.as_mut()).await,
        };

        let disposition = match &outcome {
            Err(e) if e.is_store_failure() => Release::Rollback,
            _ => Release::Commit,
        };

        if let Err(source) = session.release(disposition).await {
            tracing::warn!(operation, ?target, error = %source, "Session release failed");
            // An uncommitted write must not be reported as done.
            if disposition == Release::Commit {
                return Err(CrudError::Store {
                    operation,
                    target,
                    source,
                });
            }
        }

        tracing::debug!(
            operation,
            ?target,
            ?disposition,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Session released"
        );
        outcome
    }
}
