//! JSON-lines resolver loop.
//!
//! Each input line is a request `{"id": .., "operation": "..", "args": {..}}`.
//! Requests run concurrently, one task each, so responses may come back out
//! of order; callers match them by `id`. A semaphore bounds how many
//! requests are in flight.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::error::{ApiError, Result};
use crate::resolver::{Resolver, ResolverError};

#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Value,
    pub operation: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResolverError>,
}

impl Response {
    fn from_result(id: Value, result: std::result::Result<Value, ResolverError>) -> Self {
        match result {
            Ok(data) => Self {
                id,
                data: Some(data),
                error: None,
            },
            Err(error) => Self {
                id,
                data: None,
                error: Some(error),
            },
        }
    }
}

/// Counters for one run of [`serve`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeStats {
    pub requests: usize,
    pub malformed: usize,
}

/// Serve requests from `input` until EOF, writing responses to `output`.
///
/// Returns once every accepted request has been answered.
pub async fn serve<R, W>(
    resolver: Resolver,
    input: R,
    output: W,
    max_in_flight: usize,
) -> Result<ServeStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Response>(max_in_flight.max(1));
    let writer = tokio::spawn(write_responses(rx, output));
    let in_flight = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let mut tasks = JoinSet::new();
    let mut stats = ServeStats::default();

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                stats.malformed += 1;
                tracing::warn!(error = %e, "Malformed request line");
                let response = Response::from_result(
                    Value::Null,
                    Err(ResolverError::bad_request(format!("Malformed request: {e}"))),
                );
                if tx.send(response).await.is_err() {
                    break;
                }
                continue;
            }
        };
        stats.requests += 1;

        let permit = Arc::clone(&in_flight)
            .acquire_owned()
            .await
            .map_err(|e| ApiError::Task(e.to_string()))?;
        let resolver = resolver.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let result = resolver.resolve(&request.operation, request.args).await;
            // The writer only goes away when output failed; nothing to report to.
            let _ = tx.send(Response::from_result(request.id, result)).await;
        });

        // Reap finished tasks so the set does not grow with the session.
        while let Some(done) = tasks.try_join_next() {
            if let Err(e) = done {
                tracing::error!(error = %e, "Request task panicked");
            }
        }
    }

    while let Some(done) = tasks.join_next().await {
        if let Err(e) = done {
            tracing::error!(error = %e, "Request task panicked");
        }
    }
    drop(tx);

    writer
        .await
        .map_err(|e| ApiError::Task(e.to_string()))??;

    tracing::info!(
        requests = stats.requests,
        malformed = stats.malformed,
        "Input closed, server stopped"
    );
    Ok(stats)
}

async fn write_responses<W>(mut rx: mpsc::Receiver<Response>, mut output: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    output.shutdown().await?;
    Ok(())
}
