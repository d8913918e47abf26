//! Read operations: single lookups, listings and predefined queries.

use std::time::Instant;

use neocrud_core::{
    CrudError, Identity, Movie, Node, NodesAndRelationships, PropertyValue, Relationship,
    StoreError,
};

use crate::builder::QueryBuilder;
use crate::mapper::ResultMapper;
use crate::record::Record;
use crate::service::{check_identity, run, store_error, CrudService};

impl CrudService {
    // ── Single Lookups ───────────────────────────────────────────

    /// Get a node by identity. An absent node is `None`, not an error.
    pub async fn read_node(&self, identity: Identity) -> Result<Option<Node>, CrudError> {
        const OP: &str = "readNode";
        let identity = check_identity("identity", identity)?;
        let statement = QueryBuilder::read_node(identity);

        self.scope
            .with_session(OP, Some(identity), |session| {
                Box::pin(async move {
                    let rows = run(session, OP, Some(identity), &statement).await?;
                    rows.first()
                        .map(|row| ResultMapper::to_node(row, "n"))
                        .transpose()
                        .map_err(|e| store_error(OP, Some(identity), e))
                })
            })
            .await
    }

    /// Get a relationship by identity. An absent relationship is `None`.
    pub async fn read_relationship(
        &self,
        identity: Identity,
    ) -> Result<Option<Relationship>, CrudError> {
        const OP: &str = "readRelationship";
        let identity = check_identity("identity", identity)?;
        let statement = QueryBuilder::read_relationship(identity);

        self.scope
            .with_session(OP, Some(identity), |session| {
                Box::pin(async move {
                    let rows = run(session, OP, Some(identity), &statement).await?;
                    rows.first()
                        .map(|row| ResultMapper::to_relationship(row, "r"))
                        .transpose()
                        .map_err(|e| store_error(OP, Some(identity), e))
                })
            })
            .await
    }

    // ── Listings ─────────────────────────────────────────────────

    /// Every node in the store, ordered by identity.
    pub async fn get_all_nodes(&self) -> Result<Vec<Node>, CrudError> {
        const OP: &str = "getAllNodes";
        let statement = QueryBuilder::all_nodes();

        let nodes = self
            .scope
            .with_session(OP, None, |session| {
                Box::pin(async move {
                    let rows = run(session, OP, None, &statement).await?;
                    ResultMapper::nodes(&rows, "n").map_err(|e| store_error(OP, None, e))
                })
            })
            .await?;

        tracing::debug!(count = nodes.len(), "Listed nodes");
        Ok(nodes)
    }

    /// Every node and every relationship, read on one session.
    ///
    /// Both lists are always present; an empty store yields two empty lists.
    pub async fn get_all_nodes_and_relationships(
        &self,
    ) -> Result<NodesAndRelationships, CrudError> {
        const OP: &str = "getAllNodesAndRelationships";
        let node_statement = QueryBuilder::all_nodes();
        let rel_statement = QueryBuilder::all_relationships();
        let started = Instant::now();

        let listing = self
            .scope
            .with_session(OP, None, |session| {
                Box::pin(async move {
                    let node_rows = run(&mut *session, OP, None, &node_statement).await?;
                    let nodes = ResultMapper::nodes(&node_rows, "n")
                        .map_err(|e| store_error(OP, None, e))?;

                    let rel_rows = run(session, OP, None, &rel_statement).await?;
                    let relationships = ResultMapper::relationships(&rel_rows, "r")
                        .map_err(|e| store_error(OP, None, e))?;

                    Ok(NodesAndRelationships {
                        nodes,
                        relationships,
                    })
                })
            })
            .await?;

        tracing::debug!(
            nodes = listing.nodes.len(),
            relationships = listing.relationships.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Listed graph"
        );
        Ok(listing)
    }

    // ── Predefined Queries ───────────────────────────────────────

    /// Movies whose title contains `keyword`, ignoring case.
    ///
    /// The keyword matches literally; regex metacharacters in it have no
    /// special meaning. An empty keyword matches every movie.
    pub async fn movies_query(&self, keyword: &str) -> Result<Vec<Movie>, CrudError> {
        const OP: &str = "neo4jMovies";
        let statement = QueryBuilder::movie_search(keyword);

        self.scope
            .with_session(OP, None, |session| {
                Box::pin(async move {
                    let rows = run(session, OP, None, &statement).await?;
                    rows.iter()
                        .map(|row| ResultMapper::to_movie(row, "movie"))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| store_error(OP, None, e))
                })
            })
            .await
    }

    /// Check that the store answers and that APOC is installed.
    ///
    /// Returns the reported APOC version.
    pub async fn verify_connectivity(&self) -> Result<String, CrudError> {
        const OP: &str = "verifyConnectivity";
        let statement = QueryBuilder::probe();

        let version = self
            .scope
            .with_session(OP, None, |session| {
                Box::pin(async move {
                    let rows = run(session, OP, None, &statement).await?;
                    probe_version(&rows).map_err(|e| store_error(OP, None, e))
                })
            })
            .await?;

        tracing::info!(%version, "Store connectivity verified");
        Ok(version)
    }
}

/// The version string of a connectivity probe's single row.
fn probe_version(rows: &[Record]) -> Result<String, StoreError> {
    let row = rows
        .first()
        .ok_or_else(|| StoreError::RecordShape("probe returned no rows".to_string()))?;
    match ResultMapper::scalar(row, "version")? {
        PropertyValue::String(version) if !version.is_empty() => Ok(version),
        other => Err(StoreError::RecordShape(format!(
            "probe version is not a version string: {other:?}"
        ))),
    }
}
