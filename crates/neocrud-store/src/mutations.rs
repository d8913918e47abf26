//! Write operations for the property graph.
//!
//! Updates overwrite: the supplied property map replaces the stored one and
//! the supplied labels replace the stored labels. Deletes are idempotent.

use neocrud_core::{
    CrudError, EntityKind, Identity, Node, Properties, PropertyValue, Relationship,
};

use crate::builder::QueryBuilder;
use crate::mapper::ResultMapper;
use crate::record::Record;
use crate::sanitize::{Identifier, LabelSet};
use crate::session::Session;
use crate::service::{check_identity, run, store_error, CrudService};

/// Progress of a relationship update on its session.
enum RelationshipUpdate {
    Start,
    PropertiesSet(Relationship),
    TypeChangeAttempted {
        updated: Relationship,
        requested: Identifier,
    },
    Done(Relationship),
}

impl CrudService {
    // ── Nodes ────────────────────────────────────────────────────

    /// Create a node. Either argument may be empty.
    pub async fn create_node<S: AsRef<str>>(
        &self,
        labels: &[S],
        properties: Properties,
    ) -> Result<Node, CrudError> {
        const OP: &str = "createNode";
        let labels = LabelSet::new(labels)?;
        let statement = QueryBuilder::create_node(&labels, properties);

        let node = self
            .scope
            .with_session(OP, None, |session| {
                Box::pin(async move {
                    let rows = run(session, OP, None, &statement).await?;
                    single(OP, None, &rows)
                        .and_then(|row| ResultMapper::to_node(row, "n").map_err(|e| store_error(OP, None, e)))
                })
            })
            .await?;

        tracing::info!(identity = node.identity, labels = ?node.labels, "Created node");
        Ok(node)
    }

    /// Replace the labels and properties of a node.
    pub async fn update_node<S: AsRef<str>>(
        &self,
        identity: Identity,
        labels: &[S],
        properties: Properties,
    ) -> Result<Node, CrudError> {
        const OP: &str = "updateNode";
        let identity = check_identity("identity", identity)?;
        let labels = LabelSet::new(labels)?;
        let statement = QueryBuilder::update_node(identity, &labels, properties);

        let node = self
            .scope
            .with_session(OP, Some(identity), |session| {
                Box::pin(async move {
                    let rows = run(session, OP, Some(identity), &statement).await?;
                    let row = rows.first().ok_or(CrudError::NotFound {
                        entity: EntityKind::Node,
                        identity,
                    })?;
                    ResultMapper::to_node(row, "n").map_err(|e| store_error(OP, Some(identity), e))
                })
            })
            .await?;

        tracing::info!(identity, "Updated node");
        Ok(node)
    }

    /// Delete a node. Deleting an absent node succeeds.
    ///
    /// A node that still has relationships is refused by the store and
    /// surfaces as a store error.
    pub async fn delete_node(&self, identity: Identity) -> Result<(), CrudError> {
        const OP: &str = "deleteNode";
        let identity = check_identity("identity", identity)?;
        let statement = QueryBuilder::delete_node(identity);

        self.scope
            .with_session(OP, Some(identity), |session| {
                Box::pin(async move {
                    run(session, OP, Some(identity), &statement).await?;
                    Ok(())
                })
            })
            .await?;

        tracing::info!(identity, "Deleted node");
        Ok(())
    }

    // ── Relationships ────────────────────────────────────────────

    /// Create a relationship of `rel_type` from `start` to `end`.
    pub async fn create_relationship(
        &self,
        rel_type: &str,
        start: Identity,
        end: Identity,
        properties: Properties,
    ) -> Result<Relationship, CrudError> {
        const OP: &str = "createRelationship";
        let rel_type = Identifier::new(rel_type)?;
        let start = check_identity("start", start)?;
        let end = check_identity("end", end)?;
        let statement = QueryBuilder::create_relationship(&rel_type, start, end, properties);

        let rel = self
            .scope
            .with_session(OP, None, |session| {
                Box::pin(async move {
                    let rows = run(session, OP, None, &statement).await?;
                    let row = rows
                        .first()
                        .ok_or(CrudError::MissingEndpoints { start, end })?;
                    ResultMapper::to_relationship(row, "r").map_err(|e| store_error(OP, None, e))
                })
            })
            .await?;

        tracing::info!(
            identity = rel.identity,
            rel_type = %rel.rel_type,
            start,
            end,
            "Created relationship"
        );
        Ok(rel)
    }

    /// Overwrite the properties of a relationship, then optionally change its type.
    ///
    /// `start` and `end` are accepted for call compatibility and ignored:
    /// endpoints of an existing relationship never change. A `None` or empty
    /// `rel_type`, or the type the relationship already has, skips the type
    /// change.
    ///
    /// Both steps share one session. If the store refuses the type change,
    /// the new properties stay committed under the old type and
    /// [`CrudError::TypeChangeFailure`] carries the store's detail. If the
    /// type-change statement itself fails, nothing is committed and the
    /// error is [`CrudError::TypeChangeAborted`]. A
    /// successful type change recreates the relationship, so the returned
    /// identity may differ from `identity`.
    pub async fn update_relationship(
        &self,
        identity: Identity,
        rel_type: Option<&str>,
        start: Option<Identity>,
        end: Option<Identity>,
        properties: Properties,
    ) -> Result<Relationship, CrudError> {
        const OP: &str = "updateRelationship";
        let identity = check_identity("identity", identity)?;
        let requested = match rel_type {
            Some(t) if !t.is_empty() => Some(Identifier::new(t)?),
            _ => None,
        };
        if start.is_some() || end.is_some() {
            tracing::debug!(identity, ?start, ?end, "Ignoring endpoints on relationship update");
        }
        let set_properties = QueryBuilder::set_relationship_properties(identity, properties);

        let rel = self
            .scope
            .with_session(OP, Some(identity), |session| {
                Box::pin(async move {
                    let mut state = RelationshipUpdate::Start;
                    loop {
                        state = match state {
                            RelationshipUpdate::Start => {
                                let rows =
                                    run(&mut *session, OP, Some(identity), &set_properties).await?;
                                let row = rows.first().ok_or(CrudError::NotFound {
                                    entity: EntityKind::Relationship,
                                    identity,
                                })?;
                                let updated = ResultMapper::to_relationship(row, "r")
                                    .map_err(|e| store_error(OP, Some(identity), e))?;
                                RelationshipUpdate::PropertiesSet(updated)
                            }
                            RelationshipUpdate::PropertiesSet(updated) => match &requested {
                                Some(t) if t.as_str() != updated.rel_type => {
                                    RelationshipUpdate::TypeChangeAttempted {
                                        updated,
                                        requested: t.clone(),
                                    }
                                }
                                _ => RelationshipUpdate::Done(updated),
                            },
                            RelationshipUpdate::TypeChangeAttempted { updated, requested } => {
                                let statement =
                                    QueryBuilder::set_relationship_type(identity, &requested);
                                let rows = session.run(&statement).await.map_err(|source| {
                                    CrudError::TypeChangeAborted {
                                        identity,
                                        requested: requested.to_string(),
                                        source,
                                    }
                                })?;
                                let retyped = type_change_outcome(identity, &requested, &rows)?;
                                tracing::debug!(
                                    identity,
                                    from = %updated.rel_type,
                                    to = %requested,
                                    new_identity = retyped.identity,
                                    "Relationship type changed"
                                );
                                RelationshipUpdate::Done(retyped)
                            }
                            RelationshipUpdate::Done(rel) => break Ok(rel),
                        };
                    }
                })
            })
            .await;

        match &rel {
            Ok(r) => tracing::info!(identity, new_identity = r.identity, "Updated relationship"),
            Err(e @ CrudError::TypeChangeFailure { .. }) => {
                tracing::warn!(identity, error = %e, "Relationship type change refused")
            }
            Err(_) => {}
        }
        rel
    }

    /// Delete a relationship. Deleting an absent relationship succeeds.
    pub async fn delete_relationship(&self, identity: Identity) -> Result<(), CrudError> {
        const OP: &str = "deleteRelationship";
        let identity = check_identity("identity", identity)?;
        let statement = QueryBuilder::delete_relationship(identity);

        self.scope
            .with_session(OP, Some(identity), |session| {
                Box::pin(async move {
                    run(session, OP, Some(identity), &statement).await?;
                    Ok(())
                })
            })
            .await?;

        tracing::info!(identity, "Deleted relationship");
        Ok(())
    }
}

/// The one row a create statement returns.
fn single<'r>(
    operation: &'static str,
    target: Option<Identity>,
    rows: &'r [Record],
) -> Result<&'r Record, CrudError> {
    rows.first().ok_or_else(|| {
        store_error(
            operation,
            target,
            neocrud_core::StoreError::RecordShape("statement returned no rows".to_string()),
        )
    })
}

/// Read the `output`/`type_error` row of a type change.
fn type_change_outcome(
    identity: Identity,
    requested: &Identifier,
    rows: &[Record],
) -> Result<Relationship, CrudError> {
    let failure = |detail: String| CrudError::TypeChangeFailure {
        identity,
        requested: requested.to_string(),
        detail,
    };

    let row = rows
        .first()
        .ok_or_else(|| failure("relationship no longer matched".to_string()))?;

    match ResultMapper::scalar(row, "type_error") {
        Ok(PropertyValue::Null) => {}
        Ok(PropertyValue::String(detail)) if detail.is_empty() => {}
        Ok(PropertyValue::String(detail)) => return Err(failure(detail)),
        Ok(other) => return Err(failure(format!("{other:?}"))),
        Err(e) => return Err(failure(e.to_string())),
    }

    match ResultMapper::optional_relationship(row, "output") {
        Ok(Some(rel)) => Ok(rel),
        Ok(None) => Err(failure("store returned no relationship".to_string())),
        Err(e) => Err(failure(e.to_string())),
    }
}
