//! In-process graph store implementing the session contract.
//!
//! Used by tests and by the CLI's `--store memory` mode. Statements are
//! dispatched on their [`StatementKind`] and bound parameters; the Cypher
//! text is never interpreted. Store behaviors the CRUD layer depends on are
//! reproduced: separate identity spaces for nodes and relationships, null
//! properties dropped on write, nested maps rejected as property values,
//! refusal to delete a node that still has relationships, and type changes
//! that recreate the relationship under a new identity.
//!
//! Rollback restores whole-entity snapshots taken when the session wrote.
//! It is not isolated: rolling back after another session committed a write
//! to the same node or relationship overwrites that write.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use neocrud_core::{Properties, PropertyValue, StoreError};

use crate::builder::{Statement, StatementKind};
use crate::record::{Field, RawNode, RawRelationship, Record};
use crate::session::{Release, Session, SessionSource};

#[derive(Debug, Clone)]
struct MemNode {
    labels: Vec<String>,
    properties: Properties,
}

#[derive(Debug, Clone)]
struct MemRel {
    start: i64,
    end: i64,
    rel_type: String,
    properties: Properties,
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: BTreeMap<i64, MemNode>,
    rels: BTreeMap<i64, MemRel>,
    next_node_id: i64,
    next_rel_id: i64,
}

/// Inverse of one applied write.
enum Undo {
    RemoveNode(i64),
    RestoreNode(i64, MemNode),
    RemoveRel(i64),
    RestoreRel(i64, MemRel),
}

#[derive(Debug, Default)]
struct Faults {
    fail_next: Option<String>,
    fail_kind: Option<(StatementKind, String)>,
    fail_release: Option<String>,
    refused_types: HashMap<String, String>,
    statement_delay: Option<Duration>,
    unavailable: bool,
}

struct Inner {
    graph: Mutex<GraphState>,
    faults: Mutex<Faults>,
    pool: Arc<Semaphore>,
    active: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    statements: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-memory graph with a bounded session pool. Clone is cheap.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(16)
    }
}

impl MemoryStore {
    /// Create an empty store allowing `max_sessions` concurrent leases.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                graph: Mutex::new(GraphState::default()),
                faults: Mutex::new(Faults::default()),
                pool: Arc::new(Semaphore::new(max_sessions)),
                active: AtomicUsize::new(0),
                commits: AtomicUsize::new(0),
                rollbacks: AtomicUsize::new(0),
                statements: AtomicUsize::new(0),
            }),
        }
    }

    // ── Fault Injection ──────────────────────────────────────────

    /// The next statement on any session fails with `message`.
    pub fn fail_next_statement(&self, message: &str) {
        lock(&self.inner.faults).fail_next = Some(message.to_string());
    }

    /// The next statement of `kind` fails with `message`.
    pub fn fail_next_of_kind(&self, kind: StatementKind, message: &str) {
        lock(&self.inner.faults).fail_kind = Some((kind, message.to_string()));
    }

    /// The next release fails with `message`. Its writes are discarded, as
    /// when a commit does not reach the server.
    pub fn fail_next_release(&self, message: &str) {
        lock(&self.inner.faults).fail_release = Some(message.to_string());
    }

    /// Type changes to `rel_type` report `reason` in their error column.
    pub fn refuse_relationship_type(&self, rel_type: &str, reason: &str) {
        lock(&self.inner.faults)
            .refused_types
            .insert(rel_type.to_string(), reason.to_string());
    }

    /// Sleep this long before executing each statement.
    pub fn set_statement_delay(&self, delay: Option<Duration>) {
        lock(&self.inner.faults).statement_delay = delay;
    }

    /// Refuse to lease sessions, like an unreachable server.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.inner.faults).unavailable = unavailable;
    }

    // ── Accounting ───────────────────────────────────────────────

    /// Sessions currently leased and not yet released or dropped.
    pub fn active_sessions(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.inner.rollbacks.load(Ordering::SeqCst)
    }

    /// Statements that reached the store.
    pub fn statements_run(&self) -> usize {
        self.inner.statements.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionSource for MemoryStore {
    async fn acquire(&self) -> Result<Box<dyn Session>, StoreError> {
        let unavailable = lock(&self.inner.faults).unavailable;
        if unavailable {
            return Err(StoreError::Connection(
                "memory store is unavailable".to_string(),
            ));
        }
        let permit = Arc::clone(&self.inner.pool)
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Connection("session pool closed".to_string()))?;
        self.inner.active.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemorySession {
            inner: Arc::clone(&self.inner),
            _permit: permit,
            undo: Vec::new(),
            released: false,
        }))
    }
}

struct MemorySession {
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
    undo: Vec<Undo>,
    released: bool,
}

impl MemorySession {
    fn execute(&mut self, statement: &Statement) -> Result<Vec<Record>, StoreError> {
        {
            let mut faults = lock(&self.inner.faults);
            if let Some(message) = faults.fail_next.take() {
                return Err(StoreError::Statement(message));
            }
            if faults.fail_kind.as_ref().is_some_and(|(k, _)| *k == statement.kind) {
                if let Some((_, message)) = faults.fail_kind.take() {
                    return Err(StoreError::Statement(message));
                }
            }
        }
        let refused = lock(&self.inner.faults).refused_types.clone();
        let mut graph = lock(&self.inner.graph);
        graph.apply(statement, &refused, &mut self.undo)
    }

    fn roll_back(&mut self) {
        let mut graph = lock(&self.inner.graph);
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::RemoveNode(id) => {
                    graph.nodes.remove(&id);
                }
                Undo::RestoreNode(id, node) => {
                    graph.nodes.insert(id, node);
                }
                Undo::RemoveRel(id) => {
                    graph.rels.remove(&id);
                }
                Undo::RestoreRel(id, rel) => {
                    graph.rels.insert(id, rel);
                }
            }
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn run(&mut self, statement: &Statement) -> Result<Vec<Record>, StoreError> {
        let delay = lock(&self.inner.faults).statement_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.statements.fetch_add(1, Ordering::SeqCst);
        self.execute(statement)
    }

    async fn release(mut self: Box<Self>, release: Release) -> Result<(), StoreError> {
        let failure = lock(&self.inner.faults).fail_release.take();
        if let Some(message) = failure {
            self.roll_back();
            self.released = true;
            return Err(StoreError::Connection(message));
        }
        match release {
            Release::Commit => {
                self.undo.clear();
                self.inner.commits.fetch_add(1, Ordering::SeqCst);
            }
            Release::Rollback => {
                self.roll_back();
                self.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.released = true;
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        // Dropped without release: the server would discard the transaction.
        if !self.released {
            self.roll_back();
        }
        self.inner.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Statement Execution ──────────────────────────────────────────

impl GraphState {
    fn apply(
        &mut self,
        stmt: &Statement,
        refused_types: &HashMap<String, String>,
        undo: &mut Vec<Undo>,
    ) -> Result<Vec<Record>, StoreError> {
        match stmt.kind {
            StatementKind::CreateNode => {
                let node = MemNode {
                    labels: stmt.identifiers.iter().map(|i| i.to_string()).collect(),
                    properties: stored_properties(props_param(stmt, "properties")?)?,
                };
                let id = self.next_node_id;
                self.next_node_id += 1;
                let record = node_record("n", id, &node);
                self.nodes.insert(id, node);
                undo.push(Undo::RemoveNode(id));
                Ok(vec![record])
            }
            StatementKind::ReadNode => {
                let id = int_param(stmt, "identity")?;
                Ok(self
                    .nodes
                    .get(&id)
                    .map(|n| node_record("n", id, n))
                    .into_iter()
                    .collect())
            }
            StatementKind::UpdateNode => {
                let id = int_param(stmt, "identity")?;
                let labels = string_list_param(stmt, "labels")?;
                let properties = stored_properties(props_param(stmt, "properties")?)?;
                let Some(node) = self.nodes.get_mut(&id) else {
                    return Ok(Vec::new());
                };
                let previous = std::mem::replace(node, MemNode { labels, properties });
                let record = node_record("n", id, node);
                undo.push(Undo::RestoreNode(id, previous));
                Ok(vec![record])
            }
            StatementKind::DeleteNode => {
                let id = int_param(stmt, "identity")?;
                if !self.nodes.contains_key(&id) {
                    return Ok(Vec::new());
                }
                if self.rels.values().any(|r| r.start == id || r.end == id) {
                    return Err(StoreError::Statement(format!(
                        "Cannot delete node<{id}>, because it still has relationships. \
                         To delete this node, you must first delete its relationships."
                    )));
                }
                if let Some(node) = self.nodes.remove(&id) {
                    undo.push(Undo::RestoreNode(id, node));
                }
                Ok(Vec::new())
            }
            StatementKind::CreateRelationship => {
                let start = int_param(stmt, "start")?;
                let end = int_param(stmt, "end")?;
                let rel_type = stmt
                    .identifiers
                    .first()
                    .map(|i| i.to_string())
                    .ok_or_else(|| {
                        StoreError::Statement("relationship type missing".to_string())
                    })?;
                let properties = stored_properties(props_param(stmt, "properties")?)?;
                if !self.nodes.contains_key(&start) || !self.nodes.contains_key(&end) {
                    return Ok(Vec::new());
                }
                let rel = MemRel {
                    start,
                    end,
                    rel_type,
                    properties,
                };
                let id = self.next_rel_id;
                self.next_rel_id += 1;
                let record = rel_record("r", id, &rel);
                self.rels.insert(id, rel);
                undo.push(Undo::RemoveRel(id));
                Ok(vec![record])
            }
            StatementKind::ReadRelationship => {
                let id = int_param(stmt, "identity")?;
                Ok(self
                    .rels
                    .get(&id)
                    .map(|r| rel_record("r", id, r))
                    .into_iter()
                    .collect())
            }
            StatementKind::SetRelationshipProperties => {
                let id = int_param(stmt, "identity")?;
                let properties = stored_properties(props_param(stmt, "properties")?)?;
                let Some(rel) = self.rels.get_mut(&id) else {
                    return Ok(Vec::new());
                };
                let previous = rel.clone();
                rel.properties = properties;
                let record = rel_record("r", id, rel);
                undo.push(Undo::RestoreRel(id, previous));
                Ok(vec![record])
            }
            StatementKind::SetRelationshipType => {
                let id = int_param(stmt, "identity")?;
                let new_type = string_param(stmt, "type")?;
                let Some(old) = self.rels.get(&id).cloned() else {
                    return Ok(Vec::new());
                };
                if let Some(reason) = refused_types.get(&new_type) {
                    let record = Record::new()
                        .with("output", Field::Scalar(PropertyValue::Null))
                        .with("type_error", Field::Scalar(reason.as_str().into()));
                    return Ok(vec![record]);
                }
                let rel = MemRel {
                    rel_type: new_type,
                    ..old.clone()
                };
                let new_id = self.next_rel_id;
                self.next_rel_id += 1;
                self.rels.remove(&id);
                let record = rel_record("output", new_id, &rel)
                    .with("type_error", Field::Scalar(PropertyValue::Null));
                self.rels.insert(new_id, rel);
                undo.push(Undo::RestoreRel(id, old));
                undo.push(Undo::RemoveRel(new_id));
                Ok(vec![record])
            }
            StatementKind::DeleteRelationship => {
                let id = int_param(stmt, "identity")?;
                if let Some(rel) = self.rels.remove(&id) {
                    undo.push(Undo::RestoreRel(id, rel));
                }
                Ok(Vec::new())
            }
            StatementKind::AllNodes => Ok(self
                .nodes
                .iter()
                .map(|(id, n)| node_record("n", *id, n))
                .collect()),
            StatementKind::AllRelationships => Ok(self
                .rels
                .iter()
                .map(|(id, r)| rel_record("r", *id, r))
                .collect()),
            StatementKind::MovieSearch => {
                let pattern = string_param(stmt, "title")?;
                let needle = keyword_from_pattern(&pattern)
                    .ok_or_else(|| {
                        StoreError::Statement(format!("unsupported title pattern {pattern:?}"))
                    })?
                    .to_lowercase();
                Ok(self
                    .nodes
                    .iter()
                    .filter(|(_, n)| n.labels.iter().any(|l| l == "Movie"))
                    .filter(|(_, n)| {
                        n.properties
                            .get("title")
                            .and_then(PropertyValue::as_str)
                            .is_some_and(|t| t.to_lowercase().contains(&needle))
                    })
                    .map(|(id, n)| node_record("movie", *id, n))
                    .collect())
            }
            StatementKind::Probe => Ok(vec![
                Record::new().with("version", Field::Scalar("memory".into()))
            ]),
        }
    }
}

fn node_record(column: &str, id: i64, node: &MemNode) -> Record {
    Record::new().with(
        column,
        Field::Node(RawNode {
            id,
            labels: node.labels.clone(),
            properties: node.properties.clone().into_iter().collect(),
        }),
    )
}

fn rel_record(column: &str, id: i64, rel: &MemRel) -> Record {
    Record::new().with(
        column,
        Field::Relationship(RawRelationship {
            id,
            start_node_id: rel.start,
            end_node_id: rel.end,
            typ: rel.rel_type.clone(),
            properties: rel.properties.clone().into_iter().collect(),
        }),
    )
}

/// Recover the keyword from the pattern built by `builder::contains_pattern`.
fn keyword_from_pattern(pattern: &str) -> Option<String> {
    let rest = pattern.strip_prefix("(?i).*")?;
    if rest.is_empty() {
        return Some(String::new());
    }
    let quoted = rest.strip_prefix("\\Q")?.strip_suffix("\\E.*")?;
    Some(quoted.replace("\\E\\\\E\\Q", "\\E"))
}

/// Apply the store's property rules: nulls are not stored, maps are not values.
fn stored_properties(props: Properties) -> Result<Properties, StoreError> {
    let mut stored = Properties::new();
    for (key, value) in props {
        match value {
            PropertyValue::Null => {}
            PropertyValue::Map(_) => {
                return Err(StoreError::Statement(format!(
                    "Property values can only be of primitive types or arrays thereof (key {key:?})"
                )))
            }
            other => {
                stored.insert(key, other);
            }
        }
    }
    Ok(stored)
}

fn missing(name: &str) -> StoreError {
    StoreError::Statement(format!("Expected parameter ${name}"))
}

fn int_param(stmt: &Statement, name: &str) -> Result<i64, StoreError> {
    stmt.get_param(name)
        .and_then(PropertyValue::as_i64)
        .ok_or_else(|| missing(name))
}

fn string_param(stmt: &Statement, name: &str) -> Result<String, StoreError> {
    stmt.get_param(name)
        .and_then(PropertyValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing(name))
}

fn props_param(stmt: &Statement, name: &str) -> Result<Properties, StoreError> {
    match stmt.get_param(name) {
        Some(PropertyValue::Map(props)) => Ok(props.clone()),
        _ => Err(missing(name)),
    }
}

fn string_list_param(stmt: &Statement, name: &str) -> Result<Vec<String>, StoreError> {
    match stmt.get_param(name) {
        Some(PropertyValue::List(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(|| missing(name)))
            .collect(),
        _ => Err(missing(name)),
    }
}
