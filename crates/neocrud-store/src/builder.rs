//! Cypher statement construction.
//!
//! Every statement is text plus named parameters. The only values ever
//! interpolated into the text are label and relationship-type clauses built
//! from [`LabelSet`] / [`Identifier`]; identities, properties and search
//! terms are always parameters.

use neocrud_core::{Identity, Properties, PropertyValue};

use crate::sanitize::{Identifier, LabelSet};

/// Which builder produced a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    CreateNode,
    ReadNode,
    UpdateNode,
    DeleteNode,
    CreateRelationship,
    ReadRelationship,
    SetRelationshipProperties,
    SetRelationshipType,
    DeleteRelationship,
    AllNodes,
    AllRelationships,
    MovieSearch,
    Probe,
}

/// Shape of a returned column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Node,
    Relationship,
    Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn column(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

/// A parameterized Cypher statement ready to run on a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub text: String,
    pub params: Vec<(&'static str, PropertyValue)>,
    pub columns: Vec<Column>,
    /// The validated tokens written into `text`, in order.
    pub identifiers: Vec<Identifier>,
}

impl Statement {
    fn new(kind: StatementKind, text: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            kind,
            text: text.into(),
            params: Vec::new(),
            columns,
            identifiers: Vec::new(),
        }
    }

    fn identifiers<'a>(mut self, idents: impl IntoIterator<Item = &'a Identifier>) -> Self {
        self.identifiers.extend(idents.into_iter().cloned());
        self
    }

    fn param(mut self, name: &'static str, value: impl Into<PropertyValue>) -> Self {
        self.params.push((name, value.into()));
        self
    }

    /// Look up a bound parameter by name.
    pub fn get_param(&self, name: &str) -> Option<&PropertyValue> {
        self.params
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }
}

/// Builds the statements behind each CRUD operation.
pub struct QueryBuilder;

impl QueryBuilder {
    // ── Nodes ────────────────────────────────────────────────────

    pub fn create_node(labels: &LabelSet, properties: Properties) -> Statement {
        let text = format!(
            "CREATE (n{labels})
             SET n = $properties
             RETURN n",
            labels = labels.clause()
        );
        Statement::new(
            StatementKind::CreateNode,
            text,
            vec![column("n", ColumnKind::Node)],
        )
        .identifiers(labels.iter())
        .param("properties", properties)
    }

    pub fn read_node(identity: Identity) -> Statement {
        Statement::new(
            StatementKind::ReadNode,
            "MATCH (n) WHERE id(n) = $identity RETURN n",
            vec![column("n", ColumnKind::Node)],
        )
        .param("identity", identity)
    }

    /// Replace labels and the whole property map of a node.
    ///
    /// Labels go through `apoc.create.setLabels` as a bound list, so they are
    /// validated but never interpolated here.
    pub fn update_node(identity: Identity, labels: &LabelSet, properties: Properties) -> Statement {
        Statement::new(
            StatementKind::UpdateNode,
            "MATCH (n) WHERE id(n) = $identity
             CALL apoc.create.setLabels(n, $labels) YIELD node
             SET node = $properties
             RETURN node AS n",
            vec![column("n", ColumnKind::Node)],
        )
        .param("identity", identity)
        .param("labels", labels.to_param())
        .param("properties", properties)
    }

    pub fn delete_node(identity: Identity) -> Statement {
        Statement::new(
            StatementKind::DeleteNode,
            "MATCH (n) WHERE id(n) = $identity DELETE n",
            Vec::new(),
        )
        .param("identity", identity)
    }

    // ── Relationships ────────────────────────────────────────────

    pub fn create_relationship(
        rel_type: &Identifier,
        start: Identity,
        end: Identity,
        properties: Properties,
    ) -> Statement {
        let text = format!(
            "MATCH (s), (o) WHERE id(s) = $start AND id(o) = $end
             CREATE (s)-[r{rel_type}]->(o)
             SET r = $properties
             RETURN r",
            rel_type = rel_type.type_clause()
        );
        Statement::new(
            StatementKind::CreateRelationship,
            text,
            vec![column("r", ColumnKind::Relationship)],
        )
        .identifiers([rel_type])
        .param("start", start)
        .param("end", end)
        .param("properties", properties)
    }

    pub fn read_relationship(identity: Identity) -> Statement {
        Statement::new(
            StatementKind::ReadRelationship,
            "MATCH ()-[r]->() WHERE id(r) = $identity RETURN r",
            vec![column("r", ColumnKind::Relationship)],
        )
        .param("identity", identity)
    }

    /// First step of a relationship update: overwrite the property map.
    pub fn set_relationship_properties(identity: Identity, properties: Properties) -> Statement {
        Statement::new(
            StatementKind::SetRelationshipProperties,
            "MATCH ()-[r]->() WHERE id(r) = $identity
             SET r = $properties
             RETURN r",
            vec![column("r", ColumnKind::Relationship)],
        )
        .param("identity", identity)
        .param("properties", properties)
    }

    /// Second step of a relationship update: change its type.
    ///
    /// `apoc.refactor.setType` reports failure in its `error` column rather
    /// than failing the statement. It recreates the relationship, so `output`
    /// carries a new identity.
    pub fn set_relationship_type(identity: Identity, rel_type: &Identifier) -> Statement {
        Statement::new(
            StatementKind::SetRelationshipType,
            "MATCH ()-[r]->() WHERE id(r) = $identity
             CALL apoc.refactor.setType(r, $type) YIELD output, error
             RETURN output, error AS type_error",
            vec![
                column("output", ColumnKind::Relationship),
                column("type_error", ColumnKind::Scalar),
            ],
        )
        .param("identity", identity)
        .param("type", rel_type.as_str())
    }

    pub fn delete_relationship(identity: Identity) -> Statement {
        Statement::new(
            StatementKind::DeleteRelationship,
            "MATCH ()-[r]->() WHERE id(r) = $identity DELETE r",
            Vec::new(),
        )
        .param("identity", identity)
    }

    // ── Listings ─────────────────────────────────────────────────

    pub fn all_nodes() -> Statement {
        Statement::new(
            StatementKind::AllNodes,
            "MATCH (n) RETURN n ORDER BY id(n)",
            vec![column("n", ColumnKind::Node)],
        )
    }

    /// Directed match, so each relationship comes back once.
    pub fn all_relationships() -> Statement {
        Statement::new(
            StatementKind::AllRelationships,
            "MATCH ()-[r]->() RETURN r ORDER BY id(r)",
            vec![column("r", ColumnKind::Relationship)],
        )
    }

    // ── Predefined Queries ───────────────────────────────────────

    /// Case-insensitive title search over `:Movie` nodes.
    pub fn movie_search(keyword: &str) -> Statement {
        Statement::new(
            StatementKind::MovieSearch,
            "MATCH (movie:Movie)
             WHERE movie.title =~ $title
             RETURN movie",
            vec![column("movie", ColumnKind::Node)],
        )
        .param("title", contains_pattern(keyword))
    }

    /// Connectivity check that also requires APOC.
    pub fn probe() -> Statement {
        Statement::new(
            StatementKind::Probe,
            "RETURN apoc.version() AS version",
            vec![column("version", ColumnKind::Scalar)],
        )
    }
}

/// Java regex matching any string that contains `keyword`, ignoring case.
///
/// The keyword sits inside `\Q...\E` so its metacharacters match literally.
pub fn contains_pattern(keyword: &str) -> String {
    if keyword.is_empty() {
        return "(?i).*".to_string();
    }
    format!(
        "(?i).*\\Q{}\\E.*",
        keyword.replace("\\E", "\\E\\\\E\\Q")
    )
}
