//! CRUD behavior against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use neocrud_core::{CrudError, ErrorClass, Properties, PropertyValue};
use neocrud_store::{CrudService, MemoryStore, StatementKind};

fn service() -> (MemoryStore, CrudService) {
    let store = MemoryStore::new(4);
    let service = CrudService::new(Arc::new(store.clone()));
    (store, service)
}

fn no_labels() -> &'static [&'static str] {
    &[]
}

// ── Identifier Safety ────────────────────────────────────────────

#[tokio::test]
async fn test_unsafe_identifiers_issue_no_statement() {
    let (store, service) = service();
    let bad = ["Person)", "a b", "", "x;DROP", "Über", "a-b", "`n`"];

    for token in bad {
        let err = service
            .create_node(&[token], Properties::new())
            .await
            .unwrap_err();
        assert!(
            matches!(err, CrudError::InvalidIdentifier { .. }),
            "{token:?}"
        );
        assert_eq!(err.class(), ErrorClass::Client);
    }

    for token in bad.into_iter().filter(|t| !t.is_empty()) {
        let err = service
            .create_relationship(token, 0, 1, Properties::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CrudError::InvalidIdentifier { .. }));

        let err = service
            .update_relationship(0, Some(token), None, None, Properties::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CrudError::InvalidIdentifier { .. }));

        let err = service
            .update_node(0, &["Ok", token], Properties::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CrudError::InvalidIdentifier { .. }));
    }

    let err = service
        .create_relationship("", 0, 1, Properties::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::InvalidIdentifier { .. }));

    assert_eq!(store.statements_run(), 0);
    assert_eq!(store.commits() + store.rollbacks(), 0);
}

#[tokio::test]
async fn test_negative_identity_is_bad_request() {
    let (store, service) = service();
    let err = service.read_node(-3).await.unwrap_err();
    assert!(matches!(err, CrudError::InvalidArgument(_)));
    assert_eq!(store.statements_run(), 0);
}

// ── Nodes ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_then_read_node() {
    let (store, service) = service();
    let created = service
        .create_node(&["Person"], Properties::new().with("name", "Ada"))
        .await
        .unwrap();

    let read = service.read_node(created.identity).await.unwrap().unwrap();
    assert_eq!(read.labels, vec!["Person"]);
    assert_eq!(read.properties, Properties::new().with("name", "Ada"));
    assert_eq!(read, created);
    assert_eq!(store.active_sessions(), 0);
}

#[tokio::test]
async fn test_create_node_with_nothing() {
    let (_, service) = service();
    let node = service
        .create_node(no_labels(), Properties::new())
        .await
        .unwrap();
    assert!(node.labels.is_empty());
    assert!(node.properties.is_empty());
}

#[tokio::test]
async fn test_delete_then_read_is_absent() {
    let (_, service) = service();
    let node = service
        .create_node(&["Person"], Properties::new())
        .await
        .unwrap();

    service.delete_node(node.identity).await.unwrap();
    assert!(service.read_node(node.identity).await.unwrap().is_none());

    // Idempotent.
    service.delete_node(node.identity).await.unwrap();
}

#[tokio::test]
async fn test_update_node_overwrites() {
    let (_, service) = service();
    let node = service
        .create_node(
            &["Person"],
            Properties::new().with("name", "Ada").with("born", 1815),
        )
        .await
        .unwrap();

    let updated = service
        .update_node(
            node.identity,
            &["Mathematician", "Writer"],
            Properties::new().with("name", "Ada Lovelace"),
        )
        .await
        .unwrap();

    assert_eq!(updated.identity, node.identity);
    assert_eq!(updated.labels, vec!["Mathematician", "Writer"]);
    assert_eq!(updated.properties, Properties::new().with("name", "Ada Lovelace"));
}

#[tokio::test]
async fn test_update_missing_node_is_not_found() {
    let (store, service) = service();
    let err = service
        .update_node(42, &["Person"], Properties::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::NotFound { identity: 42, .. }));
    assert_eq!(store.active_sessions(), 0);
}

#[tokio::test]
async fn test_delete_connected_node_is_store_error() {
    let (store, service) = service();
    let a = service.create_node(&["A"], Properties::new()).await.unwrap();
    let b = service.create_node(&["B"], Properties::new()).await.unwrap();
    service
        .create_relationship("LINKS", a.identity, b.identity, Properties::new())
        .await
        .unwrap();

    let err = service.delete_node(a.identity).await.unwrap_err();
    assert!(matches!(err, CrudError::Store { .. }));
    assert_eq!(err.class(), ErrorClass::Fatal);
    assert!(service.read_node(a.identity).await.unwrap().is_some());
    assert_eq!(store.active_sessions(), 0);
}

#[tokio::test]
async fn test_concurrent_creates_get_distinct_identities() {
    let (store, service) = service();

    let first = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create_node(&["Person"], Properties::new().with("name", "Ada"))
                .await
        })
    };
    let second = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create_node(&["Movie"], Properties::new().with("title", "Up"))
                .await
        })
    };

    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();
    assert_ne!(a.identity, b.identity);
    assert_eq!(service.get_all_nodes().await.unwrap().len(), 2);
    assert_eq!(store.active_sessions(), 0);
}

// ── Relationships ────────────────────────────────────────────────

async fn pair(service: &CrudService) -> (i64, i64) {
    let a = service
        .create_node(&["Person"], Properties::new())
        .await
        .unwrap();
    let b = service
        .create_node(&["Person"], Properties::new())
        .await
        .unwrap();
    (a.identity, b.identity)
}

#[tokio::test]
async fn test_create_relationship_to_missing_node() {
    let (_, service) = service();
    let (a, _) = pair(&service).await;

    let err = service
        .create_relationship("KNOWS", a, 99, Properties::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::MissingEndpoints { start, end: 99 } if start == a));
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[tokio::test]
async fn test_update_relationship_without_type_change() {
    let (_, service) = service();
    let (a, b) = pair(&service).await;
    let rel = service
        .create_relationship("KNOWS", a, b, Properties::new().with("weight", 1))
        .await
        .unwrap();

    let updated = service
        .update_relationship(
            rel.identity,
            Some(""),
            Some(a),
            Some(b),
            Properties::new().with("weight", 5),
        )
        .await
        .unwrap();

    assert_eq!(updated.identity, rel.identity);
    assert_eq!(updated.rel_type, "KNOWS");
    assert_eq!(updated.properties, Properties::new().with("weight", 5));
}

#[tokio::test]
async fn test_update_relationship_changes_type() {
    let (_, service) = service();
    let (a, b) = pair(&service).await;
    let rel = service
        .create_relationship("KNOWS", a, b, Properties::new())
        .await
        .unwrap();

    let updated = service
        .update_relationship(
            rel.identity,
            Some("LIKES"),
            None,
            None,
            Properties::new().with("weight", 5),
        )
        .await
        .unwrap();

    assert_eq!(updated.rel_type, "LIKES");
    assert_eq!((updated.start, updated.end), (a, b));
    assert_eq!(updated.properties, Properties::new().with("weight", 5));

    let all = service.get_all_nodes_and_relationships().await.unwrap();
    assert_eq!(all.relationships, vec![updated]);
}

#[tokio::test]
async fn test_failed_type_change_keeps_new_properties() {
    let (store, service) = service();
    let (a, b) = pair(&service).await;
    let rel = service
        .create_relationship("LIKES", a, b, Properties::new())
        .await
        .unwrap();
    store.refuse_relationship_type("KNOWS", "relationship type is locked");

    let err = service
        .update_relationship(
            rel.identity,
            Some("KNOWS"),
            Some(a),
            Some(b),
            Properties::new().with("weight", 5),
        )
        .await
        .unwrap_err();

    match &err {
        CrudError::TypeChangeFailure {
            identity,
            requested,
            detail,
        } => {
            assert_eq!(*identity, rel.identity);
            assert_eq!(requested, "KNOWS");
            assert_eq!(detail, "relationship type is locked");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.class(), ErrorClass::Partial);

    let read = service
        .read_relationship(rel.identity)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.rel_type, "LIKES");
    assert_eq!(read.properties, Properties::new().with("weight", 5));
    assert_eq!(store.active_sessions(), 0);
}

#[tokio::test]
async fn test_store_failure_on_type_change_rolls_back_properties() {
    let (store, service) = service();
    let (a, b) = pair(&service).await;
    let rel = service
        .create_relationship("LIKES", a, b, Properties::new().with("weight", 1))
        .await
        .unwrap();

    store.fail_next_of_kind(StatementKind::SetRelationshipType, "disk full");

    let err = service
        .update_relationship(
            rel.identity,
            Some("KNOWS"),
            None,
            None,
            Properties::new().with("weight", 5),
        )
        .await
        .unwrap_err();
    match &err {
        CrudError::TypeChangeAborted {
            identity, requested, ..
        } => {
            assert_eq!(*identity, rel.identity);
            assert_eq!(requested, "KNOWS");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("rolled back"));
    assert_eq!(err.class(), ErrorClass::Fatal);
    assert_eq!(store.rollbacks(), 1);

    let read = service
        .read_relationship(rel.identity)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.properties.get("weight"), Some(&PropertyValue::Int(1)));
    assert_eq!(read.rel_type, "LIKES");
}

#[tokio::test]
async fn test_update_missing_relationship_is_not_found() {
    let (_, service) = service();
    let err = service
        .update_relationship(7, Some("KNOWS"), None, None, Properties::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::NotFound { identity: 7, .. }));
}

#[tokio::test]
async fn test_delete_relationship_is_idempotent() {
    let (_, service) = service();
    let (a, b) = pair(&service).await;
    let rel = service
        .create_relationship("KNOWS", a, b, Properties::new())
        .await
        .unwrap();

    service.delete_relationship(rel.identity).await.unwrap();
    assert!(service
        .read_relationship(rel.identity)
        .await
        .unwrap()
        .is_none());
    service.delete_relationship(rel.identity).await.unwrap();

    // Endpoints can be deleted once the relationship is gone.
    service.delete_node(a).await.unwrap();
}

// ── Listings and Queries ─────────────────────────────────────────

#[tokio::test]
async fn test_empty_listing_is_never_null() {
    let (store, service) = service();
    let all = service.get_all_nodes_and_relationships().await.unwrap();
    assert!(all.nodes.is_empty());
    assert!(all.relationships.is_empty());
    assert_eq!(store.commits(), 1);
}

#[tokio::test]
async fn test_listing_returns_each_relationship_once() {
    let (_, service) = service();
    let (a, b) = pair(&service).await;
    service
        .create_relationship("KNOWS", a, b, Properties::new())
        .await
        .unwrap();
    service
        .create_relationship("KNOWS", b, a, Properties::new())
        .await
        .unwrap();

    let all = service.get_all_nodes_and_relationships().await.unwrap();
    assert_eq!(all.nodes.len(), 2);
    assert_eq!(all.relationships.len(), 2);
}

#[tokio::test]
async fn test_movie_search_is_literal_and_case_insensitive() {
    let (_, service) = service();
    for (title, released) in [("The Matrix", 1999), ("The Matrix Reloaded", 2003), ("A.I.", 2001)] {
        service
            .create_node(
                &["Movie"],
                Properties::new()
                    .with("title", title)
                    .with("released", released),
            )
            .await
            .unwrap();
    }
    service
        .create_node(&["Person"], Properties::new().with("title", "Matrix fan"))
        .await
        .unwrap();

    let found = service.movies_query("matrix").await.unwrap();
    let titles: Vec<&str> = found.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["The Matrix", "The Matrix Reloaded"]);
    assert_eq!(found[0].released, Some(1999));

    // "." is not a wildcard.
    let found = service.movies_query("A.I").await.unwrap();
    assert_eq!(found.len(), 1);
    assert!(service.movies_query("A*I").await.unwrap().is_empty());

    assert_eq!(service.movies_query("").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_verify_connectivity() {
    let (_, service) = service();
    assert_eq!(service.verify_connectivity().await.unwrap(), "memory");
}

// ── Session Lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn test_sessions_released_on_every_path() {
    let (store, service) = service();
    let node = service
        .create_node(&["Person"], Properties::new())
        .await
        .unwrap();
    let _ = service.read_node(node.identity).await;
    let _ = service.read_node(1000).await;
    let _ = service.update_node(1000, &["X"], Properties::new()).await;

    store.fail_next_statement("connection reset");
    let err = service.get_all_nodes().await.unwrap_err();
    assert!(matches!(err, CrudError::Store { .. }));

    store.set_statement_delay(Some(Duration::from_millis(200)));
    let err = service
        .with_timeout(Duration::from_millis(10))
        .get_all_nodes()
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::Timeout { .. }));

    assert_eq!(store.active_sessions(), 0);
}

#[tokio::test]
async fn test_timed_out_create_leaves_no_node() {
    let (store, service) = service();
    store.set_statement_delay(Some(Duration::from_millis(100)));

    let err = service
        .with_timeout(Duration::from_millis(10))
        .create_node(&["Person"], Properties::new())
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    store.set_statement_delay(None);
    assert!(service.get_all_nodes().await.unwrap().is_empty());
}
