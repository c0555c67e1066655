use std::collections::HashMap;
use std::sync::Arc;

use codegraph_core::{
    EdgeRelationship, EdgeType, FileEntity, FunctionEntity, GraphEntity, GraphStoreAdapter,
    Language,
};
use codegraph_graph::SurrealGraphStore;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;

fn function(qualified_name: &str, repo_id: &str) -> FunctionEntity {
    FunctionEntity {
        qualified_name: qualified_name.into(),
        simple_name: qualified_name.rsplit('.').next().unwrap_or(qualified_name).into(),
        repo_id: repo_id.into(),
        repo_slug: None,
        file_path: "a.py".into(),
        line_start: 1,
        line_end: 2,
        complexity: 1,
        parameters: vec![],
        return_type: None,
        is_method: false,
        is_static: false,
        is_async: false,
        has_yield: false,
        decorators: vec![],
    }
}

async fn edge_count(store: &SurrealGraphStore, repo_id: &str, edge_type: &str) -> usize {
    let rows = store
        .execute_query(
            "SELECT * FROM edges WHERE repo_id = $repo_id AND edge_type = $edge_type",
            HashMap::from([
                ("repo_id".to_string(), serde_json::Value::String(repo_id.to_string())),
                ("edge_type".to_string(), serde_json::Value::String(edge_type.to_string())),
            ]),
            None,
        )
        .await
        .expect("execute_query");
    rows.len()
}

async fn mem_store() -> SurrealGraphStore {
    let db = Surreal::new::<Any>("mem://").await.expect("connect mem engine");
    db.use_ns("test").use_db("test").await.expect("select ns/db");
    SurrealGraphStore::new(Arc::new(db))
}

#[tokio::test]
async fn create_indexes_and_round_trip_a_file_node() {
    let store = mem_store().await;
    store.create_indexes().await.expect("create_indexes");

    let file = FileEntity {
        path: "src/lib.rs".into(),
        repo_id: "r1".into(),
        repo_slug: Some("acme".into()),
        language: Language::Rust,
        line_count: 10,
        content_hash: "abc123".into(),
        last_modified: chrono::Utc::now(),
        is_test: false,
    };

    let written = store
        .batch_create_nodes(vec![GraphEntity::File(file)])
        .await
        .expect("batch_create_nodes");
    assert_eq!(written, 1);

    let paths = store
        .get_all_file_paths(&"r1".to_string())
        .await
        .expect("get_all_file_paths");
    assert_eq!(paths, vec!["src/lib.rs".to_string()]);

    let meta = store
        .get_file_metadata(&"r1".to_string(), "src/lib.rs")
        .await
        .expect("get_file_metadata")
        .expect("metadata present");
    assert_eq!(meta.content_hash, "abc123");
}

#[tokio::test]
async fn batch_create_nodes_is_idempotent() {
    let store = mem_store().await;
    store.create_indexes().await.expect("create_indexes");

    let file = || {
        GraphEntity::File(FileEntity {
            path: "a.rs".into(),
            repo_id: "r1".into(),
            repo_slug: None,
            language: Language::Rust,
            line_count: 1,
            content_hash: "h1".into(),
            last_modified: chrono::Utc::now(),
            is_test: false,
        })
    };

    store.batch_create_nodes(vec![file()]).await.unwrap();
    store.batch_create_nodes(vec![file()]).await.unwrap();

    let paths = store.get_all_file_paths(&"r1".to_string()).await.unwrap();
    assert_eq!(paths.len(), 1, "re-applying the same entity must not duplicate it");
}

#[tokio::test]
async fn delete_repository_removes_all_its_files() {
    let store = mem_store().await;
    store.create_indexes().await.expect("create_indexes");

    store
        .batch_create_nodes(vec![GraphEntity::File(FileEntity {
            path: "a.rs".into(),
            repo_id: "r1".into(),
            repo_slug: None,
            language: Language::Rust,
            line_count: 1,
            content_hash: "h".into(),
            last_modified: chrono::Utc::now(),
            is_test: false,
        })])
        .await
        .unwrap();

    let removed = store.delete_repository(&"r1".to_string()).await.unwrap();
    assert!(removed >= 1);
    let remaining = store.get_all_file_paths(&"r1".to_string()).await.unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn batch_create_relationships_persists_an_internal_edge() {
    let store = mem_store().await;
    store.create_indexes().await.expect("create_indexes");

    store
        .batch_create_nodes(vec![
            GraphEntity::Function(function("pkg.caller", "r1")),
            GraphEntity::Function(function("pkg.callee", "r1")),
        ])
        .await
        .unwrap();

    let written = store
        .batch_create_relationships(
            vec![EdgeRelationship {
                from: "pkg.caller".into(),
                to: "pkg.callee".into(),
                edge_type: EdgeType::Calls,
                metadata: HashMap::new(),
            }],
            &"r1".to_string(),
        )
        .await
        .expect("batch_create_relationships");
    assert_eq!(written, 1);
    assert_eq!(edge_count(&store, "r1", "CALLS").await, 1, "edge must actually be persisted");

    // Re-applying the same relationship must not duplicate it.
    store
        .batch_create_relationships(
            vec![EdgeRelationship {
                from: "pkg.caller".into(),
                to: "pkg.callee".into(),
                edge_type: EdgeType::Calls,
                metadata: HashMap::new(),
            }],
            &"r1".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(edge_count(&store, "r1", "CALLS").await, 1);
}

#[tokio::test]
async fn batch_create_relationships_materializes_external_call_targets() {
    let store = mem_store().await;
    store.create_indexes().await.expect("create_indexes");

    store
        .batch_create_nodes(vec![GraphEntity::Function(function("pkg.caller", "r1"))])
        .await
        .unwrap();

    let written = store
        .batch_create_relationships(
            vec![
                EdgeRelationship {
                    from: "pkg.caller".into(),
                    to: "len".into(),
                    edge_type: EdgeType::Calls,
                    metadata: HashMap::new(),
                },
                EdgeRelationship {
                    from: "pkg.caller".into(),
                    to: "os.path.join".into(),
                    edge_type: EdgeType::Calls,
                    metadata: HashMap::new(),
                },
            ],
            &"r1".to_string(),
        )
        .await
        .expect("batch_create_relationships");
    assert_eq!(written, 2, "external targets must be materialized, not dropped");
    assert_eq!(edge_count(&store, "r1", "CALLS").await, 2);

    let builtins = store
        .execute_query(
            "SELECT * FROM builtin_function WHERE repo_id = $repo_id",
            HashMap::from([("repo_id".to_string(), serde_json::Value::String("r1".to_string()))]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(builtins.len(), 1, "bare names become builtin_function nodes");

    let externals = store
        .execute_query(
            "SELECT * FROM external_function WHERE repo_id = $repo_id",
            HashMap::from([("repo_id".to_string(), serde_json::Value::String("r1".to_string()))]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(externals.len(), 1, "dotted names become external_function nodes");
}

#[tokio::test]
async fn batch_create_relationships_skips_a_missing_internal_target() {
    let store = mem_store().await;
    store.create_indexes().await.expect("create_indexes");

    store
        .batch_create_nodes(vec![GraphEntity::Function(function("pkg.caller", "r1"))])
        .await
        .unwrap();

    // CONTAINS never targets an external symbol, so an unresolved target is
    // treated as a parser bug and skipped rather than materialized.
    let written = store
        .batch_create_relationships(
            vec![EdgeRelationship {
                from: "pkg.caller".into(),
                to: "pkg.never_parsed".into(),
                edge_type: EdgeType::Contains,
                metadata: HashMap::new(),
            }],
            &"r1".to_string(),
        )
        .await
        .expect("batch_create_relationships");
    assert_eq!(written, 0);
    assert_eq!(edge_count(&store, "r1", "CONTAINS").await, 0);
}
