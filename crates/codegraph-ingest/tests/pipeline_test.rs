use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use codegraph_core::{
    EdgeRelationship, ExtractionResult, FileFingerprint, GraphEntity, GraphStoreAdapter, Language,
    ParserBridge, QueryRow, RepoId,
};
use codegraph_ingest::{ingest, IngestConfig};
use codegraph_scan::ScanConfig;

/// Minimal in-memory stand-in for a tenant graph client, just enough surface
/// for the pipeline to exercise its diff/batch-load/delete calls end to end
/// without a real SurrealDB instance.
#[derive(Default)]
struct FakeGraph {
    files: Mutex<HashMap<String, FileFingerprint>>,
    node_writes: Mutex<usize>,
    rel_writes: Mutex<usize>,
}

#[async_trait]
impl GraphStoreAdapter for FakeGraph {
    async fn execute_query(
        &self,
        _query: &str,
        _params: QueryRow,
        _timeout: Option<Duration>,
    ) -> anyhow::Result<Vec<QueryRow>> {
        Ok(vec![])
    }

    async fn batch_create_nodes(&self, entities: Vec<GraphEntity>) -> anyhow::Result<usize> {
        let mut files = self.files.lock().unwrap();
        for entity in &entities {
            if let GraphEntity::File(f) = entity {
                files.insert(
                    f.path.clone(),
                    FileFingerprint {
                        content_hash: f.content_hash.clone(),
                        last_modified: f.last_modified,
                    },
                );
            }
        }
        *self.node_writes.lock().unwrap() += entities.len();
        Ok(entities.len())
    }

    async fn batch_create_relationships(
        &self,
        rels: Vec<EdgeRelationship>,
        _repo_id: &RepoId,
    ) -> anyhow::Result<usize> {
        *self.rel_writes.lock().unwrap() += rels.len();
        Ok(rels.len())
    }

    async fn delete_file_entities(&self, _repo_id: &RepoId, path: &str) -> anyhow::Result<usize> {
        self.files.lock().unwrap().remove(path);
        Ok(1)
    }

    async fn delete_repository(&self, _repo_id: &RepoId) -> anyhow::Result<usize> {
        let mut files = self.files.lock().unwrap();
        let n = files.len();
        files.clear();
        Ok(n)
    }

    async fn get_all_file_paths(&self, _repo_id: &RepoId) -> anyhow::Result<Vec<String>> {
        Ok(self.files.lock().unwrap().keys().cloned().collect())
    }

    async fn get_file_metadata(
        &self,
        _repo_id: &RepoId,
        path: &str,
    ) -> anyhow::Result<Option<FileFingerprint>> {
        Ok(self.files.lock().unwrap().get(path).cloned())
    }

    async fn create_indexes(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn supports_temporal_types(&self) -> bool {
        true
    }
    fn supports_constraints(&self) -> bool {
        true
    }
    fn supports_full_text_index(&self) -> bool {
        false
    }
}

struct NoopParser;

#[async_trait]
impl ParserBridge for NoopParser {
    async fn parse(&self, _path: &str, _bytes: &[u8]) -> anyhow::Result<ExtractionResult> {
        Ok(ExtractionResult::default())
    }

    fn supported_languages(&self) -> Vec<Language> {
        vec![Language::Python]
    }
}

#[tokio::test]
async fn full_run_classifies_all_files_as_new_and_writes_file_nodes() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("a.py"), "x = 1\n").unwrap();
    std::fs::write(tmp.path().join("b.py"), "y = 2\n").unwrap();

    let graph = FakeGraph::default();
    let parser = NoopParser;
    let config = IngestConfig::new("repo-1");

    let summary = ingest(tmp.path(), &ScanConfig::default(), &config, &graph, &parser, None)
        .await
        .unwrap();

    assert_eq!(summary.files_new, 2);
    assert_eq!(summary.files_changed, 0);
    assert_eq!(summary.files_unchanged, 0);
    assert_eq!(summary.files_failed, 0);
    assert_eq!(*graph.node_writes.lock().unwrap(), 2);
}

#[tokio::test]
async fn second_incremental_run_sees_all_files_unchanged() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("a.py"), "x = 1\n").unwrap();

    let graph = FakeGraph::default();
    let parser = NoopParser;
    let config = IngestConfig::new("repo-1");

    ingest(tmp.path(), &ScanConfig::default(), &config, &graph, &parser, None)
        .await
        .unwrap();
    let second = ingest(tmp.path(), &ScanConfig::default(), &config, &graph, &parser, None)
        .await
        .unwrap();

    assert_eq!(second.files_new, 0);
    assert_eq!(second.files_unchanged, 1);
}

#[tokio::test]
async fn deleted_file_is_removed_from_graph_on_next_incremental_run() {
    let tmp = tempfile::tempdir().unwrap();
    let path_a = tmp.path().join("a.py");
    std::fs::write(&path_a, "x = 1\n").unwrap();

    let graph = FakeGraph::default();
    let parser = NoopParser;
    let config = IngestConfig::new("repo-1");

    ingest(tmp.path(), &ScanConfig::default(), &config, &graph, &parser, None)
        .await
        .unwrap();
    std::fs::remove_file(&path_a).unwrap();

    let second = ingest(tmp.path(), &ScanConfig::default(), &config, &graph, &parser, None)
        .await
        .unwrap();

    assert_eq!(second.files_deleted, 1);
    assert!(graph.files.lock().unwrap().is_empty());
}
