use crate::flag::{DuplicateFinding, EntityFlag, FlaggedEntity, Hotspot};
use codegraph_core::{
    EdgeRelationship, EdgeType, GraphEntity, GraphStoreAdapter, QueryRow, RepoId, Severity,
};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Writes detector findings as `DetectorMetadata` nodes attached via
/// FLAGGED_BY edges, and reads them back for cross-detector collaboration
/// (spec §4.7, C7). Every method here follows the same failure contract: an
/// underlying graph-store error is logged and swallowed, never propagated —
/// collaboration is advisory, not a precondition for a detector run finishing.
#[derive(Clone)]
pub struct GraphEnricher {
    graph: Arc<dyn GraphStoreAdapter>,
    repo_id: RepoId,
}

impl GraphEnricher {
    pub fn new(graph: Arc<dyn GraphStoreAdapter>, repo_id: RepoId) -> Self {
        Self { graph, repo_id }
    }

    /// Creates or updates a DetectorMetadata node and links it from
    /// `entity_qualified_name` via FLAGGED_BY. Always returns the metadata
    /// id, even if the entity doesn't resolve in the graph or the write
    /// fails outright — per Open Question decision #2, a flag is
    /// record-and-log, never fatal to the caller.
    pub async fn flag_entity(
        &self,
        entity_qualified_name: &str,
        detector: &str,
        severity: Severity,
        issues: Vec<String>,
        confidence: f32,
        metadata: Option<JsonValue>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let node = codegraph_core::DetectorMetadata {
            id,
            repo_id: self.repo_id.clone(),
            entity_qualified_name: entity_qualified_name.to_string(),
            detector: detector.to_string(),
            severity,
            issues,
            confidence,
            timestamp: chrono::Utc::now(),
            metadata_json: metadata.map(|m| m.to_string()),
        };
        let entity = GraphEntity::DetectorMetadata(node);
        let composite_key = entity.unique_key();

        if let Err(e) = self.graph.batch_create_nodes(vec![entity]).await {
            warn!(
                detector,
                entity = entity_qualified_name,
                error = %e,
                "flagEntity: failed to write DetectorMetadata node"
            );
            return id;
        }

        let rel = EdgeRelationship {
            from: entity_qualified_name.to_string(),
            to: composite_key,
            edge_type: EdgeType::FlaggedBy,
            metadata: HashMap::new(),
        };
        if let Err(e) = self
            .graph
            .batch_create_relationships(vec![rel], &self.repo_id)
            .await
        {
            warn!(
                detector,
                entity = entity_qualified_name,
                error = %e,
                "flagEntity: failed to write FLAGGED_BY edge"
            );
        }
        id
    }

    pub async fn get_flagged_entities(
        &self,
        detector: Option<&str>,
        severity: Option<Severity>,
        min_confidence: Option<f32>,
    ) -> Vec<FlaggedEntity> {
        let mut query = String::from(
            "SELECT entity_qualified_name, detector, severity, issues, confidence, \
             timestamp, metadata_json FROM detector_metadata WHERE repo_id = $repo_id",
        );
        let mut params = self.base_params();
        if let Some(d) = detector {
            query.push_str(" AND detector = $detector");
            params.insert("detector".into(), json!(d));
        }
        if let Some(s) = severity {
            query.push_str(" AND severity = $severity");
            params.insert("severity".into(), json!(s.to_string()));
        }
        if let Some(c) = min_confidence {
            query.push_str(" AND confidence >= $min_confidence");
            params.insert("min_confidence".into(), json!(c));
        }
        query.push_str(" ORDER BY timestamp DESC");

        match self.graph.execute_query(&query, params, None).await {
            Ok(rows) => rows.iter().filter_map(row_to_flagged_entity).collect(),
            Err(e) => {
                warn!(error = %e, "getFlaggedEntities failed");
                Vec::new()
            }
        }
    }

    pub async fn get_entity_flags(&self, entity_qualified_name: &str) -> Vec<EntityFlag> {
        let mut params = self.base_params();
        params.insert("entity_qn".into(), json!(entity_qualified_name));
        let query = "SELECT detector, severity, issues, confidence, timestamp, metadata_json \
             FROM detector_metadata WHERE repo_id = $repo_id AND entity_qualified_name = $entity_qn \
             ORDER BY detector";

        match self.graph.execute_query(query, params, None).await {
            Ok(rows) => rows.iter().filter_map(row_to_flag).collect(),
            Err(e) => {
                warn!(error = %e, entity = entity_qualified_name, "getEntityFlags failed");
                Vec::new()
            }
        }
    }

    pub async fn is_entity_flagged(
        &self,
        entity_qualified_name: &str,
        detector: Option<&str>,
    ) -> bool {
        let mut query = String::from(
            "SELECT count() AS flag_count FROM detector_metadata \
             WHERE repo_id = $repo_id AND entity_qualified_name = $entity_qn",
        );
        let mut params = self.base_params();
        params.insert("entity_qn".into(), json!(entity_qualified_name));
        if let Some(d) = detector {
            query.push_str(" AND detector = $detector");
            params.insert("detector".into(), json!(d));
        }
        query.push_str(" GROUP ALL");

        match self.graph.execute_query(&query, params, None).await {
            Ok(rows) => rows
                .first()
                .and_then(|r| r.get("flag_count"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0)
                > 0,
            Err(e) => {
                warn!(error = %e, entity = entity_qualified_name, "isEntityFlagged failed");
                false
            }
        }
    }

    /// Entities flagged by at least `min_detectors` distinct detectors,
    /// narrowed to a single entity (spec §4.7).
    pub async fn get_duplicate_findings(
        &self,
        entity_qualified_name: &str,
        min_detectors: usize,
    ) -> Vec<DuplicateFinding> {
        let flags = self.get_entity_flags(entity_qualified_name).await;
        let mut all_detectors: Vec<String> = flags.iter().map(|f| f.detector.clone()).collect();
        all_detectors.sort();
        all_detectors.dedup();
        if all_detectors.len() < min_detectors {
            return Vec::new();
        }
        flags
            .into_iter()
            .map(|f| DuplicateFinding {
                entity_qualified_name: entity_qualified_name.to_string(),
                detector: f.detector,
                severity: f.severity,
                confidence: f.confidence,
                all_detectors: all_detectors.clone(),
            })
            .collect()
    }

    /// Repo-wide ranking of entities flagged by several detectors, highest
    /// detector count first (spec §4.7). Aggregation happens in Rust over a
    /// single flat query, the same idiom the Query Cache uses (C6).
    pub async fn find_hotspots(
        &self,
        min_detectors: usize,
        min_confidence: Option<f32>,
        severity: Option<Severity>,
    ) -> Vec<Hotspot> {
        let query = "SELECT entity_qualified_name, detector, severity, issues, confidence, \
             timestamp, metadata_json FROM detector_metadata WHERE repo_id = $repo_id";
        let rows = match self
            .graph
            .execute_query(query, self.base_params(), None)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "findHotspots failed");
                return Vec::new();
            }
        };

        let mut grouped: HashMap<String, Vec<EntityFlag>> = HashMap::new();
        for row in &rows {
            let Some(entity_qn) = row
                .get("entity_qualified_name")
                .and_then(|v| v.as_str())
                .map(str::to_string)
            else {
                continue;
            };
            if let Some(flag) = row_to_flag(row) {
                grouped.entry(entity_qn).or_default().push(flag);
            }
        }

        let mut hotspots: Vec<Hotspot> = grouped
            .into_iter()
            .filter_map(|(entity_qualified_name, flags)| {
                let mut detectors: Vec<String> =
                    flags.iter().map(|f| f.detector.clone()).collect();
                detectors.sort();
                detectors.dedup();
                if detectors.len() < min_detectors {
                    return None;
                }
                let avg_confidence =
                    flags.iter().map(|f| f.confidence).sum::<f32>() / flags.len() as f32;
                if min_confidence.is_some_and(|min_c| avg_confidence < min_c) {
                    return None;
                }
                let top_severity = flags
                    .iter()
                    .map(|f| f.severity)
                    .max_by_key(|s| s.rank())
                    .unwrap_or(Severity::Info);
                if severity.is_some_and(|s| s != top_severity) {
                    return None;
                }
                let mut issues: Vec<String> =
                    flags.iter().flat_map(|f| f.issues.clone()).collect();
                issues.sort();
                issues.dedup();
                Some(Hotspot {
                    entity_qualified_name,
                    detector_count: detectors.len(),
                    detectors,
                    avg_confidence,
                    severity: top_severity,
                    issues,
                })
            })
            .collect();

        hotspots.sort_by(|a, b| {
            b.detector_count.cmp(&a.detector_count).then(
                b.avg_confidence
                    .partial_cmp(&a.avg_confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });
        hotspots
    }

    /// Bulk removal of DetectorMetadata nodes (and their FLAGGED_BY edges),
    /// called by the Detector Engine at the start of every run to guarantee
    /// a clean slate (spec §4.8). Returns the number of nodes deleted; edge
    /// cleanup is best-effort and doesn't affect the returned count.
    pub async fn cleanup_metadata(&self, detector: Option<&str>) -> usize {
        let mut query = String::from("DELETE detector_metadata WHERE repo_id = $repo_id");
        let mut params = self.base_params();
        if let Some(d) = detector {
            query.push_str(" AND detector = $detector");
            params.insert("detector".into(), json!(d));
        }
        query.push_str(" RETURN BEFORE");

        let deleted = match self.graph.execute_query(&query, params.clone(), None).await {
            Ok(rows) => rows.len(),
            Err(e) => {
                warn!(error = %e, "cleanupMetadata failed to delete DetectorMetadata nodes");
                return 0;
            }
        };

        let mut edge_query =
            String::from("DELETE edges WHERE repo_id = $repo_id AND edge_type = 'FLAGGED_BY'");
        if detector.is_some() {
            edge_query.push_str(" AND out.detector = $detector");
        }
        if let Err(e) = self.graph.execute_query(&edge_query, params, None).await {
            warn!(error = %e, "cleanupMetadata failed to delete FLAGGED_BY edges");
        }

        deleted
    }

    fn base_params(&self) -> QueryRow {
        let mut params: QueryRow = HashMap::new();
        params.insert("repo_id".into(), json!(self.repo_id));
        params
    }
}

fn row_to_flag(row: &QueryRow) -> Option<EntityFlag> {
    let detector = row.get("detector")?.as_str()?.to_string();
    let severity = row
        .get("severity")
        .and_then(|v| v.as_str())
        .and_then(|s| Severity::from_str(s).ok())?;
    let issues = row
        .get("issues")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let confidence = row.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
    let timestamp = row
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now);
    let metadata = row
        .get("metadata_json")
        .and_then(|v| v.as_str())
        .and_then(|s| serde_json::from_str(s).ok());
    Some(EntityFlag {
        detector,
        severity,
        issues,
        confidence,
        timestamp,
        metadata,
    })
}

fn row_to_flagged_entity(row: &QueryRow) -> Option<FlaggedEntity> {
    let entity_qualified_name = row.get("entity_qualified_name")?.as_str()?.to_string();
    let flag = row_to_flag(row)?;
    Some(FlaggedEntity {
        entity_qualified_name,
        flag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codegraph_core::{FileFingerprint, QueryRow as CoreQueryRow};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeGraph {
        nodes: Mutex<Vec<GraphEntity>>,
        rels: Mutex<Vec<EdgeRelationship>>,
        next_rows: Mutex<Vec<CoreQueryRow>>,
    }

    #[async_trait]
    impl GraphStoreAdapter for FakeGraph {
        async fn execute_query(
            &self,
            _query: &str,
            _params: CoreQueryRow,
            _timeout: Option<Duration>,
        ) -> anyhow::Result<Vec<CoreQueryRow>> {
            Ok(std::mem::take(&mut self.next_rows.lock().unwrap()))
        }

        async fn batch_create_nodes(&self, entities: Vec<GraphEntity>) -> anyhow::Result<usize> {
            let n = entities.len();
            self.nodes.lock().unwrap().extend(entities);
            Ok(n)
        }

        async fn batch_create_relationships(
            &self,
            rels: Vec<EdgeRelationship>,
            _repo_id: &RepoId,
        ) -> anyhow::Result<usize> {
            let n = rels.len();
            self.rels.lock().unwrap().extend(rels);
            Ok(n)
        }

        async fn delete_file_entities(&self, _repo_id: &RepoId, _path: &str) -> anyhow::Result<usize> {
            Ok(0)
        }

        async fn delete_repository(&self, _repo_id: &RepoId) -> anyhow::Result<usize> {
            Ok(0)
        }

        async fn get_all_file_paths(&self, _repo_id: &RepoId) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn get_file_metadata(
            &self,
            _repo_id: &RepoId,
            _path: &str,
        ) -> anyhow::Result<Option<FileFingerprint>> {
            Ok(None)
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

    #[tokio::test]
    async fn flag_entity_writes_a_node_and_a_flagged_by_edge() {
        let graph = Arc::new(FakeGraph::default());
        let enricher = GraphEnricher::new(graph.clone(), "acme/web".to_string());

        enricher
            .flag_entity(
                "mymodule.MyClass",
                "GodClassDetector",
                Severity::High,
                vec!["high_lcom".to_string()],
                0.9,
                None,
            )
            .await;

        assert_eq!(graph.nodes.lock().unwrap().len(), 1);
        let rels = graph.rels.lock().unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].from, "mymodule.MyClass");
        assert_eq!(rels[0].to, "mymodule.MyClass::GodClassDetector");
    }

    #[tokio::test]
    async fn flag_entity_always_returns_an_id_even_on_graph_failure() {
        struct FailingGraph;
        #[async_trait]
        impl GraphStoreAdapter for FailingGraph {
            async fn execute_query(
                &self,
                _query: &str,
                _params: CoreQueryRow,
                _timeout: Option<Duration>,
            ) -> anyhow::Result<Vec<CoreQueryRow>> {
                anyhow::bail!("db down")
            }
            async fn batch_create_nodes(&self, _entities: Vec<GraphEntity>) -> anyhow::Result<usize> {
                anyhow::bail!("db down")
            }
            async fn batch_create_relationships(
                &self,
                _rels: Vec<EdgeRelationship>,
                _repo_id: &RepoId,
            ) -> anyhow::Result<usize> {
                anyhow::bail!("db down")
            }
            async fn delete_file_entities(&self, _repo_id: &RepoId, _path: &str) -> anyhow::Result<usize> {
                Ok(0)
            }
            async fn delete_repository(&self, _repo_id: &RepoId) -> anyhow::Result<usize> {
                Ok(0)
            }
            async fn get_all_file_paths(&self, _repo_id: &RepoId) -> anyhow::Result<Vec<String>> {
                Ok(Vec::new())
            }
            async fn get_file_metadata(
                &self,
                _repo_id: &RepoId,
                _path: &str,
            ) -> anyhow::Result<Option<FileFingerprint>> {
                Ok(None)
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

        let enricher = GraphEnricher::new(Arc::new(FailingGraph), "acme/web".to_string());
        // Must not panic and must still hand back a usable id.
        let id = enricher
            .flag_entity("x.Y", "TestDetector", Severity::Low, vec![], 0.5, None)
            .await;
        assert_ne!(id, Uuid::nil());
    }

    #[tokio::test]
    async fn get_duplicate_findings_requires_the_minimum_detector_count() {
        let graph = Arc::new(FakeGraph::default());
        let mut rows: Vec<CoreQueryRow> = Vec::new();
        for detector in ["GodClassDetector", "RadonDetector"] {
            let mut row: CoreQueryRow = HashMap::new();
            row.insert("detector".into(), json!(detector));
            row.insert("severity".into(), json!("high"));
            row.insert("issues".into(), json!(["x"]));
            row.insert("confidence".into(), json!(0.9));
            row.insert("timestamp".into(), json!(chrono::Utc::now().to_rfc3339()));
            rows.push(row);
        }
        *graph.next_rows.lock().unwrap() = rows;

        let enricher = GraphEnricher::new(graph, "acme/web".to_string());
        let found = enricher
            .get_duplicate_findings("mymodule.MyClass", 2)
            .await;
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].all_detectors.len(), 2);
    }

    #[tokio::test]
    async fn get_duplicate_findings_empty_below_the_threshold() {
        let graph = Arc::new(FakeGraph::default());
        let mut row: CoreQueryRow = HashMap::new();
        row.insert("detector".into(), json!("GodClassDetector"));
        row.insert("severity".into(), json!("high"));
        row.insert("issues".into(), json!(["x"]));
        row.insert("confidence".into(), json!(0.9));
        row.insert("timestamp".into(), json!(chrono::Utc::now().to_rfc3339()));
        *graph.next_rows.lock().unwrap() = vec![row];

        let enricher = GraphEnricher::new(graph, "acme/web".to_string());
        let found = enricher
            .get_duplicate_findings("mymodule.SingleFlag", 2)
            .await;
        assert!(found.is_empty());
    }
}
