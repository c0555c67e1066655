use crate::detector::{Detector, DetectorContext};
use crate::finding::{CollaborationMetadata, Finding};
use async_trait::async_trait;
use codegraph_core::Severity;
use serde_json::json;
use std::collections::HashMap;

/// Flags classes used by many callers (high fan-in) — changes to them ripple
/// across the codebase, "shotgun surgery" risk traditional linters miss.
/// Reads entirely from the Query Cache, independent of every other detector.
pub struct FanInDetector {
    pub threshold_critical: usize,
    pub threshold_high: usize,
    pub threshold_medium: usize,
}

impl Default for FanInDetector {
    fn default() -> Self {
        Self {
            threshold_critical: 25,
            threshold_high: 15,
            threshold_medium: 8,
        }
    }
}

#[async_trait]
impl Detector for FanInDetector {
    fn name(&self) -> &'static str {
        "FanInDetector"
    }

    async fn detect(&self, ctx: &DetectorContext) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (qualified_name, caller_count) in ctx.cache.called_by_counts() {
            if caller_count < self.threshold_medium {
                continue;
            }
            let Some(class) = ctx.cache.class(&qualified_name) else {
                continue;
            };

            let severity = if caller_count >= self.threshold_critical {
                Severity::Critical
            } else if caller_count >= self.threshold_high {
                Severity::High
            } else {
                Severity::Medium
            };

            let short_name = qualified_name
                .rsplit('.')
                .next()
                .unwrap_or(qualified_name.as_str())
                .to_string();

            let mut callers = ctx.cache.called_by(&qualified_name);
            callers.sort();
            let sample_callers: Vec<String> = callers.into_iter().take(5).collect();

            let suggested_fix = format!(
                "'{short_name}' is called from {caller_count} places. Consider a facade, \
                 splitting its responsibilities, or introducing an interface to decouple \
                 callers from the concrete type."
            );
            let estimated_effort = match severity {
                Severity::Critical => "Large (1-2 days)",
                Severity::High => "Large (4-8 hours)",
                _ => "Medium (2-4 hours)",
            }
            .to_string();

            let mut graph_context = HashMap::new();
            graph_context.insert("caller_count".to_string(), json!(caller_count));
            graph_context.insert("sample_callers".to_string(), json!(sample_callers));

            ctx.enricher
                .flag_entity(
                    &qualified_name,
                    self.name(),
                    severity,
                    vec!["high_fan_in".to_string()],
                    0.85,
                    None,
                )
                .await;

            findings.push(Finding {
                id: format!("fan_in::{qualified_name}"),
                detector: self.name().to_string(),
                severity,
                title: format!("High fan-in: {short_name}"),
                description: format!(
                    "'{qualified_name}' is used by {caller_count} callers. Changes to it will \
                     require updates across the codebase."
                ),
                affected_nodes: vec![qualified_name.clone()],
                affected_files: vec![class.file_path.clone()],
                line_start: Some(class.line_start),
                line_end: Some(class.line_end),
                suggested_fix,
                estimated_effort,
                graph_context,
                collaboration_metadata: vec![CollaborationMetadata {
                    detector: self.name().to_string(),
                    confidence: 0.85,
                    evidence: vec!["high_fan_in".to_string()],
                    tags: vec!["coupling".to_string(), "maintenance".to_string()],
                }],
            });
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{run, EngineConfig};
    use codegraph_cache::QueryCache;
    use codegraph_enrich::GraphEnricher;
    use codegraph_core::{FileFingerprint, GraphEntity, GraphStoreAdapter, QueryRow, RepoId};
    use std::sync::Arc;
    use std::time::Duration;

    struct FakeGraph;

    #[async_trait]
    impl GraphStoreAdapter for FakeGraph {
        async fn execute_query(
            &self,
            _query: &str,
            _params: QueryRow,
            _timeout: Option<Duration>,
        ) -> anyhow::Result<Vec<QueryRow>> {
            Ok(Vec::new())
        }
        async fn batch_create_nodes(&self, _entities: Vec<GraphEntity>) -> anyhow::Result<usize> {
            Ok(0)
        }
        async fn batch_create_relationships(
            &self,
            _rels: Vec<codegraph_core::EdgeRelationship>,
            _repo_id: &RepoId,
        ) -> anyhow::Result<usize> {
            Ok(0)
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
    async fn empty_cache_produces_no_findings() {
        let graph = Arc::new(FakeGraph);
        let cache = Arc::new(QueryCache::build(graph.as_ref(), &"acme/web".to_string()).await.unwrap());
        let enricher = Arc::new(GraphEnricher::new(graph, "acme/web".to_string()));

        let report = run(
            vec![Arc::new(FanInDetector::default())],
            Vec::new(),
            cache,
            enricher,
            "acme/web".to_string(),
            EngineConfig::default(),
        )
        .await;

        assert!(report.findings.is_empty());
        assert!(!report.timed_out);
    }
}
