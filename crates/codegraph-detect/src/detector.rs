use crate::finding::Finding;
use async_trait::async_trait;
use codegraph_cache::QueryCache;
use codegraph_core::RepoId;
use codegraph_enrich::GraphEnricher;
use std::sync::Arc;

/// Shared state handed to every detector (spec §4.8): the materialized Query
/// Cache (C6), the Graph Enricher (C7) for cross-detector flagging, and — in
/// Phase 2 only — the aggregate findings Phase 1 produced.
pub struct DetectorContext {
    pub cache: Arc<QueryCache>,
    pub enricher: Arc<GraphEnricher>,
    pub repo_id: RepoId,
    pub previous_findings: Vec<Finding>,
}

impl DetectorContext {
    pub fn new(
        cache: Arc<QueryCache>,
        enricher: Arc<GraphEnricher>,
        repo_id: RepoId,
        previous_findings: Vec<Finding>,
    ) -> Self {
        Self {
            cache,
            enricher,
            repo_id,
            previous_findings,
        }
    }
}

/// A detector capability (spec §4.8): `detect()`, `severity()` per finding,
/// and the `needsPreviousFindings` flag that decides which scheduling phase
/// it runs in. `name()` identifies the detector in findings, flags, and logs.
#[async_trait]
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    /// `true` routes this detector to Phase 2 (sequential, after all Phase-1
    /// detectors complete) where `ctx.previous_findings` is populated.
    /// Defaults to `false` — most detectors are independent (spec §4.8,
    /// `base.py`'s `needs_previous_findings` property).
    fn needs_previous_findings(&self) -> bool {
        false
    }

    async fn detect(&self, ctx: &DetectorContext) -> Vec<Finding>;
}
