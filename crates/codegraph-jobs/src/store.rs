use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `AnalysisRun.status` (spec §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Per-organization, per-repository, per-analysis control-plane record
/// (spec §6.3). This crate does not own its storage — a real deployment
/// persists it in whatever relational store the control plane already uses
/// (the original ships it in Postgres via SQLAlchemy); `AnalysisRunStore` is
/// the seam, matching the way `GraphStoreAdapter`/`ParserBridge` keep this
/// workspace backend-agnostic at every boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub id: Uuid,
    pub repo_id: String,
    pub commit_sha: String,
    pub status: AnalysisStatus,
    pub health_score: Option<f32>,
    pub structure_score: Option<f32>,
    pub quality_score: Option<f32>,
    pub architecture_score: Option<f32>,
    pub findings_count: usize,
    pub files_analyzed: usize,
    pub score_delta: Option<f32>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress_percent: u8,
    pub current_step: String,
    pub error_message: Option<String>,
}

impl AnalysisRun {
    pub fn pending(id: Uuid, repo_id: impl Into<String>, commit_sha: impl Into<String>) -> Self {
        Self {
            id,
            repo_id: repo_id.into(),
            commit_sha: commit_sha.into(),
            status: AnalysisStatus::Pending,
            health_score: None,
            structure_score: None,
            quality_score: None,
            architecture_score: None,
            findings_count: 0,
            files_analyzed: 0,
            score_delta: None,
            started_at: None,
            completed_at: None,
            progress_percent: 0,
            current_step: "queued".to_string(),
            error_message: None,
        }
    }
}

/// Persisted finding (spec §6.3), the control-plane projection of
/// `codegraph_detect::Finding` — flattened with the `analysisRunId` it
/// belongs to, since the detector-side `Finding` has no notion of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedFinding {
    pub id: String,
    pub analysis_run_id: Uuid,
    pub detector: String,
    pub severity: String,
    pub title: String,
    pub description: String,
    pub files: Vec<String>,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    pub suggested_fix: String,
    pub estimated_effort: String,
    pub graph_context: serde_json::Value,
    pub collab_meta: serde_json::Value,
}

impl PersistedFinding {
    pub fn from_finding(analysis_run_id: Uuid, finding: &codegraph_detect::Finding) -> Self {
        Self {
            id: finding.id.clone(),
            analysis_run_id,
            detector: finding.detector.clone(),
            severity: finding.severity.to_string(),
            title: finding.title.clone(),
            description: finding.description.clone(),
            files: finding.affected_files.clone(),
            line_start: finding.line_start,
            line_end: finding.line_end,
            suggested_fix: finding.suggested_fix.clone(),
            estimated_effort: finding.estimated_effort.clone(),
            graph_context: serde_json::to_value(&finding.graph_context).unwrap_or_default(),
            collab_meta: serde_json::to_value(&finding.collaboration_metadata).unwrap_or_default(),
        }
    }
}

/// Seam between the Job Runner and wherever `AnalysisRun`/`Finding` records
/// actually live (spec §6.3). `update_progress` is called frequently and
/// MUST be cheap — `ProgressTracker` (progress.rs) is what throttles calls
/// into this trait to roughly one every 500ms, not the store itself.
#[async_trait]
pub trait AnalysisRunStore: Send + Sync {
    async fn load(&self, id: Uuid) -> anyhow::Result<Option<AnalysisRun>>;
    async fn save(&self, run: &AnalysisRun) -> anyhow::Result<()>;
    async fn update_progress(&self, id: Uuid, percent: u8, current_step: &str) -> anyhow::Result<()>;
    async fn save_findings(&self, findings: &[PersistedFinding]) -> anyhow::Result<()>;
    /// Most recent *completed* run for `repo_id` other than `exclude_id`,
    /// used by the `onComplete` hook's regression check (spec §4.9
    /// "compares new score against the most-recent prior completed
    /// analysis").
    async fn previous_completed(
        &self,
        repo_id: &str,
        exclude_id: Uuid,
    ) -> anyhow::Result<Option<AnalysisRun>>;
}

/// In-process reference implementation, useful for tests and single-node
/// deployments that don't want a separate control-plane database.
pub struct InMemoryRunStore {
    runs: parking_lot::Mutex<std::collections::HashMap<Uuid, AnalysisRun>>,
    findings: parking_lot::Mutex<Vec<PersistedFinding>>,
}

impl Default for InMemoryRunStore {
    fn default() -> Self {
        Self {
            runs: parking_lot::Mutex::new(std::collections::HashMap::new()),
            findings: parking_lot::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AnalysisRunStore for InMemoryRunStore {
    async fn load(&self, id: Uuid) -> anyhow::Result<Option<AnalysisRun>> {
        Ok(self.runs.lock().get(&id).cloned())
    }

    async fn save(&self, run: &AnalysisRun) -> anyhow::Result<()> {
        self.runs.lock().insert(run.id, run.clone());
        Ok(())
    }

    async fn update_progress(&self, id: Uuid, percent: u8, current_step: &str) -> anyhow::Result<()> {
        if let Some(run) = self.runs.lock().get_mut(&id) {
            run.progress_percent = percent;
            run.current_step = current_step.to_string();
        }
        Ok(())
    }

    async fn save_findings(&self, findings: &[PersistedFinding]) -> anyhow::Result<()> {
        self.findings.lock().extend_from_slice(findings);
        Ok(())
    }

    async fn previous_completed(
        &self,
        repo_id: &str,
        exclude_id: Uuid,
    ) -> anyhow::Result<Option<AnalysisRun>> {
        let runs = self.runs.lock();
        Ok(runs
            .values()
            .filter(|r| r.repo_id == repo_id && r.id != exclude_id && r.status == AnalysisStatus::Completed)
            .max_by_key(|r| r.completed_at)
            .cloned())
    }
}
