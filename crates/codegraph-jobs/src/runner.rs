use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use codegraph_cache::QueryCache;
use codegraph_core::{GraphStoreAdapter, ParserBridge};
use codegraph_detect::{Detector, EngineConfig};
use codegraph_enrich::GraphEnricher;
use codegraph_git::GitRepository;
use codegraph_ingest::IngestConfig;
use codegraph_scan::ScanConfig;
use codegraph_tenant::GraphClientFactory;
use thiserror::Error;
use uuid::Uuid;

use crate::job::JobKind;
use crate::progress::ProgressTracker;
use crate::scoring;
use crate::store::{AnalysisRun, AnalysisRunStore, AnalysisStatus, PersistedFinding};

/// Failures from running an analysis job, split along the line that decides
/// whether a retry is worth attempting (spec §4.9 "Retry policy": "transient
/// network/clone failures retry, validation errors ... do not").
#[derive(Debug, Error)]
pub enum JobError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("transient error: {0}")]
    Transient(#[from] anyhow::Error),
}

/// Everything one `analyzeRepository`/`analyzeRepositoryPriority`/`analyzePR`
/// job needs that isn't already bound into the `JobRunner` (spec §4.9
/// execution skeleton inputs).
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub analysis_run_id: Uuid,
    pub org_id: Uuid,
    pub org_slug: Option<String>,
    pub repo_id: String,
    pub repo_slug: Option<String>,
    pub remote_url: String,
    pub commit_sha: String,
    pub incremental: bool,
}

/// Runs the Job Runner's execution skeleton against one tenant's graph
/// (spec §4.9, C9). Owns the long-lived collaborators (tenant factory,
/// parser bridge, run store) that every job invocation shares; per-job
/// state (clone directory, tenant client, cache) is scoped to `run_analysis`.
pub struct JobRunner<S: AnalysisRunStore> {
    pub tenants: Arc<GraphClientFactory>,
    pub parser: Arc<dyn ParserBridge>,
    pub store: Arc<S>,
    pub clone_dir: PathBuf,
    pub detectors_phase1: Vec<Arc<dyn Detector>>,
    pub detectors_phase2: Vec<Arc<dyn Detector>>,
    pub engine_config: EngineConfig,
}

/// Outcome handed back to the caller so it can decide which hook job to
/// enqueue next (spec §4.9 step 7).
pub struct AnalysisOutcome {
    pub health_score: f32,
    pub findings_count: usize,
    pub files_analyzed: usize,
}

impl<S: AnalysisRunStore + 'static> JobRunner<S> {
    /// Steps 1-7 of spec §4.9's execution skeleton. `kind` only affects
    /// logging/metrics labeling here — queue routing and retry counts are
    /// decided by the caller before this is invoked.
    // Every event emitted by the scan/ingest/enrich/detect stages this job
    // drives inherits these three fields from the span, so callees never
    // need `repo_id`/`org_id`/`analysis_run_id` threaded through their own
    // signatures just to log them.
    #[tracing::instrument(
        name = "analysis_job",
        skip(self, req),
        fields(
            analysis_run_id = %req.analysis_run_id,
            repo_id = %req.repo_id,
            org_id = %req.org_id,
        )
    )]
    pub async fn run_analysis(
        &self,
        kind: JobKind,
        req: &AnalysisRequest,
    ) -> Result<AnalysisOutcome, JobError> {
        tracing::info!(kind = ?kind, "starting analysis job");

        // Step 1: load the AnalysisRun record, mark it running.
        let mut run = self
            .store
            .load(req.analysis_run_id)
            .await
            .map_err(JobError::Transient)?
            .ok_or_else(|| JobError::Validation(format!("analysis run {} not found", req.analysis_run_id)))?;
        run.status = AnalysisStatus::Running;
        run.started_at = Some(Utc::now());
        self.store.save(&run).await.map_err(JobError::Transient)?;

        let progress = Arc::new(ProgressTracker::new(self.store.clone(), req.analysis_run_id));
        progress.update(5, "Cloning repository").await;

        // Step 2: clone to a temporary directory at the requested commit;
        // always removed on the way out, success or failure.
        let clone_path = self.clone_dir.join(req.analysis_run_id.to_string());
        if let Some(parent) = clone_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| JobError::Transient(e.into()))?;
        }
        // `GitRepository` wraps a `git2::Repository`, which is not `Send` —
        // the clone+checkout runs to completion and is dropped entirely
        // inside the blocking closure; only a `Result<(), _>` crosses back.
        let clone_result = tokio::task::spawn_blocking({
            let remote_url = req.remote_url.clone();
            let commit_sha = req.commit_sha.clone();
            let clone_path = clone_path.clone();
            move || GitRepository::clone_at_commit(&remote_url, &clone_path, &commit_sha).map(|_| ())
        })
        .await
        .map_err(|e| JobError::Transient(e.into()));

        let outcome = match clone_result {
            Ok(Ok(())) => self.run_against_clone(req, &clone_path, &progress).await,
            Ok(Err(err)) => Err(classify_clone_error(err)),
            Err(err) => Err(err),
        };

        if clone_path.exists() {
            if let Err(err) = tokio::fs::remove_dir_all(&clone_path).await {
                tracing::warn!(path = %clone_path.display(), error = %err, "failed to clean up clone directory");
            }
        }

        match outcome {
            Ok(outcome) => {
                progress.flush_now(100, "Complete").await;
                Ok(outcome)
            }
            Err(err) => {
                self.mark_failed(&mut run, &err.to_string()).await;
                Err(err)
            }
        }
    }

    async fn run_against_clone(
        &self,
        req: &AnalysisRequest,
        clone_path: &std::path::Path,
        progress: &Arc<ProgressTracker<S>>,
    ) -> Result<AnalysisOutcome, JobError> {
        progress.update(20, "Building knowledge graph").await;

        // Step 3: obtain a tenant client from the Tenant Factory (C2).
        let client = self
            .tenants
            .get_client(req.org_id, req.org_slug.as_deref())
            .await
            .map_err(JobError::Transient)?;
        let graph: &dyn GraphStoreAdapter = client.store.as_ref();

        // Step 4: run the Ingestion Pipeline (incremental by default).
        let ingest_config = IngestConfig {
            repo_id: req.repo_id.clone(),
            repo_slug: req.repo_slug.clone(),
            incremental: req.incremental,
            batch_size: 100,
        };
        let scan_config = ScanConfig::default();
        let summary = codegraph_ingest::ingest(
            clone_path,
            &scan_config,
            &ingest_config,
            graph,
            self.parser.as_ref(),
            None,
        )
        .await
        .map_err(|e| JobError::Transient(e.into()))?;

        progress.update(60, "Analyzing code health").await;

        // Step 5: run the Detector Engine (C8) against the tenant graph.
        let cache = Arc::new(
            QueryCache::build(graph, &req.repo_id)
                .await
                .map_err(JobError::Transient)?,
        );
        let enricher = Arc::new(GraphEnricher::new(client.store.clone(), req.repo_id.clone()));
        let report = codegraph_detect::run(
            self.detectors_phase1.clone(),
            self.detectors_phase2.clone(),
            cache,
            enricher,
            req.repo_id.clone(),
            self.engine_config,
        )
        .await;

        if report.timed_out {
            tracing::warn!(repo_id = %req.repo_id, "detector engine hit its soft time limit");
        }

        progress.update(90, "Saving results").await;

        // Step 6: persist results (health score + per-category scores +
        // findings).
        let scores = scoring::score(&report.findings);
        let mut run = self
            .store
            .load(req.analysis_run_id)
            .await
            .map_err(JobError::Transient)?
            .ok_or_else(|| JobError::Validation("analysis run disappeared mid-run".to_string()))?;
        run.status = AnalysisStatus::Completed;
        run.health_score = Some(scores.overall);
        run.structure_score = Some(scores.structure);
        run.quality_score = Some(scores.quality);
        run.architecture_score = Some(scores.architecture);
        run.findings_count = report.findings.len();
        run.files_analyzed = summary.files_new + summary.files_changed + summary.files_unchanged;
        run.completed_at = Some(Utc::now());
        run.progress_percent = 100;
        run.current_step = "Complete".to_string();
        self.store.save(&run).await.map_err(JobError::Transient)?;

        let persisted: Vec<PersistedFinding> = report
            .findings
            .iter()
            .map(|f| PersistedFinding::from_finding(req.analysis_run_id, f))
            .collect();
        self.store.save_findings(&persisted).await.map_err(JobError::Transient)?;

        Ok(AnalysisOutcome {
            health_score: scores.overall,
            findings_count: report.findings.len(),
            files_analyzed: run.files_analyzed,
        })
    }

    async fn mark_failed(&self, run: &mut AnalysisRun, message: &str) {
        run.status = AnalysisStatus::Failed;
        run.error_message = Some(message.chars().take(1000).collect());
        run.completed_at = Some(Utc::now());
        if let Err(err) = self.store.save(run).await {
            tracing::warn!(analysis_run_id = %run.id, error = %err, "failed to persist failure status");
        }
    }
}

fn classify_clone_error(err: codegraph_git::GitIntegrationError) -> JobError {
    use codegraph_git::GitIntegrationError;
    match &err {
        GitIntegrationError::BranchNotFound(_) | GitIntegrationError::RepoNotFound(_) => {
            JobError::Validation(err.to_string())
        }
        _ => JobError::Transient(err.into()),
    }
}
