use crate::detector::{Detector, DetectorContext};
use crate::finding::{sort_findings, Finding};
use codegraph_cache::QueryCache;
use codegraph_core::RepoId;
use codegraph_enrich::GraphEnricher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::warn;

/// Phase-1 worker pool sizing and soft cancellation deadline (spec §4.8).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Upper bound on concurrent Phase-1 detectors; the effective pool size
    /// is `min(CPU count, max_workers)`.
    pub max_workers: usize,
    pub soft_time_limit: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            soft_time_limit: Duration::from_secs(30 * 60),
        }
    }
}

/// Findings accumulated by one analysis run, plus whether the soft time
/// limit cut it short (spec §4.8 cancellation: stop scheduling new
/// detectors, return what's been accumulated so far).
#[derive(Debug, Clone, Default)]
pub struct EngineReport {
    pub findings: Vec<Finding>,
    pub timed_out: bool,
}

/// Runs the two-phase detector scheduler (spec §4.8): all
/// `needsPreviousFindings = false` detectors concurrently over a bounded
/// worker pool, then every `needsPreviousFindings = true` detector one at a
/// time with the Phase-1 findings and the enricher's flags available.
/// `enricher.cleanupMetadata()` runs first to guarantee a clean slate
/// (no leakage across analyses).
pub async fn run(
    phase1: Vec<Arc<dyn Detector>>,
    phase2: Vec<Arc<dyn Detector>>,
    cache: Arc<QueryCache>,
    enricher: Arc<GraphEnricher>,
    repo_id: RepoId,
    config: EngineConfig,
) -> EngineReport {
    enricher.cleanup_metadata(None).await;

    let deadline = Instant::now() + config.soft_time_limit;
    let worker_cap = num_cpus::get().max(1).min(config.max_workers.max(1));

    let mut findings = run_phase1(phase1, &cache, &enricher, &repo_id, worker_cap, deadline).await;
    let mut timed_out = Instant::now() >= deadline;

    if !timed_out {
        let (phase2_findings, phase2_timed_out) =
            run_phase2(phase2, &cache, &enricher, &repo_id, &findings, deadline).await;
        findings.extend(phase2_findings);
        timed_out = phase2_timed_out;
    } else {
        warn!("soft time limit reached before phase 2; skipping all phase-2 detectors");
    }

    sort_findings(&mut findings);
    EngineReport { findings, timed_out }
}

async fn run_phase1(
    detectors: Vec<Arc<dyn Detector>>,
    cache: &Arc<QueryCache>,
    enricher: &Arc<GraphEnricher>,
    repo_id: &RepoId,
    worker_cap: usize,
    deadline: Instant,
) -> Vec<Finding> {
    let semaphore = Arc::new(Semaphore::new(worker_cap));
    let mut set = JoinSet::new();

    for detector in detectors {
        if Instant::now() >= deadline {
            warn!("soft time limit reached; no longer scheduling phase-1 detectors");
            break;
        }
        let ctx = DetectorContext::new(cache.clone(), enricher.clone(), repo_id.clone(), Vec::new());
        let semaphore = semaphore.clone();
        let remaining = deadline.saturating_duration_since(Instant::now());
        set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Vec::new(),
            };
            let name = detector.name();
            match tokio::time::timeout(remaining, detector.detect(&ctx)).await {
                Ok(found) => found,
                Err(_) => {
                    warn!(detector = name, "detector exceeded the soft time limit; dropping its findings");
                    Vec::new()
                }
            }
        });
    }

    let mut findings = Vec::new();
    while let Some(result) = set.join_next().await {
        match result {
            Ok(mut found) => findings.append(&mut found),
            Err(e) => warn!(error = %e, "phase-1 detector task panicked"),
        }
    }
    findings
}

async fn run_phase2(
    detectors: Vec<Arc<dyn Detector>>,
    cache: &Arc<QueryCache>,
    enricher: &Arc<GraphEnricher>,
    repo_id: &RepoId,
    phase1_findings: &[Finding],
    deadline: Instant,
) -> (Vec<Finding>, bool) {
    let mut findings = Vec::new();
    for detector in detectors {
        if Instant::now() >= deadline {
            warn!("soft time limit reached; no longer scheduling phase-2 detectors");
            return (findings, true);
        }
        let ctx = DetectorContext::new(
            cache.clone(),
            enricher.clone(),
            repo_id.clone(),
            phase1_findings.to_vec(),
        );
        let remaining = deadline.saturating_duration_since(Instant::now());
        let name = detector.name();
        match tokio::time::timeout(remaining, detector.detect(&ctx)).await {
            Ok(mut found) => findings.append(&mut found),
            Err(_) => {
                warn!(detector = name, "detector exceeded the soft time limit; stopping phase 2");
                return (findings, true);
            }
        }
    }
    (findings, false)
}
