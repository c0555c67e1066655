use std::time::Duration;

/// The fixed job table (spec §4.9): every job kind this system ever
/// schedules, with its queue, retry budget, and soft timeout. Rather than a
/// free-form `name: String`, jobs here are a closed set — routing and retry
/// policy are a property of the kind, not of whatever string a caller
/// happened to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum JobKind {
    AnalyzeRepository,
    AnalyzeRepositoryPriority,
    AnalyzePr,
    OnComplete,
    OnFailed,
    PostPrComment,
    PostCheckRun,
    SendWebhook,
}

/// Named queue a job kind is routed to (spec §4.9 table, §6.1 `QUEUE_URL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    Default,
    Analysis,
    AnalysisPriority,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Default => "default",
            QueueName::Analysis => "analysis",
            QueueName::AnalysisPriority => "analysis.priority",
        }
    }
}

impl JobKind {
    pub fn queue(&self) -> QueueName {
        match self {
            JobKind::AnalyzeRepository | JobKind::AnalyzePr => QueueName::Analysis,
            JobKind::AnalyzeRepositoryPriority => QueueName::AnalysisPriority,
            JobKind::OnComplete
            | JobKind::OnFailed
            | JobKind::PostPrComment
            | JobKind::PostCheckRun
            | JobKind::SendWebhook => QueueName::Default,
        }
    }

    pub fn max_retries(&self) -> u32 {
        match self {
            JobKind::AnalyzeRepository | JobKind::AnalyzeRepositoryPriority => 3,
            JobKind::AnalyzePr => 2,
            // Hooks are best-effort; a handful of retries covers transient
            // 5xx/network blips without holding up the default queue.
            JobKind::OnComplete
            | JobKind::OnFailed
            | JobKind::PostPrComment
            | JobKind::PostCheckRun
            | JobKind::SendWebhook => 2,
        }
    }

    pub fn soft_timeout(&self) -> Duration {
        match self {
            JobKind::AnalyzeRepository
            | JobKind::AnalyzeRepositoryPriority
            | JobKind::AnalyzePr => Duration::from_secs(30 * 60),
            JobKind::OnComplete
            | JobKind::OnFailed
            | JobKind::PostPrComment
            | JobKind::PostCheckRun
            | JobKind::SendWebhook => Duration::from_secs(30),
        }
    }

    /// Hard limit is the soft limit plus a fixed grace period (celery_app.py:
    /// `task_time_limit` 2100s against a 1800s `task_soft_time_limit`, a
    /// 300s/5min grace window) so a worker that ignores the soft deadline is
    /// still force-killed rather than running forever.
    pub fn hard_timeout(&self) -> Duration {
        self.soft_timeout() + Duration::from_secs(5 * 60)
    }

    /// Whether this job kind is a hook: failures are logged, never rolled
    /// back into the analysis they followed (spec §4.9 "Best-effort;
    /// failures don't roll back analysis").
    pub fn is_hook(&self) -> bool {
        matches!(
            self,
            JobKind::OnComplete
                | JobKind::OnFailed
                | JobKind::PostPrComment
                | JobKind::PostCheckRun
                | JobKind::SendWebhook
        )
    }

    /// Whether an error from running this job kind should be retried.
    /// Validation errors (bad commit SHA, missing repo/analysis run) are
    /// permanent; everything else (clone failure, graph connection drop) is
    /// presumed transient (spec §4.9 "Retry policy").
    pub fn should_retry(&self, err: &crate::runner::JobError) -> bool {
        !matches!(err, crate::runner::JobError::Validation(_))
    }

    /// Per-job-kind rate limit, jobs/minute/worker (spec §4.9 "e.g.
    /// `analyzeRepository` ≤ 10/minute/worker"; `celery_app.py`'s
    /// `analyze_repository`: 10/min, `analyze_pr`: 20/min annotations).
    pub fn rate_limit_per_minute(&self) -> Option<u32> {
        match self {
            JobKind::AnalyzeRepository | JobKind::AnalyzeRepositoryPriority => Some(10),
            JobKind::AnalyzePr => Some(20),
            _ => None,
        }
    }
}

/// Exponential backoff with jitter (spec §4.9 "Retry policy"; `celery_app.py`
/// `retry_backoff=True, retry_backoff_max=600, retry_jitter=True`). Full
/// jitter per AWS's backoff guidance: `random(0, min(cap, base * 2^attempt))`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    /// `analysis`/`analysis.priority` queues use a 600s/300s backoff cap
    /// respectively (`celery_app.py`: `analyze_repository` 600s,
    /// `analyze_repository_priority` 300s so the enterprise lane recovers
    /// faster); everything else uses a short 30s cap.
    pub fn for_job(kind: JobKind) -> Self {
        let cap = match kind {
            JobKind::AnalyzeRepository | JobKind::AnalyzePr => Duration::from_secs(600),
            JobKind::AnalyzeRepositoryPriority => Duration::from_secs(300),
            _ => Duration::from_secs(30),
        };
        Self { base: Duration::from_secs(1), cap }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base.as_secs_f64() * 2f64.powi(attempt as i32);
        let capped = exp.min(self.cap.as_secs_f64());
        let jittered = rand::random::<f64>() * capped;
        Duration::from_secs_f64(jittered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_table_matches_the_spec() {
        assert_eq!(JobKind::AnalyzeRepository.queue().as_str(), "analysis");
        assert_eq!(JobKind::AnalyzeRepositoryPriority.queue().as_str(), "analysis.priority");
        assert_eq!(JobKind::AnalyzePr.queue().as_str(), "analysis");
        assert_eq!(JobKind::OnComplete.queue().as_str(), "default");

        assert_eq!(JobKind::AnalyzeRepository.max_retries(), 3);
        assert_eq!(JobKind::AnalyzePr.max_retries(), 2);

        assert_eq!(JobKind::AnalyzeRepository.soft_timeout(), Duration::from_secs(1800));
        assert!(JobKind::OnComplete.soft_timeout() < JobKind::AnalyzeRepository.soft_timeout());
    }

    #[test]
    fn backoff_never_exceeds_its_cap() {
        let policy = RetryPolicy::for_job(JobKind::AnalyzeRepositoryPriority);
        for attempt in 0..20 {
            assert!(policy.delay_for_attempt(attempt) <= policy.cap);
        }
    }
}
