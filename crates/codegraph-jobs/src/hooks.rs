use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::store::{AnalysisRun, AnalysisRunStore};

/// Where a customer wants webhook deliveries sent, plus the secret used to
/// sign the payload (spec §4.9 `sendWebhook`: "delivers a signed JSON
/// payload to each customer-configured endpoint for this org").
#[derive(Debug, Clone)]
pub struct WebhookEndpoint {
    pub url: String,
    pub secret: String,
}

/// Everything the hook jobs need that isn't already on `AnalysisRunStore`:
/// the GitHub installation token for an org, its customer webhook
/// endpoints, and the organization owner's notification address/thresholds.
/// Kept as its own seam (grounded on `hooks.py`'s `_get_github_token`,
/// `_get_org_owner`) so this crate never hard-codes a particular control
/// plane's schema.
#[async_trait]
pub trait OrgDirectory: Send + Sync {
    async fn github_token(&self, repo_id: &str) -> anyhow::Result<Option<String>>;
    async fn repo_full_name(&self, repo_id: &str) -> anyhow::Result<Option<String>>;
    async fn webhook_endpoints(&self, repo_id: &str) -> anyhow::Result<Vec<WebhookEndpoint>>;
    async fn owner_email(&self, repo_id: &str) -> anyhow::Result<Option<String>>;
    /// Health-score drop (0-100) that should trigger a regression alert
    /// instead of a plain completion notice (spec §4.9 `onComplete`;
    /// `hooks.py`'s `owner.email_preferences.regression_threshold`, default
    /// 10).
    async fn regression_threshold(&self, repo_id: &str) -> anyhow::Result<f32>;
}

/// Delivers a notification somewhere a human will see it (email, in-app).
/// Kept minimal and separate from `OrgDirectory`/HTTP delivery so a test
/// double only has to implement the one method it's exercising.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Runs the five post-analysis hook jobs: completion/failure notification,
/// PR comments, check runs, and signed webhook delivery. Pure business
/// logic lives here; `OrgDirectory`/`Notifier` own the actual I/O, and an
/// internal `reqwest::Client` talks to GitHub and customer webhook endpoints
/// directly since those protocols (REST + HMAC signing) are fixed, not
/// backend-swappable.
pub struct Hooks<S: AnalysisRunStore, D: OrgDirectory, N: Notifier> {
    pub store: std::sync::Arc<S>,
    pub directory: std::sync::Arc<D>,
    pub notifier: std::sync::Arc<N>,
    pub http: reqwest::Client,
    pub app_base_url: String,
}

impl<S: AnalysisRunStore, D: OrgDirectory, N: Notifier> Hooks<S, D, N> {
    /// `onComplete` (spec §4.9): regression check first, completion
    /// notification otherwise (`hooks.py::on_analysis_complete`).
    pub async fn on_complete(&self, analysis_run_id: uuid::Uuid) -> anyhow::Result<()> {
        let Some(run) = self.store.load(analysis_run_id).await? else {
            tracing::warn!(%analysis_run_id, "onComplete: analysis run not found");
            return Ok(());
        };
        let Some(owner_email) = self.directory.owner_email(&run.repo_id).await? else {
            tracing::warn!(repo_id = %run.repo_id, "onComplete: no organization owner to notify");
            return Ok(());
        };

        if let Some(prev) = self.store.previous_completed(&run.repo_id, run.id).await? {
            if let (Some(prev_score), Some(new_score)) = (prev.health_score, run.health_score) {
                let drop = prev_score - new_score;
                let threshold = self.directory.regression_threshold(&run.repo_id).await?;
                if drop >= threshold {
                    let body = format!(
                        "Code health for {} dropped from {prev_score:.1} to {new_score:.1} \
                         (-{drop:.1}). See {}/repos/{}/analyses/{}",
                        run.repo_id, self.app_base_url, run.repo_id, run.id
                    );
                    self.notifier.notify(&owner_email, "Code health regression detected", &body).await?;
                    return Ok(());
                }
            }
        }

        let body = format!(
            "Analysis for {} completed with health score {:.1}. See {}/repos/{}/analyses/{}",
            run.repo_id,
            run.health_score.unwrap_or(0.0),
            self.app_base_url,
            run.repo_id,
            run.id
        );
        self.notifier.notify(&owner_email, "Analysis complete", &body).await?;
        Ok(())
    }

    /// `onFailed` (spec §4.9; `hooks.py::on_analysis_failed`).
    pub async fn on_failed(&self, analysis_run_id: uuid::Uuid, error_message: &str) -> anyhow::Result<()> {
        let Some(run) = self.store.load(analysis_run_id).await? else {
            tracing::warn!(%analysis_run_id, "onFailed: analysis run not found");
            return Ok(());
        };
        let Some(owner_email) = self.directory.owner_email(&run.repo_id).await? else {
            return Ok(());
        };
        let body = format!("Analysis for {} failed: {error_message}", run.repo_id);
        self.notifier.notify(&owner_email, "Analysis failed", &body).await?;
        Ok(())
    }

    /// `postPRComment` (spec §4.9; `hooks.py::post_pr_comment`).
    pub async fn post_pr_comment(
        &self,
        analysis_run_id: uuid::Uuid,
        pr_number: u64,
    ) -> anyhow::Result<()> {
        let Some(run) = self.store.load(analysis_run_id).await? else {
            return Ok(());
        };
        let Some(token) = self.directory.github_token(&run.repo_id).await? else {
            tracing::warn!(repo_id = %run.repo_id, "postPRComment: no GitHub token available");
            return Ok(());
        };
        let Some(full_name) = self.directory.repo_full_name(&run.repo_id).await? else {
            return Ok(());
        };
        let Some((owner, repo)) = full_name.split_once('/') else {
            tracing::warn!(full_name, "postPRComment: repository full name is not owner/repo");
            return Ok(());
        };

        let body = format_pr_comment(&run, &self.app_base_url);
        let url = format!("https://api.github.com/repos/{owner}/{repo}/issues/{pr_number}/comments");
        self.http
            .post(url)
            .bearer_auth(&token)
            .header("User-Agent", "codegraph-jobs")
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `postCheckRun` (spec §4.9): creates a check-run on the commit, then
    /// completes it with a conclusion derived from the health score.
    pub async fn post_check_run(&self, analysis_run_id: uuid::Uuid) -> anyhow::Result<()> {
        let Some(run) = self.store.load(analysis_run_id).await? else {
            return Ok(());
        };
        let Some(token) = self.directory.github_token(&run.repo_id).await? else {
            return Ok(());
        };
        let Some(full_name) = self.directory.repo_full_name(&run.repo_id).await? else {
            return Ok(());
        };
        let Some((owner, repo)) = full_name.split_once('/') else {
            return Ok(());
        };

        let conclusion = check_conclusion(&run);
        let url = format!("https://api.github.com/repos/{owner}/{repo}/check-runs");
        self.http
            .post(url)
            .bearer_auth(&token)
            .header("User-Agent", "codegraph-jobs")
            .json(&serde_json::json!({
                "name": "codegraph/health",
                "head_sha": run.commit_sha,
                "status": "completed",
                "conclusion": conclusion,
                "output": {
                    "title": format!("Health score: {:.1}", run.health_score.unwrap_or(0.0)),
                    "summary": format!("{} findings across {} files", run.findings_count, run.files_analyzed),
                },
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `sendWebhook` (spec §4.9: "delivers a signed JSON payload... retries
    /// on 5xx/429 with backoff, drops on persistent 4xx"). The retry loop
    /// itself lives in the Job Runner's generic retry policy
    /// (`JobError::Transient` vs `JobError::Validation`); this method's job
    /// is to classify the response and sign the body.
    pub async fn send_webhook(&self, analysis_run_id: uuid::Uuid) -> anyhow::Result<()> {
        let Some(run) = self.store.load(analysis_run_id).await? else {
            return Ok(());
        };
        let endpoints = self.directory.webhook_endpoints(&run.repo_id).await?;
        let payload = serde_json::json!({
            "event": "analysis.completed",
            "analysis_run_id": run.id,
            "repo_id": run.repo_id,
            "health_score": run.health_score,
            "findings_count": run.findings_count,
        });
        let body = serde_json::to_vec(&payload)?;

        for endpoint in endpoints {
            let signature = sign_payload(&endpoint.secret, &body);
            let response = self
                .http
                .post(&endpoint.url)
                .header("Content-Type", "application/json")
                .header("X-Codegraph-Signature", signature)
                .body(body.clone())
                .send()
                .await?;

            let status = response.status();
            if status.is_client_error() {
                tracing::warn!(url = %endpoint.url, %status, "webhook endpoint rejected payload, dropping");
                continue;
            }
            if status.is_server_error() || status.as_u16() == 429 {
                anyhow::bail!("webhook endpoint {} returned {status}, will retry", endpoint.url);
            }
        }
        Ok(())
    }
}

/// HMAC-SHA256 over the raw body, hex-encoded — the standard GitHub-style
/// webhook signing scheme (spec §4.9 "signed JSON payload").
fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(body);
    let bytes = mac.finalize().into_bytes();
    format!("sha256={}", hex_encode(&bytes))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn check_conclusion(run: &AnalysisRun) -> &'static str {
    match run.health_score {
        Some(score) if score >= 70.0 => "success",
        Some(score) if score >= 40.0 => "neutral",
        _ => "failure",
    }
}

fn format_pr_comment(run: &AnalysisRun, app_base_url: &str) -> String {
    let delta = run
        .score_delta
        .map(|d| format!(" ({}{:.1})", if d >= 0.0 { "+" } else { "" }, d))
        .unwrap_or_default();
    format!(
        "## CodeGraph analysis\n\n\
         **Health score:** {:.1}{delta}\n\
         **Structure:** {:.1} · **Quality:** {:.1} · **Architecture:** {:.1}\n\
         **Findings:** {}\n\n\
         [Full report]({app_base_url}/repos/{}/analyses/{})",
        run.health_score.unwrap_or(0.0),
        run.structure_score.unwrap_or(0.0),
        run.quality_score.unwrap_or(0.0),
        run.architecture_score.unwrap_or(0.0),
        run.findings_count,
        run.repo_id,
        run.id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AnalysisStatus, InMemoryRunStore};
    use std::sync::Arc;

    struct FakeDirectory {
        owner_email: Option<String>,
        threshold: f32,
    }

    #[async_trait]
    impl OrgDirectory for FakeDirectory {
        async fn github_token(&self, _repo_id: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
        async fn repo_full_name(&self, _repo_id: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
        async fn webhook_endpoints(&self, _repo_id: &str) -> anyhow::Result<Vec<WebhookEndpoint>> {
            Ok(Vec::new())
        }
        async fn owner_email(&self, _repo_id: &str) -> anyhow::Result<Option<String>> {
            Ok(self.owner_email.clone())
        }
        async fn regression_threshold(&self, _repo_id: &str) -> anyhow::Result<f32> {
            Ok(self.threshold)
        }
    }

    struct RecordingNotifier {
        sent: parking_lot::Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
            self.sent.lock().push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn completed_run(id: uuid::Uuid, repo_id: &str, score: f32) -> AnalysisRun {
        let mut run = AnalysisRun::pending(id, repo_id, "deadbeef");
        run.status = AnalysisStatus::Completed;
        run.health_score = Some(score);
        run.completed_at = Some(chrono::Utc::now());
        run
    }

    #[tokio::test]
    async fn on_complete_sends_regression_alert_past_threshold() {
        let store = Arc::new(InMemoryRunStore::default());
        let prev_id = uuid::Uuid::new_v4();
        let new_id = uuid::Uuid::new_v4();
        store.save(&completed_run(prev_id, "acme/web", 90.0)).await.unwrap();
        store.save(&completed_run(new_id, "acme/web", 70.0)).await.unwrap();

        let notifier = Arc::new(RecordingNotifier { sent: parking_lot::Mutex::new(Vec::new()) });
        let hooks = Hooks {
            store: store.clone(),
            directory: Arc::new(FakeDirectory {
                owner_email: Some("owner@acme.test".to_string()),
                threshold: 10.0,
            }),
            notifier: notifier.clone(),
            http: reqwest::Client::new(),
            app_base_url: "https://app.test".to_string(),
        };

        hooks.on_complete(new_id).await.unwrap();

        let sent = notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Code health regression detected");
    }

    #[tokio::test]
    async fn on_complete_sends_plain_notification_below_threshold() {
        let store = Arc::new(InMemoryRunStore::default());
        let prev_id = uuid::Uuid::new_v4();
        let new_id = uuid::Uuid::new_v4();
        store.save(&completed_run(prev_id, "acme/web", 90.0)).await.unwrap();
        store.save(&completed_run(new_id, "acme/web", 85.0)).await.unwrap();

        let notifier = Arc::new(RecordingNotifier { sent: parking_lot::Mutex::new(Vec::new()) });
        let hooks = Hooks {
            store: store.clone(),
            directory: Arc::new(FakeDirectory {
                owner_email: Some("owner@acme.test".to_string()),
                threshold: 10.0,
            }),
            notifier: notifier.clone(),
            http: reqwest::Client::new(),
            app_base_url: "https://app.test".to_string(),
        };

        hooks.on_complete(new_id).await.unwrap();

        let sent = notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Analysis complete");
    }

    #[test]
    fn signature_is_deterministic_for_the_same_secret_and_body() {
        let a = sign_payload("shh", b"{\"x\":1}");
        let b = sign_payload("shh", b"{\"x\":1}");
        assert_eq!(a, b);
        assert!(a.starts_with("sha256="));
    }
}
