use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use priority_queue::PriorityQueue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::job::{JobKind, RetryPolicy};
use crate::runner::JobError;

// Re-export lock-free queue implementations for high-throughput paths.
pub mod lockfree {
    pub use codegraph_concurrent::mpmc::{LockFreeMpmcQueue, MpmcError};
    pub use codegraph_concurrent::spsc::{
        Consumer as SpscConsumer, Producer as SpscProducer, SpscError, WaitFreeSpscQueue,
    };
}

/// One unit of scheduled work: a closed `JobKind` rather than a free-form
/// name, plus the retry count this particular attempt carries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub attempt: u32,
}

impl Job {
    pub fn new(kind: JobKind, payload: serde_json::Value) -> Self {
        Self { id: Uuid::new_v4(), kind, payload, created_at: Utc::now(), attempt: 0 }
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Job {}
impl std::hash::Hash for Job {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job not found: {0}")]
    JobNotFound(Uuid),
    #[error("channel send error: {0}")]
    ChannelSendError(String),
}

/// One named queue (`default` / `analysis` / `analysis.priority`, spec
/// §4.9). Jobs pop highest-priority-first into an mpsc channel a
/// `QueueProcessor` drains; `ack_late` mirrors `celery_app.py`'s
/// `task_acks_late=True` — the in-memory priority queue entry is removed
/// only when a job is *popped* for execution, so a worker that dies mid-job
/// never silently drops it (the caller is expected to re-add on a detected
/// crash; see `JobRunner`).
pub struct JobQueue {
    name: &'static str,
    pq: Arc<RwLock<PriorityQueue<Job, Priority>>>,
    sender: Sender<Job>,
}

impl JobQueue {
    pub fn new(name: &'static str, buffer_size: usize) -> (Self, Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (Self { name, pq: Arc::new(RwLock::new(PriorityQueue::new())), sender }, receiver)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn enqueue(&self, job: Job, priority: Priority) -> Result<(), QueueError> {
        let mut pq = self.pq.write().await;
        pq.push(job, priority);
        counter!("codegraph_jobs_enqueued", "queue" => self.name).increment(1);
        gauge!("codegraph_jobs_queue_depth", "queue" => self.name).set(pq.len() as f64);
        info!(queue = self.name, priority = ?priority, "job enqueued");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.pq.read().await.len()
    }

    /// Background pop loop, forwarding into the mpsc channel the processor
    /// reads from.
    pub fn run(&self) {
        let pq = self.pq.clone();
        let sender = self.sender.clone();
        let name = self.name;

        tokio::spawn(async move {
            loop {
                let popped = {
                    let mut pq_guard = pq.write().await;
                    let popped = pq_guard.pop();
                    gauge!("codegraph_jobs_queue_depth", "queue" => name).set(pq_guard.len() as f64);
                    popped
                };

                if let Some((job, _)) = popped {
                    if let Err(e) = sender.send(job).await {
                        error!(queue = name, error = %e, "failed to forward job to processor");
                    }
                } else {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        });
    }
}

/// The three named queues a Job Runner deployment needs (spec §4.9 table).
pub struct JobQueues {
    pub default: JobQueue,
    pub analysis: JobQueue,
    pub analysis_priority: JobQueue,
}

impl JobQueues {
    pub fn new(buffer_size: usize) -> (Self, Receiver<Job>, Receiver<Job>, Receiver<Job>) {
        let (default, default_rx) = JobQueue::new("default", buffer_size);
        let (analysis, analysis_rx) = JobQueue::new("analysis", buffer_size);
        let (analysis_priority, priority_rx) = JobQueue::new("analysis.priority", buffer_size);
        (Self { default, analysis, analysis_priority }, default_rx, analysis_rx, priority_rx)
    }

    pub fn run_all(&self) {
        self.default.run();
        self.analysis.run();
        self.analysis_priority.run();
    }

    pub async fn enqueue(&self, job: Job, priority: Priority) -> Result<(), QueueError> {
        match job.kind.queue() {
            crate::job::QueueName::Default => self.default.enqueue(job, priority).await,
            crate::job::QueueName::Analysis => self.analysis.enqueue(job, priority).await,
            crate::job::QueueName::AnalysisPriority => {
                self.analysis_priority.enqueue(job, priority).await
            }
        }
    }
}

/// Batches jobs off a queue's channel with a size-or-timeout policy, handing
/// each batch to a caller-supplied handler. `worker_concurrency` mirrors
/// `WORKER_CONCURRENCY`/spec §6.1 (default 2, per-worker concurrency spec
/// §4.9 "Concurrency").
pub struct QueueProcessor<F> {
    receiver: Option<Receiver<Job>>,
    batch_size: usize,
    timeout: Duration,
    handler: Arc<F>,
}

impl<F, Fut> QueueProcessor<F>
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), JobError>> + Send + 'static,
{
    pub fn new(receiver: Receiver<Job>, batch_size: usize, timeout: Duration, handler: F) -> Self {
        Self { receiver: Some(receiver), batch_size, timeout, handler: Arc::new(handler) }
    }

    /// Runs until the channel closes, dispatching each job in a batch
    /// concurrently (bounded by `worker_concurrency` at the call site via a
    /// semaphore the caller wraps the handler in).
    pub async fn run(&mut self) {
        use tokio_stream::{wrappers::ReceiverStream, StreamExt};

        let Some(receiver) = self.receiver.take() else { return };
        let stream = ReceiverStream::new(receiver);
        let batch_stream = stream.chunks_timeout(self.batch_size, self.timeout);
        tokio::pin!(batch_stream);

        while let Some(batch) = batch_stream.next().await {
            let start = std::time::Instant::now();
            let mut set = tokio::task::JoinSet::new();
            for job in batch {
                let handler = self.handler.clone();
                set.spawn(execute_with_retry(job, handler));
            }
            while set.join_next().await.is_some() {}
            metrics::histogram!("codegraph_jobs_batch_duration_seconds")
                .record(start.elapsed().as_secs_f64());
            warn_if_slow(start.elapsed());
        }
    }
}

/// Drives one job to completion against `handler`, retrying transient
/// failures with the job kind's backoff policy up to its `max_retries`
/// (spec §4.9 "Retry policy"; scenario 6: "first execution raises a
/// transient error; the runner retries; the second succeeds"). Validation
/// errors and attempts past the retry budget are logged and dropped —
/// `task_acks_late` already popped this job off its priority queue, so a
/// caller that wants dead letters re-enqueues from here.
async fn execute_with_retry<F, Fut>(mut job: Job, handler: Arc<F>)
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), JobError>> + Send + 'static,
{
    loop {
        let attempt = job.attempt;
        match handler(job.clone()).await {
            Ok(()) => return,
            Err(err) => {
                if !job.kind.should_retry(&err) || attempt >= job.kind.max_retries() {
                    error!(
                        job_id = %job.id,
                        kind = ?job.kind,
                        attempt,
                        error = %err,
                        "job failed permanently"
                    );
                    return;
                }

                let delay = RetryPolicy::for_job(job.kind).delay_for_attempt(attempt);
                warn!(
                    job_id = %job.id,
                    kind = ?job.kind,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying job after transient failure"
                );
                tokio::time::sleep(delay).await;
                job.attempt += 1;
            }
        }
    }
}

fn warn_if_slow(elapsed: Duration) {
    if elapsed > Duration::from_secs(5) {
        warn!(?elapsed, "job batch took unusually long to drain");
    }
}
