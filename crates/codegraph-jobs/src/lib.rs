pub mod hooks;
pub mod job;
pub mod progress;
pub mod queue;
pub mod runner;
pub mod scoring;
pub mod store;

pub use hooks::{Hooks, Notifier, OrgDirectory, WebhookEndpoint};
pub use job::{JobKind, QueueName, RetryPolicy};
pub use progress::ProgressTracker;
pub use queue::{Job, JobQueue, JobQueues, Priority, QueueError, QueueProcessor};
pub use runner::{AnalysisOutcome, AnalysisRequest, JobError, JobRunner};
pub use store::{AnalysisRun, AnalysisRunStore, AnalysisStatus, InMemoryRunStore, PersistedFinding};
