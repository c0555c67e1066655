use codegraph_jobs::{Job, JobError, JobKind, JobQueue, Priority};

#[tokio::test]
async fn add_and_pop_respects_priority() {
    let (queue, mut receiver) = JobQueue::new("analysis", 10);

    let normal = Job::new(JobKind::AnalyzeRepository, serde_json::json!({"repo": "a"}));
    let priority = Job::new(JobKind::AnalyzeRepositoryPriority, serde_json::json!({"repo": "b"}));

    queue.enqueue(normal.clone(), Priority::Normal).await.unwrap();
    queue.enqueue(priority.clone(), Priority::Critical).await.unwrap();
    assert_eq!(queue.len().await, 2);

    queue.run();

    let first = receiver.recv().await.unwrap();
    assert_eq!(first.id, priority.id);

    let second = receiver.recv().await.unwrap();
    assert_eq!(second.id, normal.id);
}

#[tokio::test]
async fn processor_dispatches_every_enqueued_job() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    let (queue, receiver) = JobQueue::new("default", 10);
    for _ in 0..5 {
        queue
            .enqueue(Job::new(JobKind::OnComplete, serde_json::json!({})), Priority::Normal)
            .await
            .unwrap();
    }
    queue.run();

    let processed = Arc::new(AtomicUsize::new(0));
    let counter = processed.clone();
    let mut processor = codegraph_jobs::QueueProcessor::new(receiver, 10, Duration::from_millis(50), move |_job| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), JobError>(())
        }
    });

    let handle = tokio::spawn(async move {
        processor.run().await;
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.abort();

    assert_eq!(processed.load(Ordering::SeqCst), 5);
}
