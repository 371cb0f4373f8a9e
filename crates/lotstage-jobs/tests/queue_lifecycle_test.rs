use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lotstage_jobs::{
    EnqueueRequest, HandlerError, Job, JobHandler, JobQueue, JobState, JobStore, MemoryStore,
    PersistenceError, ProcessOutcome, QueueError,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

fn t(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

/// Handler that fails while `failing` is set, counting every execution.
struct CmsPush {
    failing: Arc<AtomicBool>,
    executions: Arc<AtomicU32>,
}

#[async_trait]
impl JobHandler for CmsPush {
    fn kind(&self) -> &'static str {
        "website_publish"
    }

    async fn run(&self, _job: &Job) -> Result<(), HandlerError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(HandlerError::new("cms down"))
        } else {
            Ok(())
        }
    }
}

fn queue_with_cms(
    store: MemoryStore,
) -> (JobQueue, Arc<AtomicBool>, Arc<AtomicU32>) {
    let failing = Arc::new(AtomicBool::new(false));
    let executions = Arc::new(AtomicU32::new(0));
    let mut queue = JobQueue::new(store);
    queue.register(CmsPush {
        failing: failing.clone(),
        executions: executions.clone(),
    });
    (queue, failing, executions)
}

#[tokio::test]
async fn idle_when_nothing_is_due() {
    let store = MemoryStore::new();
    let (queue, _, executions) = queue_with_cms(store.clone());

    // Empty queue.
    assert_eq!(queue.process_next(t(0)).await.unwrap(), ProcessOutcome::Idle);

    // A future job is not eligible and not mutated.
    let job = queue
        .enqueue("dealer-1", "website_publish", json!({}), Some(t(100)))
        .await
        .unwrap();
    assert_eq!(queue.process_next(t(0)).await.unwrap(), ProcessOutcome::Idle);
    assert_eq!(executions.load(Ordering::SeqCst), 0);

    let stored = store.get(job.id).unwrap();
    assert_eq!(stored.attempts, 0);
    assert_eq!(stored.state, JobState::Queued { run_at: t(100) });
}

#[tokio::test]
async fn fifo_selection_by_creation_order() {
    let store = MemoryStore::new();
    let (queue, _, _) = queue_with_cms(store.clone());

    let a = queue
        .enqueue("dealer-1", "website_publish", json!({"n": "a"}), Some(t(0)))
        .await
        .unwrap();
    let b = queue
        .enqueue("dealer-1", "website_publish", json!({"n": "b"}), Some(t(0)))
        .await
        .unwrap();

    match queue.process_next(t(1)).await.unwrap() {
        ProcessOutcome::Processed { job_id, ok } => {
            assert_eq!(job_id, a.id);
            assert!(ok);
        }
        other => panic!("expected processed, got {other:?}"),
    }
    match queue.process_next(t(1)).await.unwrap() {
        ProcessOutcome::Processed { job_id, .. } => assert_eq!(job_id, b.id),
        other => panic!("expected processed, got {other:?}"),
    }
}

#[tokio::test]
async fn success_completes_and_clears_last_error() {
    let store = MemoryStore::new();
    let (queue, failing, _) = queue_with_cms(store.clone());

    let job = queue
        .enqueue("dealer-1", "website_publish", json!({}), Some(t(0)))
        .await
        .unwrap();

    // One failure first, so the success has prior attempts to preserve.
    failing.store(true, Ordering::SeqCst);
    queue.process_next(t(0)).await.unwrap();
    let stored = store.get(job.id).unwrap();
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.last_error.as_deref(), Some("cms down"));

    failing.store(false, Ordering::SeqCst);
    let outcome = queue.process_next(t(60)).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Processed { ok: true, .. }));

    let stored = store.get(job.id).unwrap();
    assert_eq!(stored.state, JobState::Completed);
    assert_eq!(stored.last_error, None);
    // Success does not increment attempts.
    assert_eq!(stored.attempts, 1);
}

#[tokio::test]
async fn backoff_schedule_is_linear_from_failure_time() {
    let store = MemoryStore::new();
    let (queue, failing, executions) = queue_with_cms(store.clone());
    failing.store(true, Ordering::SeqCst);

    let job = queue
        .enqueue(
            "dealer-1",
            "website_publish",
            json!({"projectId": "p1"}),
            Some(t(0)),
        )
        .await
        .unwrap();

    // Attempt 1 at t=0: re-queued for t=60s.
    queue.process_next(t(0)).await.unwrap();
    let stored = store.get(job.id).unwrap();
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.state, JobState::Queued { run_at: t(60) });

    // Before run_at: nothing to do, no execution.
    assert_eq!(queue.process_next(t(30)).await.unwrap(), ProcessOutcome::Idle);
    assert_eq!(executions.load(Ordering::SeqCst), 1);

    // Attempt 2 at t=60s: re-queued for t=60+120=180s.
    queue.process_next(t(60)).await.unwrap();
    let stored = store.get(job.id).unwrap();
    assert_eq!(stored.attempts, 2);
    assert_eq!(stored.state, JobState::Queued { run_at: t(180) });

    // Attempt 3 at t=180s: +180s backoff.
    queue.process_next(t(180)).await.unwrap();
    let stored = store.get(job.id).unwrap();
    assert_eq!(stored.state, JobState::Queued { run_at: t(360) });

    // Attempt 4 at t=360s: +240s backoff.
    queue.process_next(t(360)).await.unwrap();
    let stored = store.get(job.id).unwrap();
    assert_eq!(stored.attempts, 4);
    assert_eq!(stored.state, JobState::Queued { run_at: t(600) });
}

#[tokio::test]
async fn failure_ceiling_makes_job_terminal() {
    let store = MemoryStore::new();
    let (queue, failing, executions) = queue_with_cms(store.clone());
    failing.store(true, Ordering::SeqCst);

    let job = queue
        .enqueue("dealer-1", "website_publish", json!({}), Some(t(0)))
        .await
        .unwrap();

    let mut now = t(0);
    for _ in 0..5 {
        let outcome = queue.process_next(now).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Processed { ok: false, .. }));
        now = now + Duration::seconds(1200); // past any backoff
    }

    let stored = store.get(job.id).unwrap();
    assert_eq!(stored.attempts, 5);
    assert_eq!(
        stored.state,
        JobState::Failed {
            error: "cms down".to_string()
        }
    );
    assert_eq!(stored.last_error.as_deref(), Some("cms down"));

    // A sixth attempt never occurs.
    assert_eq!(queue.process_next(now).await.unwrap(), ProcessOutcome::Idle);
    assert_eq!(executions.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn unknown_kind_completes_trivially() {
    let store = MemoryStore::new();
    let queue = JobQueue::new(store.clone()); // no handlers registered

    let job = queue
        .enqueue("dealer-1", "video_render", json!({}), Some(t(0)))
        .await
        .unwrap();

    let outcome = queue.process_next(t(0)).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Processed { ok: true, .. }));

    let stored = store.get(job.id).unwrap();
    assert_eq!(stored.state, JobState::Completed);
    assert_eq!(stored.attempts, 0);
}

/// Handler whose internal fallible call errors out through `?`, the Rust
/// shape of an unhandled exception inside a handler.
struct StrictPayloadPush;

#[derive(Deserialize)]
#[allow(dead_code)]
struct StrictPayload {
    project_id: String,
}

#[async_trait]
impl JobHandler for StrictPayloadPush {
    fn kind(&self) -> &'static str {
        "strict_publish"
    }

    async fn run(&self, job: &Job) -> Result<(), HandlerError> {
        let _payload: StrictPayload = serde_json::from_value(job.payload.clone())?;
        Ok(())
    }
}

#[tokio::test]
async fn handler_error_escape_is_contained_and_retried() {
    let store = MemoryStore::new();
    let mut queue = JobQueue::new(store.clone());
    queue.register(StrictPayloadPush);

    // Payload the handler cannot decode.
    let job = queue
        .enqueue("dealer-1", "strict_publish", json!({"bogus": 1}), Some(t(0)))
        .await
        .unwrap();

    // The engine call itself does not raise; the failure rides the normal
    // retry path.
    let outcome = queue.process_next(t(0)).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Processed { ok: false, .. }));

    let stored = store.get(job.id).unwrap();
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.state, JobState::Queued { run_at: t(60) });
    assert!(stored.last_error.is_some());
}

#[tokio::test]
async fn get_status_isolates_owners_and_filters_project() {
    let store = MemoryStore::new();
    let (queue, _, _) = queue_with_cms(store);

    queue
        .enqueue("dealer-1", "website_publish", json!({"projectId": "p1"}), Some(t(0)))
        .await
        .unwrap();
    queue
        .enqueue("dealer-1", "social_publish", json!({"projectId": "p2"}), Some(t(0)))
        .await
        .unwrap();
    queue
        .enqueue("dealer-2", "website_publish", json!({"projectId": "p1"}), Some(t(0)))
        .await
        .unwrap();

    let mine = queue.get_status("dealer-1", None).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|j| j.owner_id == "dealer-1"));
    // Newest first.
    assert_eq!(mine[0].kind, "social_publish");

    let narrowed = queue.get_status("dealer-1", Some("p1")).await.unwrap();
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].payload["projectId"], "p1");
}

#[tokio::test]
async fn batch_enqueue_creates_all_requests() {
    let store = MemoryStore::new();
    let (queue, _, _) = queue_with_cms(store);

    let created = queue
        .enqueue_batch(
            "dealer-1",
            vec![
                EnqueueRequest::new("website_publish", json!({"projectId": "p1"})),
                EnqueueRequest::new(
                    "social_publish",
                    json!({"projectId": "p1", "platforms": ["facebook"]}),
                ),
            ],
        )
        .await
        .unwrap();

    assert_eq!(created.len(), 2);
    let listed = queue.get_status("dealer-1", Some("p1")).await.unwrap();
    assert_eq!(listed.len(), 2);
}

/// Store that fails every create after the first, to surface the partial
/// batch error.
struct FlakyStore {
    inner: MemoryStore,
    creates: AtomicU32,
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn create(&self, job: Job) -> Result<Job, PersistenceError> {
        if self.creates.fetch_add(1, Ordering::SeqCst) >= 1 {
            return Err(PersistenceError::Backend("connection reset".to_string()));
        }
        self.inner.create(job).await
    }

    async fn find_next_due(&self, now: DateTime<Utc>) -> Result<Option<Job>, PersistenceError> {
        self.inner.find_next_due(now).await
    }

    async fn claim(
        &self,
        id: lotstage_jobs::JobId,
    ) -> Result<Option<Job>, PersistenceError> {
        self.inner.claim(id).await
    }

    async fn update(&self, job: &Job) -> Result<Job, PersistenceError> {
        self.inner.update(job).await
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        filter: Option<&lotstage_jobs::PayloadMatch>,
    ) -> Result<Vec<Job>, PersistenceError> {
        self.inner.list_by_owner(owner_id, filter).await
    }
}

#[tokio::test]
async fn partial_batch_failure_reports_progress() {
    let queue = JobQueue::new(FlakyStore {
        inner: MemoryStore::new(),
        creates: AtomicU32::new(0),
    });

    let err = queue
        .enqueue_batch(
            "dealer-1",
            vec![
                EnqueueRequest::new("website_publish", json!({})),
                EnqueueRequest::new("social_publish", json!({})),
            ],
        )
        .await
        .unwrap_err();

    match err {
        QueueError::BatchEnqueue { enqueued, total, .. } => {
            assert_eq!(enqueued, 1);
            assert_eq!(total, 2);
        }
        other => panic!("expected batch error, got {other:?}"),
    }
}
