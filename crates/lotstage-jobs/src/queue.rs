use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{HandlerError, QueueError, Result};
use crate::handler::JobHandler;
use crate::job::{Job, JobId};
use crate::state::{JobState, RetryPolicy};
use crate::store::{JobStore, PayloadMatch};

/// What a single engine invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// No eligible job (or a concurrent trigger claimed it first).
    Idle,
    /// One job was executed and its transition committed.
    Processed { job_id: JobId, ok: bool },
}

/// One job to be created as part of a batch enqueue.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub kind: String,
    pub payload: serde_json::Value,
    pub run_at: Option<DateTime<Utc>>,
}

impl EnqueueRequest {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            run_at: None,
        }
    }

    pub fn run_at(mut self, at: DateTime<Utc>) -> Self {
        self.run_at = Some(at);
        self
    }
}

/// The queue engine: drives the job state machine one step per trigger.
///
/// There is no internal scheduler. An external timer (the web layer's runner
/// endpoint) calls [`JobQueue::process_next`] repeatedly; each call executes
/// at most one job to completion before returning.
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    policy: RetryPolicy,
}

impl JobQueue {
    pub fn new<S: JobStore + 'static>(store: S) -> Self {
        Self {
            store: Arc::new(store),
            handlers: HashMap::new(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register a handler for its job kind. Call at startup, before the
    /// first trigger fires.
    pub fn register<H: JobHandler + 'static>(&mut self, handler: H) {
        self.handlers
            .insert(handler.kind().to_string(), Arc::new(handler));
    }

    /// Persist one new `Queued` job. `run_at` defaults to now.
    pub async fn enqueue(
        &self,
        owner_id: &str,
        kind: &str,
        payload: serde_json::Value,
        run_at: Option<DateTime<Utc>>,
    ) -> Result<Job> {
        let job = Job::new(owner_id, kind, payload, run_at.unwrap_or_else(Utc::now));
        let job = self.store.create(job).await?;
        tracing::debug!(job_id = %job.id, kind = %job.kind, "job enqueued");
        Ok(job)
    }

    /// Enqueue several related jobs for one user action.
    ///
    /// Creates run sequentially; if the store fails partway the error
    /// reports how many jobs were already created, and compensating for
    /// them is the caller's responsibility.
    pub async fn enqueue_batch(
        &self,
        owner_id: &str,
        requests: Vec<EnqueueRequest>,
    ) -> Result<Vec<Job>> {
        let total = requests.len();
        let mut created = Vec::with_capacity(total);
        for request in requests {
            let job = Job::new(
                owner_id,
                request.kind,
                request.payload,
                request.run_at.unwrap_or_else(Utc::now),
            );
            match self.store.create(job).await {
                Ok(job) => created.push(job),
                Err(source) => {
                    return Err(QueueError::BatchEnqueue {
                        enqueued: created.len(),
                        total,
                        source,
                    })
                }
            }
        }
        Ok(created)
    }

    /// Select, claim, and execute at most one due job.
    ///
    /// The claim is a conditional `Queued -> Running` swap at the store, so
    /// of two overlapping triggers observing the same candidate only one
    /// runs the handler; the other sees [`ProcessOutcome::Idle`].
    pub async fn process_next(&self, now: DateTime<Utc>) -> Result<ProcessOutcome> {
        let Some(candidate) = self.store.find_next_due(now).await? else {
            return Ok(ProcessOutcome::Idle);
        };

        let Some(mut job) = self.store.claim(candidate.id).await? else {
            tracing::debug!(job_id = %candidate.id, "lost claim to a concurrent trigger");
            return Ok(ProcessOutcome::Idle);
        };

        match self.dispatch(&job).await {
            Ok(()) => {
                job.state = job.state.complete()?;
                job.last_error = None;
                tracing::info!(job_id = %job.id, kind = %job.kind, "job completed");
            }
            Err(HandlerError(message)) => {
                job.attempts += 1;
                job.state = job.state.reject(&message, job.attempts, now, &self.policy)?;
                job.last_error = Some(message);
                match &job.state {
                    JobState::Failed { error } => {
                        tracing::error!(
                            job_id = %job.id,
                            kind = %job.kind,
                            attempts = job.attempts,
                            error = %error,
                            "job failed permanently"
                        );
                    }
                    _ => {
                        tracing::warn!(
                            job_id = %job.id,
                            kind = %job.kind,
                            attempts = job.attempts,
                            "job failed, re-queued with backoff"
                        );
                    }
                }
            }
        }

        let ok = matches!(job.state, JobState::Completed);
        self.store.update(&job).await?;
        Ok(ProcessOutcome::Processed { job_id: job.id, ok })
    }

    async fn dispatch(&self, job: &Job) -> std::result::Result<(), HandlerError> {
        match self.handlers.get(job.kind.as_str()) {
            Some(handler) => handler.run(job).await,
            None => {
                // Unregistered kinds complete trivially so unknown or
                // not-yet-deployed job types never wedge the queue.
                tracing::warn!(kind = %job.kind, "no handler registered, completing trivially");
                Ok(())
            }
        }
    }

    /// Jobs for one owner, newest first, optionally narrowed to a project.
    pub async fn get_status(&self, owner_id: &str, project_id: Option<&str>) -> Result<Vec<Job>> {
        let filter = project_id.map(PayloadMatch::project);
        Ok(self.store.list_by_owner(owner_id, filter.as_ref()).await?)
    }
}
