use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{JobStore, PayloadMatch};
use crate::error::PersistenceError;
use crate::job::{Job, JobId};

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<JobId, Entry>,
    next_seq: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    // Insertion sequence breaks created_at ties so FIFO stays deterministic.
    seq: u64,
    job: Job,
}

/// In-memory job store (not persistent, for testing/dev).
///
/// One mutex guards the whole map, which makes `claim` trivially atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, PersistenceError> {
        self.inner
            .lock()
            .map_err(|_| PersistenceError::Backend("lock poisoned".to_string()))
    }

    /// Read a record by id. Test convenience, not part of [`JobStore`].
    pub fn get(&self, id: JobId) -> Option<Job> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.jobs.get(&id).map(|e| e.job.clone()))
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create(&self, job: Job) -> Result<Job, PersistenceError> {
        let mut inner = self.lock()?;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.jobs.insert(
            job.id,
            Entry {
                seq,
                job: job.clone(),
            },
        );
        Ok(job)
    }

    async fn find_next_due(&self, now: DateTime<Utc>) -> Result<Option<Job>, PersistenceError> {
        let inner = self.lock()?;
        let next = inner
            .jobs
            .values()
            .filter(|e| e.job.state.is_due(now))
            .min_by_key(|e| (e.job.created_at, e.seq))
            .map(|e| e.job.clone());
        Ok(next)
    }

    async fn claim(&self, id: JobId) -> Result<Option<Job>, PersistenceError> {
        let mut inner = self.lock()?;
        let Some(entry) = inner.jobs.get_mut(&id) else {
            return Ok(None);
        };
        match entry.job.state.claim() {
            Ok(running) => {
                entry.job.state = running;
                Ok(Some(entry.job.clone()))
            }
            // No longer queued: a concurrent claim won, or the job is
            // terminal. Not an error.
            Err(_) => Ok(None),
        }
    }

    async fn update(&self, job: &Job) -> Result<Job, PersistenceError> {
        let mut inner = self.lock()?;
        match inner.jobs.get_mut(&job.id) {
            Some(entry) => {
                entry.job = job.clone();
                Ok(job.clone())
            }
            None => Err(PersistenceError::NotFound(job.id)),
        }
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        filter: Option<&PayloadMatch>,
    ) -> Result<Vec<Job>, PersistenceError> {
        let inner = self.lock()?;
        let mut jobs: Vec<&Entry> = inner
            .jobs
            .values()
            .filter(|e| e.job.owner_id == owner_id)
            .filter(|e| match filter {
                Some(m) => e.job.payload.get(&m.key) == Some(&m.value),
                None => true,
            })
            .collect();
        // Newest first.
        jobs.sort_by(|a, b| (b.job.created_at, b.seq).cmp(&(a.job.created_at, a.seq)));
        Ok(jobs.into_iter().map(|e| e.job.clone()).collect())
    }
}
