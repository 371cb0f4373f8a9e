use thiserror::Error;

pub use crate::state::InvalidTransition;

/// The job store failed to create, read, or update a record.
///
/// Never retried by the engine itself; the external trigger may simply fire
/// again later against unchanged store state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("job not found: {0}")]
    NotFound(crate::job::JobId),

    #[error("store error: {0}")]
    Backend(String),
}

/// Failure reported by (or captured from) a job handler.
///
/// Captured by the engine, recorded as `last_error`, and turned into a
/// retry/failure transition. Never propagates past the engine.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

/// Errors surfaced to callers of the queue engine.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// A batch enqueue failed partway. The jobs counted by `enqueued` were
    /// created; compensating for them is the caller's responsibility.
    #[error("batch enqueue failed after {enqueued} of {total} jobs: {source}")]
    BatchEnqueue {
        enqueued: usize,
        total: usize,
        #[source]
        source: PersistenceError,
    },

    /// A lifecycle transition the engine attempted was not legal for the
    /// record's current state. Indicates the record was mutated out from
    /// under the engine.
    #[error(transparent)]
    State(#[from] InvalidTransition),
}

pub type Result<T> = std::result::Result<T, QueueError>;
