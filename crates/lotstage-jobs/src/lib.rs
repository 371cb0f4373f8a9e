//! Publish job queue for Lotstage.
//!
//! Jobs are created by user actions (publishing a staged vehicle project to
//! a website or social platform) and executed one at a time by an external
//! timer driving [`JobQueue::process_next`]. Failed jobs retry with linear
//! backoff until a failure ceiling, then turn terminally failed.

pub mod error;
pub mod handler;
pub mod job;
pub mod queue;
pub mod state;
pub mod store;

pub use error::{HandlerError, PersistenceError, QueueError, Result};
pub use handler::JobHandler;
pub use job::{Job, JobId};
pub use queue::{EnqueueRequest, JobQueue, ProcessOutcome};
pub use state::{InvalidTransition, JobState, RetryPolicy};
pub use store::memory::MemoryStore;
pub use store::{JobStore, PayloadMatch};

#[cfg(feature = "postgres")]
pub use store::postgres::PostgresStore;
