use async_trait::async_trait;

use crate::error::HandlerError;
use crate::job::Job;

/// A pluggable unit of work, keyed by job kind.
///
/// Handlers execute the actual effect of a job (pushing to a CMS, posting to
/// a social API). They report failure by returning `Err`; the engine records
/// the message and drives the retry/failure-ceiling transition. A handler
/// must not panic — wrap fallible work in `Result` and let `?` carry it out.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job kind this handler processes.
    fn kind(&self) -> &'static str;

    /// Execute the job. The full record is supplied; most handlers only
    /// look at `job.payload`.
    async fn run(&self, job: &Job) -> Result<(), HandlerError>;
}
