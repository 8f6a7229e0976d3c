// Job Dispatcher Port
// "Run this callable at most once, possibly on another worker"

use futures::future::BoxFuture;

/// A unit of job work, already bound to its job id
pub type JobFuture = BoxFuture<'static, ()>;

/// Schedules job executions.
///
/// Implementations must run each dispatched future at most once and must not
/// retry it. Failures are handled inside the future itself.
pub trait JobDispatcher: Send + Sync {
    fn dispatch(&self, job: JobFuture);
}
