use crate::record::LogEvent;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for batches of [`LogEvent`]s.
///
/// The [`PeriodicBatcher`](crate::batch::PeriodicBatcher) calls these
/// methods from its background task, one batch at a time, and never on the
/// application thread.
#[async_trait]
pub trait BatchedLogSink: Send + Sync {
    /// Deliver one batch, in order.
    ///
    /// **Parameters**
    /// - `events`: the events buffered since the previous flush, oldest
    ///   first.
    ///
    /// **Returns**
    /// - `Ok(())` once every event has been handled. Sinks that isolate
    ///   per-event failures (such as `LogtailSink`) always return `Ok`.
    /// - `Err(..)` if the batch as a whole could not be handled. The batcher
    ///   reports the error on the diagnostic channel and drops the batch;
    ///   there is no retry.
    async fn emit_batch(&self, events: &[LogEvent]) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Called when a flush tick finds nothing queued.
    ///
    /// Default implementation is a no-op.
    async fn on_empty_batch(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
