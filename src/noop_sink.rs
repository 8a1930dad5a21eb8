use crate::record::LogEvent;
use crate::sink::BatchedLogSink;
use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};

/// A sink that drops every batch, counting what it was given.
///
/// Useful for measuring the overhead of the layer and batcher without any
/// network I/O, and for tests that only care about batching.
#[derive(Default)]
pub struct NoopSink {
    events: AtomicU64,
    batches: AtomicU64,
}

impl NoopSink {
    pub fn events_seen(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub fn batches_seen(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BatchedLogSink for NoopSink {
    async fn emit_batch(&self, events: &[LogEvent]) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.events.fetch_add(events.len() as u64, Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
