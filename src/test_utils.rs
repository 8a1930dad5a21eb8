//! Sinks shared by the unit tests.

use crate::record::LogEvent;
use crate::sink::BatchedLogSink;
use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Keeps the messages of every batch it receives, in order.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<LogEvent>>>,
    empty_ticks: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl RecordingSink {
    pub fn with_delay(delay: Duration) -> Self {
        RecordingSink {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|batch| batch.iter().map(|e| e.message.clone()).collect())
            .collect()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn empty_ticks(&self) -> usize {
        self.empty_ticks.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchedLogSink for RecordingSink {
    async fn emit_batch(&self, events: &[LogEvent]) -> Result<(), Box<dyn Error + Send + Sync>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.batches.lock().unwrap().push(events.to_vec());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_empty_batch(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.empty_ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails every batch.
pub struct FailingSink;

#[async_trait]
impl BatchedLogSink for FailingSink {
    async fn emit_batch(&self, _events: &[LogEvent]) -> Result<(), Box<dyn Error + Send + Sync>> {
        Err("ingestion unavailable".into())
    }
}
