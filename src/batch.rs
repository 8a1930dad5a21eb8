use crate::diagnostics::DiagnosticSink;
use crate::error::LogtailError;
use crate::record::LogEvent;
use crate::sink::BatchedLogSink;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Buffering and flush policy for [`PeriodicBatcher`].
///
/// **Fields**
/// - `batch_size_limit`: flush as soon as this many events are buffered.
/// - `period`: flush whatever is buffered at this interval.
/// - `queue_limit`: events waiting to be batched; newer events are dropped
///   once the queue is full.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size_limit: usize,
    pub period: Duration,
    pub queue_limit: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size_limit: 1000,
            period: Duration::from_secs(2),
            queue_limit: 100_000,
        }
    }
}

/// Counters shared between the handles and the background task.
#[derive(Debug, Default)]
pub struct BatcherStats {
    /// Events offered to the batcher.
    pub total_events: AtomicU64,
    /// Successfully enqueued.
    pub enqueued_events: AtomicU64,
    /// Dropped because the queue was full or the batcher had shut down.
    pub dropped_events: AtomicU64,
}

/// Cheap, cloneable producer side of a [`PeriodicBatcher`].
#[derive(Clone)]
pub struct BatcherHandle {
    sender: mpsc::Sender<LogEvent>,
    shutdown: Arc<Notify>,
    stats: Arc<BatcherStats>,
}

impl BatcherHandle {
    /// Offer an event without blocking.
    ///
    /// **Returns**
    /// - `true` if the event was queued.
    /// - `false` if it was dropped (queue full or batcher stopped).
    pub fn try_enqueue(&self, event: LogEvent) -> bool {
        self.stats.total_events.fetch_add(1, Ordering::Relaxed);
        match self.sender.try_send(event) {
            Ok(()) => {
                self.stats.enqueued_events.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.stats.dropped_events.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Ask the background task to stop accepting events, flush what is
    /// already queued and release the sink. Await the task's `JoinHandle`
    /// to wait for the final flush.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub fn stats(&self) -> &BatcherStats {
        &self.stats
    }
}

/// Collects events from a bounded queue and hands them to a
/// [`BatchedLogSink`] when the batch is full or the period elapses,
/// whichever comes first.
///
/// A single task owns the sink, so at most one batch is in flight.
pub struct PeriodicBatcher;

impl PeriodicBatcher {
    /// Spawn the background task on the current Tokio runtime.
    ///
    /// Minimal thresholds are enforced for `queue_limit`, `batch_size_limit`
    /// and `period` to avoid degenerate configurations.
    pub fn spawn(
        sink: Arc<dyn BatchedLogSink>,
        options: BatchOptions,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> (BatcherHandle, JoinHandle<()>) {
        let (batcher, worker) = Worker::new(sink, options, diagnostics);
        (batcher, tokio::spawn(worker.run()))
    }

    /// Run the background task on a dedicated thread with its own
    /// single-threaded Tokio runtime.
    ///
    /// Every task the sink spawns (HTTP connection drivers included) and
    /// every blocking call it makes runs on threads flagged as delivery
    /// threads, see [`on_delivery_thread`]. The caller does not need to be
    /// inside a runtime.
    pub fn spawn_dedicated(
        sink: Arc<dyn BatchedLogSink>,
        options: BatchOptions,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<(BatcherHandle, DeliveryThread), LogtailError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name(DELIVERY_THREAD_NAME)
            .on_thread_start(mark_delivery_thread)
            .build()
            .map_err(|e| LogtailError::Delivery(format!("failed to build runtime: {e}")))?;

        let (batcher, worker) = Worker::new(sink, options, diagnostics);
        let (done_tx, done_rx) = oneshot::channel();
        std::thread::Builder::new()
            .name(DELIVERY_THREAD_NAME.to_string())
            .spawn(move || {
                mark_delivery_thread();
                runtime.block_on(worker.run());
                drop(runtime);
                let _ = done_tx.send(());
            })
            .map_err(|e| LogtailError::Delivery(format!("failed to start thread: {e}")))?;

        Ok((batcher, DeliveryThread { done: done_rx }))
    }
}

const DELIVERY_THREAD_NAME: &str = "logtail-delivery";

thread_local! {
    static DELIVERY_THREAD: Cell<bool> = Cell::new(false);
}

fn mark_delivery_thread() {
    DELIVERY_THREAD.with(|flag| flag.set(true));
}

/// `true` on threads owned by a [`PeriodicBatcher::spawn_dedicated`]
/// runtime. Events raised there come from delivery itself.
pub fn on_delivery_thread() -> bool {
    DELIVERY_THREAD.with(Cell::get)
}

/// Completion of a batcher started with [`PeriodicBatcher::spawn_dedicated`].
pub struct DeliveryThread {
    done: oneshot::Receiver<()>,
}

impl DeliveryThread {
    /// Wait until the final flush has finished and the runtime is gone.
    ///
    /// **Returns**
    /// - `Err(LogtailError::Delivery)` if the thread died before finishing.
    pub async fn join(self) -> Result<(), LogtailError> {
        self.done
            .await
            .map_err(|_| LogtailError::Delivery("delivery thread stopped before flushing".to_string()))
    }
}

/// Consumer side of the queue, owned by the background task.
struct Worker {
    rx: mpsc::Receiver<LogEvent>,
    shutdown: Arc<Notify>,
    sink: Arc<dyn BatchedLogSink>,
    diagnostics: Arc<dyn DiagnosticSink>,
    batch_size: usize,
    period: Duration,
}

impl Worker {
    fn new(
        sink: Arc<dyn BatchedLogSink>,
        options: BatchOptions,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> (BatcherHandle, Worker) {
        let queue_limit = options.queue_limit.max(1);
        let batch_size = options.batch_size_limit.max(1);
        let period = options.period.max(Duration::from_millis(10));

        let (tx, rx) = mpsc::channel::<LogEvent>(queue_limit);
        let shutdown = Arc::new(Notify::new());

        let batcher = BatcherHandle {
            sender: tx,
            shutdown: Arc::clone(&shutdown),
            stats: Arc::new(BatcherStats::default()),
        };
        let worker = Worker {
            rx,
            shutdown,
            sink,
            diagnostics,
            batch_size,
            period,
        };
        (batcher, worker)
    }

    async fn run(self) {
        let Worker {
            mut rx,
            shutdown,
            sink,
            diagnostics,
            batch_size,
            period,
        } = self;

        let mut batch = Vec::with_capacity(batch_size.min(1024));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.notified() => break,
                received = rx.recv() => match received {
                    Some(event) => {
                        batch.push(event);
                        if batch.len() >= batch_size {
                            emit(&*sink, &mut batch, &*diagnostics).await;
                            ticker.reset();
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if batch.is_empty() {
                        if let Err(e) = sink.on_empty_batch().await {
                            diagnostics.write_line(&format!("[PeriodicBatcher] empty batch handler failed: {e}"));
                        }
                    } else {
                        emit(&*sink, &mut batch, &*diagnostics).await;
                    }
                }
            }
        }

        // Stop accepting, then drain what was already queued.
        rx.close();
        while let Ok(event) = rx.try_recv() {
            batch.push(event);
            if batch.len() >= batch_size {
                emit(&*sink, &mut batch, &*diagnostics).await;
            }
        }
        if !batch.is_empty() {
            emit(&*sink, &mut batch, &*diagnostics).await;
        }
        debug!("log batcher stopped");
    }
}

async fn emit(sink: &dyn BatchedLogSink, batch: &mut Vec<LogEvent>, diagnostics: &dyn DiagnosticSink) {
    trace!(count = batch.len(), "flushing log batch");
    if let Err(e) = sink.emit_batch(batch).await {
        diagnostics.write_line(&format!(
            "[PeriodicBatcher] failed to emit batch of {} events: {e}",
            batch.len()
        ));
    }
    batch.clear();
}
