use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::error;

use logtail_sink::batch::BatchOptions;
use logtail_sink::init::{init_tracing_with_config, LayerConfig};
use logtail_sink::noop_sink::NoopSink;
use logtail_sink::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(NoopSink::default());

    let layer_config = LayerConfig {
        batch: BatchOptions {
            batch_size_limit: 1_000,
            period: Duration::from_millis(200),
            queue_limit: 50_000,
        },
        min_level: Level::Error,
        enable_stdout: false,
    };

    let guard = init_tracing_with_config(sink.clone(), layer_config)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: sent {} events in {:?} (~{:.0} ev/s), dropped {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        guard.stats().dropped_events.load(Ordering::Relaxed)
    );

    guard.shutdown().await;
    println!("delivered {} events", sink.events_seen());
    Ok(())
}
