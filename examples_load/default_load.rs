use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use logtail_sink::init::init_tracing;
use logtail_sink::noop_sink::NoopSink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(NoopSink::default());
    let guard = init_tracing(sink.clone())?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    guard.shutdown().await;
    println!("delivered {} events in {} batches", sink.events_seen(), sink.batches_seen());
    Ok(())
}
