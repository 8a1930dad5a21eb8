use std::sync::Arc;

use async_trait::async_trait;
use logtail_sink::{
    formatter::{LogtailFormatter, MessageFormatter},
    init::init_tracing,
    record::LogEvent,
    sink::BatchedLogSink,
    LogtailConfig,
};
use tracing::{error, info};

/// Example of reusing the envelope formatter with a completely custom
/// destination by implementing `BatchedLogSink` directly. Here the
/// envelopes are printed instead of posted.
struct StdoutEnvelopeSink {
    formatter: LogtailFormatter,
}

#[async_trait]
impl BatchedLogSink for StdoutEnvelopeSink {
    async fn emit_batch(&self, events: &[LogEvent]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for event in events {
            println!("{}", self.formatter.format_message(event));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let formatter = LogtailFormatter::new(&LogtailConfig::new("unused", "custom-backend"))?;
    let sink: Arc<dyn BatchedLogSink> = Arc::new(StdoutEnvelopeSink { formatter });

    let guard = init_tracing(sink)?;

    info!("custom backend example started");
    error!(db = "stdout", "simulated error sent via custom backend");

    guard.shutdown().await;
    Ok(())
}
