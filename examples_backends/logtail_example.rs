use tokio::time::Duration;
use tracing::{error, info, info_span};

use logtail_sink::batch::BatchOptions;
use logtail_sink::env::{env_or, LOGTAIL_APP_NAME_ENV, LOGTAIL_TOKEN_ENV};
use logtail_sink::{init_logtail, Facility, Level, LogtailConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LogtailConfig::new(
        env_or(LOGTAIL_TOKEN_ENV, "replace-with-source-token"),
        env_or(LOGTAIL_APP_NAME_ENV, "logtail-example"),
    )
    .facility(Facility::Local3)
    .minimum_level(Level::Information)
    .output_template("[{Level:u3}] {Message} (request {request_id:l})")
    .batch(BatchOptions {
        batch_size_limit: 100,
        period: Duration::from_millis(500),
        queue_limit: 10_000,
    });

    let guard = init_logtail(config, true)?;

    let span = info_span!("request", request_id = "r-42");
    let _entered = span.enter();

    info!("starting service");

    let err = "abc".parse::<u32>().unwrap_err();
    error!(
        user_id = 42,
        error = &err as &(dyn std::error::Error + 'static),
        "authentication failed"
    );

    guard.shutdown().await;
    Ok(())
}
