use crate::batch::{BatchOptions, BatcherHandle, BatcherStats, DeliveryThread, PeriodicBatcher};
use crate::config::LogtailConfig;
use crate::diagnostics::{default_diagnostics, DiagnosticSink};
use crate::error::LogtailError;
use crate::layer::LogtailLayer;
use crate::logtail::LogtailSink;
use crate::severity::Level;
use crate::sink::BatchedLogSink;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the logging layer.
///
/// **Fields**
/// - `batch`: queue capacity, batch size and flush period.
/// - `min_level`: least severe level forwarded to the sink.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   installed next to [`LogtailLayer`] and events are printed to the
///   console as well.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub batch: BatchOptions,
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            batch: BatchOptions::default(),
            min_level: Level::Verbose,
            enable_stdout: true,
        }
    }
}

/// Owns the background delivery thread. Call [`LogtailGuard::shutdown`]
/// before the process exits to flush buffered events.
pub struct LogtailGuard {
    batcher: BatcherHandle,
    delivery: DeliveryThread,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl LogtailGuard {
    pub fn stats(&self) -> &BatcherStats {
        self.batcher.stats()
    }

    /// Stop accepting events, flush what is queued and release the sink.
    pub async fn shutdown(self) {
        self.batcher.shutdown();
        if let Err(e) = self.delivery.join().await {
            self.diagnostics.write_line(&format!("[LogtailGuard] {e}"));
        }
    }
}

/// Build a [`LogtailLayer`] and start its batcher on a dedicated delivery
/// thread without installing a global subscriber, for applications that
/// compose their own.
///
/// **Returns**
/// - `Err(LogtailError::Delivery)` if the delivery thread cannot start.
pub fn logtail_layer(
    sink: Arc<dyn BatchedLogSink>,
    config: &LayerConfig,
) -> Result<(LogtailLayer, LogtailGuard), LogtailError> {
    let diagnostics = default_diagnostics();
    let (batcher, delivery) =
        PeriodicBatcher::spawn_dedicated(sink, config.batch.clone(), Arc::clone(&diagnostics))?;
    let layer = LogtailLayer::new(batcher.clone(), config.min_level);
    Ok((
        layer,
        LogtailGuard {
            batcher,
            delivery,
            diagnostics,
        },
    ))
}

/// Initialize the global `tracing` subscriber using the provided sink and
/// [`LayerConfig`].
///
/// **Returns**
/// - a [`LogtailGuard`] for flushing on shutdown.
/// - `Err(LogtailError::SubscriberInstall)` if a global subscriber is
///   already set.
pub fn init_tracing_with_config(
    sink: Arc<dyn BatchedLogSink>,
    config: LayerConfig,
) -> Result<LogtailGuard, LogtailError> {
    let (layer, guard) = logtail_layer(sink, &config)?;

    // The two subscriber shapes have different types, so install each
    // branch separately.
    let installed = if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    };

    match installed {
        Ok(()) => Ok(guard),
        Err(e) => {
            guard.batcher.shutdown();
            Err(LogtailError::SubscriberInstall(e.to_string()))
        }
    }
}

/// Initialize tracing with [`LayerConfig::default`].
pub fn init_tracing(sink: Arc<dyn BatchedLogSink>) -> Result<LogtailGuard, LogtailError> {
    init_tracing_with_config(sink, LayerConfig::default())
}

/// Validate `config`, build a [`LogtailSink`] and install it globally.
/// Events below `config.minimum_level` are not forwarded.
///
/// Configuration errors are returned before anything is spawned.
pub fn init_logtail(config: LogtailConfig, enable_stdout: bool) -> Result<LogtailGuard, LogtailError> {
    let sink = LogtailSink::new(&config)?;
    init_tracing_with_config(
        Arc::new(sink),
        LayerConfig {
            batch: config.batch.clone(),
            min_level: config.minimum_level,
            enable_stdout,
        },
    )
}
