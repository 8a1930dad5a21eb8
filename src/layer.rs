use crate::batch::{on_delivery_thread, BatcherHandle};
use crate::formatter::DEFAULT_MESSAGE_ID_PROPERTY;
use crate::record::{ExceptionDetail, LogEvent, PropertyValue};
use crate::severity::Level;
use chrono::Utc;
use std::collections::BTreeMap;
use std::error::Error;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into [`LogEvent`]s and
/// hands them to a [`PeriodicBatcher`](crate::batch::PeriodicBatcher).
///
/// Fields of the enclosing spans are added as properties (outermost first,
/// so inner spans and the event itself win on name clashes). The event's
/// target becomes the `SourceContext` property unless the event sets one.
/// Enqueueing never blocks; if the queue is full the event is dropped and
/// counted in the batcher's stats. Events raised on a delivery thread
/// (see [`on_delivery_thread`]) are ignored.
pub struct LogtailLayer {
    batcher: BatcherHandle,
    min_level: Level,
}

impl LogtailLayer {
    pub fn new(batcher: BatcherHandle, min_level: Level) -> Self {
        Self { batcher, min_level }
    }

    pub fn batcher(&self) -> &BatcherHandle {
        &self.batcher
    }
}

/// Span fields, stored in the span's extensions.
struct SpanFields(BTreeMap<String, PropertyValue>);

impl<S> Layer<S> for LogtailLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.into_span_fields()));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => fields.0.extend(visitor.into_span_fields()),
            None => extensions.insert(SpanFields(visitor.into_span_fields())),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        // The HTTP stack logs while delivering; feeding that back would
        // make every post produce more posts.
        if on_delivery_thread() {
            return;
        }
        let level = Level::from(*meta.level());
        if level < self.min_level {
            return;
        }

        let mut properties = BTreeMap::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    properties.extend(fields.0.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        properties.append(&mut visitor.properties);
        properties
            .entry(DEFAULT_MESSAGE_ID_PROPERTY.to_string())
            .or_insert_with(|| PropertyValue::String(meta.target().to_string()));

        let record = LogEvent {
            timestamp: Utc::now().into(),
            level,
            message: visitor.message.unwrap_or_default(),
            exception: visitor.exception,
            properties,
        };

        // Drops are counted by the batcher; nothing else to do here.
        let _ = self.batcher.try_enqueue(record);
    }
}

#[derive(Default)]
struct FieldVisitor {
    properties: BTreeMap<String, PropertyValue>,
    message: Option<String>,
    exception: Option<ExceptionDetail>,
}

impl FieldVisitor {
    fn into_span_fields(mut self) -> BTreeMap<String, PropertyValue> {
        if let Some(message) = self.message.take() {
            self.properties.insert("message".to_string(), PropertyValue::String(message));
        }
        self.properties
    }

    fn insert(&mut self, field: &Field, value: PropertyValue) {
        self.properties.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, PropertyValue::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, PropertyValue::I64(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, PropertyValue::U64(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, PropertyValue::F64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, PropertyValue::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        self.exception = Some(ExceptionDetail::from_error(value));
        self.insert(field, PropertyValue::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, PropertyValue::Rendered(format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchOptions, PeriodicBatcher};
    use crate::diagnostics::MemoryDiagnostics;
    use crate::test_utils::RecordingSink;
    use std::sync::Arc;
    use tracing::Dispatch;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    async fn capture(min_level: Level, emit: impl FnOnce()) -> Vec<LogEvent> {
        let sink = Arc::new(RecordingSink::default());
        let (batcher, task) = PeriodicBatcher::spawn(
            sink.clone(),
            BatchOptions::default(),
            Arc::new(MemoryDiagnostics::new()),
        );
        let layer = LogtailLayer::new(batcher.clone(), min_level);
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, emit);

        batcher.shutdown();
        task.await.unwrap();
        sink.events()
    }

    #[tokio::test]
    async fn converts_events_into_log_events() {
        let events = capture(Level::Verbose, || {
            tracing::warn!(target: "billing::invoices", user_id = 42u64, name = "Ann", "invoice {} late", 7);
        })
        .await;

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.level, Level::Warning);
        assert_eq!(event.message, "invoice 7 late");
        assert_eq!(event.properties["user_id"], PropertyValue::U64(42));
        assert_eq!(event.properties["name"], PropertyValue::String("Ann".into()));
        assert_eq!(
            event.properties["SourceContext"],
            PropertyValue::String("billing::invoices".into())
        );
    }

    #[tokio::test]
    async fn honours_minimum_level() {
        let events = capture(Level::Warning, || {
            tracing::info!("ignored");
            tracing::debug!("ignored too");
            tracing::error!("kept");
        })
        .await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "kept");
        assert_eq!(events[0].level, Level::Error);
    }

    #[tokio::test]
    async fn ignores_events_raised_on_delivery_threads() {
        let sink = Arc::new(RecordingSink::default());
        let (batcher, task) = PeriodicBatcher::spawn(
            sink.clone(),
            BatchOptions::default(),
            Arc::new(MemoryDiagnostics::new()),
        );
        let dispatch = Dispatch::new(Registry::default().with(LogtailLayer::new(batcher.clone(), Level::Verbose)));

        // A dedicated delivery runtime whose sink logs through the same dispatcher.
        let inner = Dispatch::clone(&dispatch);
        let logging_sink = Arc::new(move || {
            tracing::dispatcher::with_default(&inner, || tracing::debug!(target: "hyper::proto::h1::conn", "flushed"))
        });
        let (delivery_batcher, delivery) = PeriodicBatcher::spawn_dedicated(
            Arc::new(LoggingSink(logging_sink)),
            BatchOptions::default(),
            Arc::new(MemoryDiagnostics::new()),
        )
        .unwrap();
        delivery_batcher.try_enqueue(LogEvent::new(Level::Information, "shipped"));
        delivery_batcher.shutdown();
        delivery.join().await.unwrap();

        tracing::dispatcher::with_default(&dispatch, || tracing::warn!("external"));

        batcher.shutdown();
        task.await.unwrap();
        let messages: Vec<String> = sink.events().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["external"]);
    }

    /// Logs through a caller-provided closure on every emit.
    struct LoggingSink(Arc<dyn Fn() + Send + Sync>);

    #[async_trait::async_trait]
    impl crate::sink::BatchedLogSink for LoggingSink {
        async fn emit_batch(&self, _events: &[LogEvent]) -> Result<(), Box<dyn Error + Send + Sync>> {
            (self.0)();
            Ok(())
        }
    }

    #[tokio::test]
    async fn collects_span_fields_with_inner_values_winning() {
        let events = capture(Level::Verbose, || {
            let outer = tracing::info_span!("request", request_id = "r-1", tenant = "acme");
            let _outer = outer.enter();
            let inner = tracing::info_span!("step", tenant = "globex");
            let _inner = inner.enter();
            inner.record("tenant", "initech");
            tracing::info!(SourceContext = "custom", "done");
        })
        .await;

        let event = &events[0];
        assert_eq!(event.properties["request_id"], PropertyValue::String("r-1".into()));
        assert_eq!(event.properties["tenant"], PropertyValue::String("initech".into()));
        assert_eq!(event.properties["SourceContext"], PropertyValue::String("custom".into()));
    }

    #[tokio::test]
    async fn errors_become_exception_details() {
        let events = capture(Level::Verbose, || {
            let err = "x".parse::<u32>().unwrap_err();
            tracing::error!(error = &err as &(dyn Error + 'static), "parse failed");
        })
        .await;

        let exception = events[0].exception.as_ref().expect("exception");
        assert_eq!(exception.type_name, "ParseIntError");
        assert_eq!(exception.message, "invalid digit found in string");
    }
}
