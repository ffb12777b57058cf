//! LogSink - writes each event through tracing

use async_trait::async_trait;
use contracts::{Context, Event, Sink, SinkError};
use tracing::{info, instrument};

/// Sink that logs events for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_event(&self, event: &Event) -> Result<(), SinkError> {
        let fields = serde_json::to_string(&FieldsView(event))
            .map_err(|e| SinkError::encode(&self.name, e.to_string()))?;
        let caller = event.caller().map(ToString::to_string);

        info!(
            sink = %self.name,
            signal = %event.signal(),
            caller = caller.as_deref(),
            fields = %fields,
            "{}",
            event.message()
        );
        Ok(())
    }
}

/// Field list as a JSON object, keyed the same way as the NDJSON output
struct FieldsView<'a>(&'a Event);

impl serde::Serialize for FieldsView<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        for field in self.0.distinct_fields() {
            map.serialize_entry(field.key(), &field.value().to_json())?;
        }
        map.end()
    }
}

#[async_trait]
impl Sink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_process",
        skip(self, _ctx, event),
        fields(sink = %self.name, signal = %event.signal())
    )]
    async fn process(&self, _ctx: &Context, event: Event) -> Result<Event, SinkError> {
        self.log_event(&event)?;
        Ok(event)
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&self) -> Result<(), SinkError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
