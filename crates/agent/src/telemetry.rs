use guardchat_core::{TelemetryRecord, TelemetrySink};
use tracing::info;

/// Forwards each telemetry record to the active `tracing` subscriber.
#[derive(Clone, Debug, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn emit(&self, record: TelemetryRecord) {
        let attributes = serde_json::to_string(&record.attributes).unwrap_or_default();
        info!(
            target: "guardchat::telemetry",
            event_name = %record.name,
            record_id = %record.record_id,
            scope = record.scope.as_str(),
            agent_id = record.agent_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
            thread_id = record.thread_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
            turn = record.turn.unwrap_or_default(),
            attributes = %attributes,
            "telemetry"
        );
    }
}
