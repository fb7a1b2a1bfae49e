use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::{AgentId, ThreadId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryScope {
    Session,
    Turn,
    Moderation,
    Run,
    Response,
}

impl TelemetryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Turn => "turn",
            Self::Moderation => "moderation",
            Self::Run => "run",
            Self::Response => "response",
        }
    }
}

/// Identifiers attached to every record emitted during a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryContext {
    pub agent_id: Option<AgentId>,
    pub thread_id: Option<ThreadId>,
    pub turn: Option<u64>,
}

impl TelemetryContext {
    pub fn new(agent_id: AgentId, thread_id: ThreadId) -> Self {
        Self { agent_id: Some(agent_id), thread_id: Some(thread_id), turn: None }
    }

    pub fn for_turn(&self, turn: u64) -> Self {
        Self { turn: Some(turn), ..self.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub record_id: String,
    pub scope: TelemetryScope,
    pub name: String,
    pub agent_id: Option<AgentId>,
    pub thread_id: Option<ThreadId>,
    pub turn: Option<u64>,
    pub attributes: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl TelemetryRecord {
    pub fn new(scope: TelemetryScope, name: impl Into<String>, context: &TelemetryContext) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            scope,
            name: name.into(),
            agent_id: context.agent_id.clone(),
            thread_id: context.thread_id.clone(),
            turn: context.turn,
            attributes: BTreeMap::new(),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.insert(key.into(), value.to_string());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Write-only instrumentation side channel. Nothing reads records back to make decisions.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, record: TelemetryRecord);
}

#[derive(Clone, Default)]
pub struct NoopTelemetrySink;

impl TelemetrySink for NoopTelemetrySink {
    fn emit(&self, _record: TelemetryRecord) {}
}

#[derive(Clone, Default)]
pub struct InMemoryTelemetrySink {
    records: Arc<Mutex<Vec<TelemetryRecord>>>,
}

impl InMemoryTelemetrySink {
    pub fn records(&self) -> Vec<TelemetryRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn named(&self, name: &str) -> Vec<TelemetryRecord> {
        self.records().into_iter().filter(|record| record.name == name).collect()
    }
}

impl TelemetrySink for InMemoryTelemetrySink {
    fn emit(&self, record: TelemetryRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::agent::{AgentId, ThreadId};
    use crate::telemetry::{
        InMemoryTelemetrySink, TelemetryContext, TelemetryRecord, TelemetryScope, TelemetrySink,
    };

    #[test]
    fn in_memory_sink_records_attributes_with_session_ids() {
        let sink = InMemoryTelemetrySink::default();
        let context = TelemetryContext::new(
            AgentId("asst_1".to_owned()),
            ThreadId("thread_1".to_owned()),
        )
        .for_turn(4);

        sink.emit(
            TelemetryRecord::new(TelemetryScope::Run, "run.completed", &context)
                .with_attribute("run.id", "run_9")
                .with_attribute("run.polls", 2),
        );

        let records = sink.named("run.completed");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].turn, Some(4));
        assert_eq!(records[0].thread_id.as_ref().map(|id| id.0.as_str()), Some("thread_1"));
        assert_eq!(records[0].attribute("run.polls"), Some("2"));
        assert_eq!(records[0].scope.as_str(), "run");
    }
}
