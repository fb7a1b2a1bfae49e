//! Domain model for a moderated conversation with a remotely hosted agent:
//! configuration, identifiers, moderation verdicts, sessions and turns, the
//! turn state machine, and the telemetry sink contract.

pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod telemetry;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::agent::{
    AgentId, AgentInfo, AgentKind, AgentProfile, ListOrder, MessageContent, MessageHandle,
    MessageId, MessageRole, RunHandle, RunId, RunStatus, ThreadHandle, ThreadId, ThreadMessage,
};
pub use domain::moderation::{CategorySeverity, ModerationVerdict, VerdictMode};
pub use domain::session::Session;
pub use domain::turn::{Turn, TurnOutcome};
pub use errors::{ServiceError, TurnError};
pub use flows::{TurnEvent, TurnFlow, TurnState, TurnTransition, TurnTransitionError};
pub use telemetry::{
    InMemoryTelemetrySink, NoopTelemetrySink, TelemetryContext, TelemetryRecord, TelemetryScope,
    TelemetrySink,
};
