//! Moderated chat with a remotely hosted agent.
//!
//! - `client` / `foundry`: the agent-service capability and its HTTP backend
//! - `moderation`: the content-safety backend and the fail-open `ModerationGate`
//! - `orchestrator`: the per-turn state machine driver
//! - `session`: the input loop, exit phrases, and session summary
//! - `runtime`: agent resolution and session bootstrap from `AppConfig`
//!
//! Every reply shown to the user has passed output moderation, and every
//! message sent to the agent has passed input moderation.

pub mod client;
pub mod foundry;
pub mod moderation;
pub mod orchestrator;
pub mod runtime;
pub mod session;
pub mod telemetry;

pub use client::AgentSessionClient;
pub use foundry::FoundryAgentsClient;
pub use moderation::{ContentSafetyClient, ModerationBackend, ModerationGate, ModerationStage};
pub use orchestrator::{OrchestratorSettings, TurnOrchestrator};
pub use runtime::{resolve_agent, AgentRuntime, BootstrapError};
pub use session::{
    is_exit_phrase, Console, InputEvent, SessionExit, SessionLoop, SessionSummary, EXIT_PHRASES,
};
pub use telemetry::TracingTelemetrySink;
