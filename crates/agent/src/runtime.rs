use std::sync::Arc;

use guardchat_core::config::AppConfig;
use guardchat_core::{AgentId, AgentProfile, ConfigError, ServiceError, Session, TelemetrySink};
use thiserror::Error;
use tracing::info;

use crate::client::AgentSessionClient;
use crate::foundry::FoundryAgentsClient;
use crate::moderation::ModerationGate;
use crate::orchestrator::{OrchestratorSettings, TurnOrchestrator};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no agent selected: pass --agent <id|name> or add an [[agents]] entry")]
    NoAgentConfigured,
    #[error("failed to build {service} client: {source}")]
    Client { service: &'static str, source: ServiceError },
    #[error("agent `{agent_id}` could not be verified: {source}")]
    AgentLookup { agent_id: AgentId, source: ServiceError },
    #[error("conversation thread could not be created: {0}")]
    ThreadCreate(#[source] ServiceError),
}

/// Picks the agent for a session: an explicit selector matches a configured id
/// or name, otherwise it is taken as a remote id; no selector means the first
/// configured agent.
pub fn resolve_agent(
    agents: &[AgentProfile],
    selector: Option<&str>,
) -> Result<AgentId, BootstrapError> {
    let Some(selector) = selector.map(str::trim).filter(|value| !value.is_empty()) else {
        return agents
            .first()
            .map(|agent| agent.id.clone())
            .ok_or(BootstrapError::NoAgentConfigured);
    };

    let known = agents
        .iter()
        .find(|agent| agent.id.0 == selector || agent.name.eq_ignore_ascii_case(selector));
    Ok(known.map(|agent| agent.id.clone()).unwrap_or_else(|| AgentId(selector.to_string())))
}

/// Collaborators wired from configuration, shared by the chat and doctor commands.
#[derive(Clone)]
pub struct AgentRuntime {
    client: Arc<dyn AgentSessionClient>,
    gate: ModerationGate,
    telemetry: Arc<dyn TelemetrySink>,
    settings: OrchestratorSettings,
}

impl AgentRuntime {
    pub fn new(
        client: Arc<dyn AgentSessionClient>,
        gate: ModerationGate,
        telemetry: Arc<dyn TelemetrySink>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self { client, gate, telemetry, settings }
    }

    pub fn from_config(
        config: &AppConfig,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, BootstrapError> {
        let client = FoundryAgentsClient::new(&config.agent)
            .map_err(|source| BootstrapError::Client { service: "agent", source })?;
        let gate = ModerationGate::from_config(&config.moderation, telemetry.clone())
            .map_err(|source| BootstrapError::Client { service: "moderation", source })?;

        Ok(Self::new(
            Arc::new(client),
            gate,
            telemetry,
            OrchestratorSettings::from_config(&config.session),
        ))
    }

    pub fn client(&self) -> &Arc<dyn AgentSessionClient> {
        &self.client
    }

    pub fn moderation_enabled(&self) -> bool {
        self.gate.is_enabled()
    }

    pub fn telemetry(&self) -> Arc<dyn TelemetrySink> {
        self.telemetry.clone()
    }

    pub fn orchestrator(&self) -> TurnOrchestrator {
        TurnOrchestrator::new(
            self.client.clone(),
            self.gate.clone(),
            self.telemetry.clone(),
            self.settings.clone(),
        )
    }

    /// Verifies the agent remotely and opens a fresh thread. Any failure here
    /// prevents the session from starting.
    pub async fn start_session(&self, agent_id: &AgentId) -> Result<Session, BootstrapError> {
        let agent = self.client.get_agent(agent_id).await.map_err(|source| {
            BootstrapError::AgentLookup { agent_id: agent_id.clone(), source }
        })?;
        let thread = self.client.create_thread().await.map_err(BootstrapError::ThreadCreate)?;

        info!(
            event_name = "session.bootstrap.thread_created",
            agent_id = %agent.id,
            agent_name = %agent.name,
            thread_id = %thread.id,
            moderation_enabled = self.gate.is_enabled(),
            "conversation thread ready"
        );

        Ok(Session::new(agent, thread.id))
    }
}
