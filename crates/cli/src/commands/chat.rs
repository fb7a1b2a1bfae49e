use std::path::PathBuf;
use std::sync::Arc;

use guardchat_agent::{
    resolve_agent, AgentRuntime, BootstrapError, SessionLoop, SessionSummary,
    TracingTelemetrySink, EXIT_PHRASES,
};
use guardchat_core::config::{AppConfig, ConfigOverrides};
use guardchat_core::{Session, TelemetrySink};
use tracing::{info, warn};

use crate::commands::{load_config, CommandResult};
use crate::console::StdioConsole;
use crate::logging;

const INTERRUPTED_EXIT_CODE: u8 = 130;

#[derive(Clone, Debug, Default)]
pub struct ChatOptions {
    pub config_path: Option<PathBuf>,
    pub agent: Option<String>,
    pub customer_id: Option<String>,
    pub run_deadline_secs: Option<u64>,
    pub show_safety_analysis: bool,
}

enum ChatEnd {
    Finished,
    /// Interrupt arrived while a turn was in flight.
    Interrupted(Session),
}

pub fn run(options: ChatOptions) -> CommandResult {
    let overrides = ConfigOverrides {
        customer_id: options.customer_id.clone(),
        run_deadline_secs: options.run_deadline_secs,
        show_safety_analysis: options.show_safety_analysis.then_some(true),
        ..ConfigOverrides::default()
    };
    let config = match load_config(options.config_path.as_deref(), overrides) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("chat", &error),
    };
    logging::init(&config.logging);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            );
        }
    };

    let outcome = runtime.block_on(chat(&config, options.agent.as_deref()));
    // stdin reads run on a blocking thread that would otherwise hold shutdown open.
    runtime.shutdown_background();

    match outcome {
        Ok(ChatEnd::Finished) => CommandResult::quiet(),
        Ok(ChatEnd::Interrupted(session)) => CommandResult::failure(
            "chat",
            "interrupted",
            format!(
                "interrupted during turn {}; the remote run was not cancelled (thread `{}`)",
                session.turn_counter(),
                session.thread_id()
            ),
            INTERRUPTED_EXIT_CODE,
        ),
        Err(error) => CommandResult::failure("chat", error_class(&error), error.to_string(), 1),
    }
}

async fn chat(config: &AppConfig, selector: Option<&str>) -> Result<ChatEnd, BootstrapError> {
    let telemetry: Arc<dyn TelemetrySink> = Arc::new(TracingTelemetrySink);
    let runtime = AgentRuntime::from_config(config, telemetry.clone())?;
    let agent_id = resolve_agent(&config.agents, selector)?;
    let mut session = runtime.start_session(&agent_id).await?;

    println!("{}", banner(&session, runtime.moderation_enabled()));

    let mut session_loop =
        SessionLoop::new(runtime.orchestrator(), StdioConsole::new(), telemetry)
            .with_safety_analysis(config.session.show_safety_analysis);
    let summary = tokio::select! {
        biased;
        summary = session_loop.run(&mut session) => Some(summary),
        _ = tokio::signal::ctrl_c() => None,
    };

    match summary {
        Some(summary) => {
            log_summary(&summary);
            Ok(ChatEnd::Finished)
        }
        None => {
            warn!(
                event_name = "session.interrupted",
                thread_id = %session.thread_id(),
                turn = session.turn_counter(),
                "interrupted while a turn was in progress"
            );
            Ok(ChatEnd::Interrupted(session))
        }
    }
}

fn log_summary(summary: &SessionSummary) {
    info!(
        event_name = "session.summary",
        total_turns = summary.total_turns,
        exit = summary.exit.as_str(),
        outcomes = ?summary.outcomes,
        "chat session summary"
    );
}

fn banner(session: &Session, moderation_enabled: bool) -> String {
    let moderation = if moderation_enabled {
        "on"
    } else {
        "off (no content-safety endpoint configured)"
    };
    format!(
        "Chatting with {} ({}) on thread {}. Moderation: {moderation}.\nType {} to leave.",
        session.agent().name,
        session.agent_id(),
        session.thread_id(),
        EXIT_PHRASES.join(", ")
    )
}

fn error_class(error: &BootstrapError) -> &'static str {
    match error {
        BootstrapError::Config(_) => "config_validation",
        BootstrapError::NoAgentConfigured => "agent_selection",
        BootstrapError::Client { .. } => "client_setup",
        BootstrapError::AgentLookup { .. } => "agent_lookup",
        BootstrapError::ThreadCreate(_) => "thread_create",
    }
}
