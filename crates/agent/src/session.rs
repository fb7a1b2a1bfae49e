use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use guardchat_core::{
    Session, TelemetryContext, TelemetryRecord, TelemetryScope, TelemetrySink, Turn, TurnOutcome,
};
use tracing::info;

use crate::orchestrator::TurnOrchestrator;

/// Phrases that end the session, compared after trimming and lowercasing.
pub const EXIT_PHRASES: [&str; 5] = ["quit", "exit", "bye", "salir", "adiós"];

pub const PROMPT: &str = "You: ";
pub const UNREADABLE_INPUT_NOTICE: &str =
    "That input could not be read as text and was ignored. Please type it again.";

/// One attempt to read a line from the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    /// Input stream closed.
    Eof,
    /// Interrupt received while waiting for input.
    Interrupted,
    /// The line was not valid UTF-8.
    Unreadable,
}

/// Line-based user interface the session loop talks to.
#[async_trait]
pub trait Console: Send {
    async fn read_line(&mut self, prompt: &str) -> InputEvent;

    fn show(&mut self, message: &str);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionExit {
    ExitPhrase,
    EndOfInput,
    Interrupted,
}

impl SessionExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExitPhrase => "exit_phrase",
            Self::EndOfInput => "end_of_input",
            Self::Interrupted => "interrupted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub total_turns: u64,
    pub outcomes: BTreeMap<&'static str, u64>,
    pub exit: SessionExit,
}

pub fn is_exit_phrase(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    EXIT_PHRASES.contains(&normalized.as_str())
}

/// Reads input, runs one turn per line, and prints each turn's single message.
pub struct SessionLoop<C> {
    orchestrator: TurnOrchestrator,
    console: C,
    telemetry: Arc<dyn TelemetrySink>,
    show_safety_analysis: bool,
}

impl<C: Console> SessionLoop<C> {
    pub fn new(
        orchestrator: TurnOrchestrator,
        console: C,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self { orchestrator, console, telemetry, show_safety_analysis: false }
    }

    /// Also show the category breakdown of cleared input and delivered replies.
    pub fn with_safety_analysis(mut self, enabled: bool) -> Self {
        self.show_safety_analysis = enabled;
        self
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn into_console(self) -> C {
        self.console
    }

    pub async fn run(&mut self, session: &mut Session) -> SessionSummary {
        let context =
            TelemetryContext::new(session.agent_id().clone(), session.thread_id().clone());
        self.telemetry.emit(
            TelemetryRecord::new(TelemetryScope::Session, "session.started", &context)
                .with_attribute("agent.id", session.agent_id())
                .with_attribute("agent.name", &session.agent().name)
                .with_attribute("thread.id", session.thread_id()),
        );
        info!(
            event_name = "session.started",
            agent_id = %session.agent_id(),
            thread_id = %session.thread_id(),
            "chat session started"
        );

        let mut outcomes = BTreeMap::new();
        let exit = loop {
            let index = session.next_iteration();
            let raw_input = match self.console.read_line(PROMPT).await {
                InputEvent::Line(line) => line,
                InputEvent::Unreadable => {
                    self.console.show(UNREADABLE_INPUT_NOTICE);
                    String::new()
                }
                InputEvent::Eof => break SessionExit::EndOfInput,
                InputEvent::Interrupted => break SessionExit::Interrupted,
            };
            if is_exit_phrase(&raw_input) {
                break SessionExit::ExitPhrase;
            }

            let turn = self.orchestrator.run_turn(session, Turn::new(index, raw_input)).await;
            if let Some(outcome) = turn.outcome {
                *outcomes.entry(outcome.as_str()).or_insert(0) += 1;
            }
            let analysis = self.show_safety_analysis;
            if let Some(breakdown) = turn.input_analysis().filter(|_| analysis) {
                self.console.show(&format!("Guardchat: {breakdown}"));
            }
            if let Some(message) = turn.user_message() {
                let speaker = match turn.outcome {
                    Some(TurnOutcome::Delivered) => session.agent().name.as_str(),
                    _ => "Guardchat",
                };
                self.console.show(&format!("{speaker}: {message}"));
            }
            if let Some(breakdown) = turn.output_analysis().filter(|_| analysis) {
                self.console.show(&format!("Guardchat: {breakdown}"));
            }
        };

        self.console.show(&farewell(session));
        info!(
            event_name = "session.ended",
            thread_id = %session.thread_id(),
            total_turns = session.turn_counter(),
            exit = exit.as_str(),
            "chat session ended"
        );
        self.telemetry.emit(
            TelemetryRecord::new(TelemetryScope::Session, "session.ended", &context)
                .with_attribute("conversation.total_turns", session.turn_counter())
                .with_attribute("conversation.ended", true)
                .with_attribute("conversation.exit", exit.as_str()),
        );

        SessionSummary { total_turns: session.turn_counter(), outcomes, exit }
    }
}

pub fn farewell(session: &Session) -> String {
    format!(
        "Goodbye! {} turn(s) this session. Agent `{}` and thread `{}` are kept for next time.",
        session.turn_counter(),
        session.agent_id(),
        session.thread_id()
    )
}
