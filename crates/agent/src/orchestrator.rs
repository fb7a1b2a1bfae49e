//! Drives one conversational turn from raw input to a terminal outcome.
//!
//! Every step goes through [`TurnFlow`], so the order input moderation,
//! submission, polling, retrieval, output moderation cannot be skipped or
//! reordered. Backend failures end the turn as `Failed`; they never end the
//! session.

use std::sync::Arc;
use std::time::Duration;

use guardchat_core::config::SessionConfig;
use guardchat_core::domain::agent::latest_assistant_text;
use guardchat_core::{
    ListOrder, MessageId, MessageRole, RunHandle, Session, TelemetryContext, TelemetryRecord,
    TelemetryScope, TelemetrySink, ThreadId, ThreadMessage, Turn, TurnError, TurnEvent, TurnFlow,
    TurnState,
};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::client::AgentSessionClient;
use crate::moderation::{ModerationGate, ModerationStage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub poll_interval: Duration,
    /// `None` polls until the run leaves the active statuses.
    pub run_deadline: Option<Duration>,
    pub customer_id: Option<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(1), run_deadline: None, customer_id: None }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            run_deadline: config.run_deadline_secs.map(Duration::from_secs),
            customer_id: config.customer_id.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TurnOrchestrator {
    client: Arc<dyn AgentSessionClient>,
    gate: ModerationGate,
    telemetry: Arc<dyn TelemetrySink>,
    settings: OrchestratorSettings,
    flow: TurnFlow,
}

impl TurnOrchestrator {
    pub fn new(
        client: Arc<dyn AgentSessionClient>,
        gate: ModerationGate,
        telemetry: Arc<dyn TelemetrySink>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self { client, gate, telemetry, settings, flow: TurnFlow }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Runs `turn` to a terminal state and returns it with `outcome` set.
    pub async fn run_turn(&self, session: &Session, mut turn: Turn) -> Turn {
        let context =
            TelemetryContext::new(session.agent_id().clone(), session.thread_id().clone())
                .for_turn(turn.index);
        let mut state = self.flow.initial_state();

        if let Err(error) = self.drive(session, &mut turn, &mut state, &context).await {
            warn!(
                event_name = "turn.failed",
                thread_id = %session.thread_id(),
                turn = turn.index,
                state = ?state,
                error = %error,
                "turn failed"
            );
            state = self.fail(state, &error);
            turn.failure = Some(error.user_message().to_string());
            self.telemetry.emit(
                TelemetryRecord::new(TelemetryScope::Turn, "turn.error", &context)
                    .with_attribute("turn.error", &error),
            );
        }

        turn.outcome = state.outcome();
        self.record_turn(&turn, &context);
        turn
    }

    async fn drive(
        &self,
        session: &Session,
        turn: &mut Turn,
        state: &mut TurnState,
        context: &TelemetryContext,
    ) -> Result<(), TurnError> {
        let thread_id = session.thread_id();

        if turn.is_blank() {
            return self.advance(state, TurnEvent::InputBlank);
        }
        self.advance(state, TurnEvent::InputPresent)?;

        let input_verdict =
            self.gate.evaluate(&turn.raw_input, ModerationStage::Input, context).await;
        let input_safe = input_verdict.is_safe;
        turn.input_verdict = Some(input_verdict);
        if !input_safe {
            info!(
                event_name = "turn.input_blocked",
                thread_id = %thread_id,
                turn = turn.index,
                "user input blocked by moderation"
            );
            return self.advance(state, TurnEvent::InputFlagged);
        }
        self.advance(state, TurnEvent::InputCleared)?;

        let content = self.submitted_content(&turn.raw_input);
        let posted = self.client.post_message(thread_id, MessageRole::User, &content).await?;
        let run = self.client.create_run(thread_id, session.agent_id()).await?;
        info!(
            event_name = "run.created",
            thread_id = %thread_id,
            run_id = %run.id,
            status = %run.status,
            turn = turn.index,
            "agent run created"
        );
        turn.run_id = Some(run.id.clone());
        turn.run_status = Some(run.status);
        self.advance(state, TurnEvent::RunCreated)?;

        let run = self.poll_run(thread_id, run, turn, state, context).await?;
        self.advance(state, TurnEvent::RunFinished)?;

        let messages = self.client.list_messages(thread_id, ListOrder::Descending).await?;
        let replies = newer_than(&messages, &posted.id);
        let Some(text) = latest_assistant_text(replies) else {
            return Err(TurnError::MissingResponse {
                run_id: run.id.0.clone(),
                status: run.status.to_string(),
            });
        };
        turn.raw_output = Some(text.to_string());
        self.telemetry.emit(
            TelemetryRecord::new(TelemetryScope::Response, "response.received", context)
                .with_attribute("agent.response_length", text.chars().count()),
        );
        self.advance(state, TurnEvent::ResponseFound)?;

        let output_verdict = self.gate.evaluate(text, ModerationStage::Output, context).await;
        let output_safe = output_verdict.is_safe;
        turn.output_verdict = Some(output_verdict);
        if !output_safe {
            info!(
                event_name = "turn.output_blocked",
                thread_id = %thread_id,
                run_id = %run.id,
                turn = turn.index,
                "agent response blocked by moderation"
            );
            return self.advance(state, TurnEvent::OutputFlagged);
        }
        self.advance(state, TurnEvent::OutputCleared)
    }

    async fn poll_run(
        &self,
        thread_id: &ThreadId,
        mut run: RunHandle,
        turn: &mut Turn,
        state: &mut TurnState,
        context: &TelemetryContext,
    ) -> Result<RunHandle, TurnError> {
        let started = Instant::now();
        let mut polls = 0_u32;

        while run.status.is_active() {
            if let Some(deadline) = self.settings.run_deadline {
                if started.elapsed() >= deadline {
                    self.cancel_run(thread_id, &run, turn).await;
                    return Err(TurnError::DeadlineExceeded {
                        run_id: run.id.0.clone(),
                        status: run.status.to_string(),
                        deadline_secs: deadline.as_secs(),
                    });
                }
            }

            tokio::time::sleep(self.settings.poll_interval).await;
            run = self.client.get_run(thread_id, &run.id).await?;
            polls += 1;
            turn.run_status = Some(run.status);
            debug!(
                event_name = "run.polled",
                thread_id = %thread_id,
                run_id = %run.id,
                status = %run.status,
                polls,
                "agent run polled"
            );

            if run.status.is_active() {
                self.advance(state, TurnEvent::RunStillActive)?;
            }
        }

        let duration = started.elapsed().as_secs_f64();
        info!(
            event_name = "run.finished",
            thread_id = %thread_id,
            run_id = %run.id,
            status = %run.status,
            polls,
            duration_seconds = duration,
            "agent run reached a terminal status"
        );
        self.telemetry.emit(
            TelemetryRecord::new(TelemetryScope::Run, "run.finished", context)
                .with_attribute("run.id", &run.id)
                .with_attribute("run.status", run.status)
                .with_attribute("run.polls", polls)
                .with_attribute("run.duration_seconds", format!("{duration:.3}")),
        );
        Ok(run)
    }

    async fn cancel_run(&self, thread_id: &ThreadId, run: &RunHandle, turn: &mut Turn) {
        match self.client.cancel_run(thread_id, &run.id).await {
            Ok(cancelled) => {
                info!(
                    event_name = "run.cancelled",
                    thread_id = %thread_id,
                    run_id = %run.id,
                    status = %cancelled.status,
                    "agent run cancelled after deadline"
                );
                turn.run_status = Some(cancelled.status);
            }
            Err(error) => {
                warn!(
                    event_name = "run.cancel_failed",
                    thread_id = %thread_id,
                    run_id = %run.id,
                    error = %error,
                    "could not cancel agent run"
                );
            }
        }
    }

    fn advance(&self, state: &mut TurnState, event: TurnEvent) -> Result<(), TurnError> {
        let transition = self.flow.apply(*state, event)?;
        trace!(
            from = ?transition.from,
            to = ?transition.to,
            event = ?transition.event,
            "turn transition"
        );
        *state = transition.to;
        Ok(())
    }

    fn fail(&self, state: TurnState, error: &TurnError) -> TurnState {
        let event = match error {
            TurnError::DeadlineExceeded { .. } => TurnEvent::DeadlineExceeded,
            TurnError::MissingResponse { .. } => TurnEvent::ResponseMissing,
            TurnError::Service(_) | TurnError::Transition(_) => TurnEvent::BackendFailed,
        };
        self.flow.apply(state, event).map(|transition| transition.to).unwrap_or(TurnState::Failed)
    }

    fn submitted_content(&self, raw_input: &str) -> String {
        match &self.settings.customer_id {
            Some(customer_id) => format!("[CONTEXT: customer_id={customer_id}] {raw_input}"),
            None => raw_input.to_string(),
        }
    }

    fn record_turn(&self, turn: &Turn, context: &TelemetryContext) {
        let mut record = TelemetryRecord::new(TelemetryScope::Turn, "turn.completed", context)
            .with_attribute("conversation.turn", turn.index)
            .with_attribute("user.input_length", turn.raw_input.chars().count())
            .with_attribute("user.input_empty", turn.is_blank())
            .with_attribute("moderation.enabled", self.gate.is_enabled());

        if let Some(outcome) = turn.outcome {
            record = record.with_attribute("turn.outcome", outcome.as_str());
        }
        if let Some(run_id) = &turn.run_id {
            record = record.with_attribute("run.id", run_id);
        }
        if let Some(status) = turn.run_status {
            record = record.with_attribute("run.status", status);
        }
        if let Some(output) = &turn.raw_output {
            record = record.with_attribute("agent.response_length", output.chars().count());
        }
        let blocking_verdict = turn
            .input_verdict
            .iter()
            .chain(turn.output_verdict.iter())
            .find(|verdict| !verdict.is_safe);
        if let Some(verdict) = blocking_verdict {
            record = record.with_attribute("block_reason", &verdict.reason);
        }

        self.telemetry.emit(record);
    }
}

/// Messages posted after `posted`, given a newest-first listing. A reply left
/// over from an earlier turn is never treated as this turn's answer.
fn newer_than<'a>(messages: &'a [ThreadMessage], posted: &MessageId) -> &'a [ThreadMessage] {
    match messages.iter().position(|message| &message.id == posted) {
        Some(index) => &messages[..index],
        None => messages,
    }
}
