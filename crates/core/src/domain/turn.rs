use serde::{Deserialize, Serialize};

use crate::domain::agent::{RunId, RunStatus};
use crate::domain::moderation::{ModerationVerdict, VerdictMode};

pub const OUTPUT_REFUSAL_MESSAGE: &str =
    "I apologize, but I can't provide that response due to the content policy.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Delivered,
    BlockedInput,
    BlockedOutput,
    Empty,
    Failed,
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::BlockedInput => "blocked_input",
            Self::BlockedOutput => "blocked_output",
            Self::Empty => "empty",
            Self::Failed => "failed",
        }
    }
}

/// A single user-input/agent-response exchange. Discarded once reported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub index: u64,
    pub raw_input: String,
    pub input_verdict: Option<ModerationVerdict>,
    pub run_id: Option<RunId>,
    pub run_status: Option<RunStatus>,
    pub raw_output: Option<String>,
    pub output_verdict: Option<ModerationVerdict>,
    pub outcome: Option<TurnOutcome>,
    pub failure: Option<String>,
}

impl Turn {
    pub fn new(index: u64, raw_input: impl Into<String>) -> Self {
        Self {
            index,
            raw_input: raw_input.into(),
            input_verdict: None,
            run_id: None,
            run_status: None,
            raw_output: None,
            output_verdict: None,
            outcome: None,
            failure: None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.raw_input.trim().is_empty()
    }

    /// The single message shown to the user for this turn, if any.
    pub fn user_message(&self) -> Option<String> {
        match self.outcome? {
            TurnOutcome::Empty => None,
            TurnOutcome::Delivered => self.raw_output.clone(),
            TurnOutcome::BlockedInput => {
                let Some(verdict) = &self.input_verdict else {
                    return Some("I can't respond to that message.".to_string());
                };
                let mut lines =
                    vec![format!("I can't respond to that message: {}.", verdict.reason)];
                lines.extend(verdict.breakdown_lines().into_iter().map(|line| format!("  {line}")));
                Some(lines.join("\n"))
            }
            TurnOutcome::BlockedOutput => Some(OUTPUT_REFUSAL_MESSAGE.to_string()),
            TurnOutcome::Failed => Some(format!(
                "This turn could not be completed ({}). You can keep chatting.",
                self.failure.as_deref().unwrap_or("unknown error")
            )),
        }
    }

    /// Category breakdown of an input that passed moderation. A blocked input
    /// already carries its breakdown in `user_message`.
    pub fn input_analysis(&self) -> Option<String> {
        if self.outcome == Some(TurnOutcome::BlockedInput) {
            return None;
        }
        analysis_block("your message", self.input_verdict.as_ref()?)
    }

    /// Category breakdown of a reply that was delivered.
    pub fn output_analysis(&self) -> Option<String> {
        if self.outcome != Some(TurnOutcome::Delivered) {
            return None;
        }
        analysis_block("the reply", self.output_verdict.as_ref()?)
    }
}

fn analysis_block(subject: &str, verdict: &ModerationVerdict) -> Option<String> {
    if verdict.mode != VerdictMode::Evaluated {
        return None;
    }
    let mut lines = vec![format!("Content safety analysis of {subject}: {}.", verdict.reason)];
    lines.extend(verdict.breakdown_lines().into_iter().map(|line| format!("  {line}")));
    Some(lines.join("\n"))
}
