use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

/// Closed set of agent configurations an agent can be created with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    #[default]
    Basic,
    #[serde(alias = "tools", alias = "mcp")]
    ToolAugmented,
    #[serde(alias = "functions")]
    FunctionAugmented,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::ToolAugmented => "tool_augmented",
            Self::FunctionAugmented => "function_augmented",
        }
    }
}

/// Locally known agent, as listed in configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub name: String,
    #[serde(default)]
    pub kind: AgentKind,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Agent metadata as reported by the remote service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: AgentId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadHandle {
    pub id: ThreadId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl RunStatus {
    /// Statuses the orchestrator keeps polling through.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::InProgress | Self::RequiresAction)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub id: RunId,
    pub thread_id: ThreadId,
    pub status: RunStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    pub id: MessageId,
    pub thread_id: ThreadId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageContent {
    Text(String),
    /// Non-text parts (images, files) the orchestrator never displays.
    Other { kind: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|part| match part {
            MessageContent::Text(text) => Some(text.as_str()),
            MessageContent::Other { .. } => None,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    Ascending,
    #[default]
    Descending,
}

impl ListOrder {
    pub fn as_query(&self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// Text of the newest assistant message, given messages in descending order.
///
/// Only the newest assistant message is inspected: if it has no text part the
/// reply is treated as missing rather than falling back to an older answer.
pub fn latest_assistant_text(messages_newest_first: &[ThreadMessage]) -> Option<&str> {
    messages_newest_first
        .iter()
        .find(|message| message.role == MessageRole::Assistant)
        .and_then(ThreadMessage::first_text)
}

#[cfg(test)]
mod tests {
    use super::{
        latest_assistant_text, AgentKind, AgentProfile, MessageContent, MessageId, MessageRole,
        RunStatus, ThreadMessage,
    };

    fn message(id: &str, role: MessageRole, content: Vec<MessageContent>) -> ThreadMessage {
        ThreadMessage { id: MessageId(id.to_string()), role, content }
    }

    #[test]
    fn active_statuses_keep_polling() {
        assert!(RunStatus::Queued.is_active());
        assert!(RunStatus::InProgress.is_active());
        assert!(RunStatus::RequiresAction.is_active());
        assert!(!RunStatus::Cancelling.is_active());
        assert!(!RunStatus::Completed.is_active());
        assert!(!RunStatus::Failed.is_active());
        assert!(!RunStatus::Cancelled.is_active());
        assert!(!RunStatus::Expired.is_active());
    }

    #[test]
    fn run_status_parses_wire_names() {
        let status: RunStatus = serde_json::from_str("\"requires_action\"").expect("parse");
        assert_eq!(status, RunStatus::RequiresAction);
        assert_eq!(RunStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn newest_assistant_text_wins() {
        let messages = vec![
            message(
                "m3",
                MessageRole::Assistant,
                vec![
                    MessageContent::Other { kind: "image_file".to_string() },
                    MessageContent::Text("hi there".to_string()),
                ],
            ),
            message("m2", MessageRole::User, vec![MessageContent::Text("hello".to_string())]),
            message("m1", MessageRole::Assistant, vec![MessageContent::Text("older".to_string())]),
        ];

        assert_eq!(latest_assistant_text(&messages), Some("hi there"));
    }

    #[test]
    fn newest_assistant_without_text_is_missing() {
        let messages = vec![
            message(
                "m3",
                MessageRole::Assistant,
                vec![MessageContent::Other { kind: "image_file".to_string() }],
            ),
            message("m1", MessageRole::Assistant, vec![MessageContent::Text("older".to_string())]),
        ];

        assert_eq!(latest_assistant_text(&messages), None);
        assert_eq!(
            latest_assistant_text(&[message(
                "m1",
                MessageRole::User,
                vec![MessageContent::Text("only user".to_string())]
            )]),
            None
        );
    }

    #[test]
    fn agent_kind_accepts_aliases() {
        let profile: AgentProfile =
            serde_json::from_str(r#"{"id":"asst_1","name":"Joker","kind":"tools"}"#)
                .expect("profile should parse");
        assert_eq!(profile.kind, AgentKind::ToolAugmented);
        assert_eq!(profile.id.0, "asst_1");
        assert_eq!(profile.created_at, None);
    }
}
