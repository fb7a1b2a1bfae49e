//! HTTP client for the hosted agents REST API (threads, messages, runs).

use std::time::Duration;

use async_trait::async_trait;
use guardchat_core::config::AgentServiceConfig;
use guardchat_core::{
    AgentId, AgentInfo, ListOrder, MessageContent, MessageHandle, MessageId, MessageRole,
    RunHandle, RunId, RunStatus, ServiceError, ThreadHandle, ThreadId, ThreadMessage,
};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::AgentSessionClient;

const SERVICE: &str = "agent";

#[derive(Clone)]
pub struct FoundryAgentsClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    api_version: String,
}

impl FoundryAgentsClient {
    pub fn new(config: &AgentServiceConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(transport)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    async fn send<T>(&self, request: RequestBuilder) -> Result<T, ServiceError>
    where
        T: DeserializeOwned,
    {
        let response = request
            .bearer_auth(self.api_key.expose_secret())
            .query(&[("api-version", self.api_version.as_str())])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status { service: SERVICE, status: status.as_u16(), body });
        }

        response.json::<T>().await.map_err(|error| ServiceError::Decode {
            service: SERVICE,
            message: error.to_string(),
        })
    }
}

fn transport(error: reqwest::Error) -> ServiceError {
    ServiceError::Transport { service: SERVICE, message: error.to_string() }
}

#[async_trait]
impl AgentSessionClient for FoundryAgentsClient {
    async fn get_agent(&self, agent_id: &AgentId) -> Result<AgentInfo, ServiceError> {
        let agent: AgentDto =
            self.send(self.client.get(self.url(&format!("assistants/{agent_id}")))).await?;
        let name = agent.name.unwrap_or_else(|| agent.id.clone());
        Ok(AgentInfo { id: AgentId(agent.id), name })
    }

    async fn create_thread(&self) -> Result<ThreadHandle, ServiceError> {
        let thread: IdDto = self
            .send(self.client.post(self.url("threads")).json(&serde_json::json!({})))
            .await?;
        debug!(thread_id = %thread.id, "agent thread created");
        Ok(ThreadHandle { id: ThreadId(thread.id) })
    }

    async fn post_message(
        &self,
        thread_id: &ThreadId,
        role: MessageRole,
        content: &str,
    ) -> Result<MessageHandle, ServiceError> {
        let body = CreateMessageBody { role: role.as_str(), content };
        let message: IdDto = self
            .send(
                self.client.post(self.url(&format!("threads/{thread_id}/messages"))).json(&body),
            )
            .await?;
        Ok(MessageHandle { id: MessageId(message.id), thread_id: thread_id.clone() })
    }

    async fn create_run(
        &self,
        thread_id: &ThreadId,
        agent_id: &AgentId,
    ) -> Result<RunHandle, ServiceError> {
        let body = CreateRunBody { assistant_id: &agent_id.0 };
        let run: RunDto = self
            .send(self.client.post(self.url(&format!("threads/{thread_id}/runs"))).json(&body))
            .await?;
        Ok(run.into_handle(thread_id))
    }

    async fn get_run(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
    ) -> Result<RunHandle, ServiceError> {
        let run: RunDto = self
            .send(self.client.get(self.url(&format!("threads/{thread_id}/runs/{run_id}"))))
            .await?;
        Ok(run.into_handle(thread_id))
    }

    async fn cancel_run(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
    ) -> Result<RunHandle, ServiceError> {
        let run: RunDto = self
            .send(self.client.post(self.url(&format!("threads/{thread_id}/runs/{run_id}/cancel"))))
            .await?;
        Ok(run.into_handle(thread_id))
    }

    async fn list_messages(
        &self,
        thread_id: &ThreadId,
        order: ListOrder,
    ) -> Result<Vec<ThreadMessage>, ServiceError> {
        let page: ListDto<MessageDto> = self
            .send(
                self.client
                    .get(self.url(&format!("threads/{thread_id}/messages")))
                    .query(&[("order", order.as_query())]),
            )
            .await?;
        Ok(page.data.into_iter().map(MessageDto::into_message).collect())
    }
}

#[derive(Debug, Serialize)]
struct CreateMessageBody<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunBody<'a> {
    assistant_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct IdDto {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AgentDto {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunDto {
    id: String,
    status: RunStatus,
}

impl RunDto {
    fn into_handle(self, thread_id: &ThreadId) -> RunHandle {
        RunHandle { id: RunId(self.id), thread_id: thread_id.clone(), status: self.status }
    }
}

#[derive(Debug, Deserialize)]
struct ListDto<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct MessageDto {
    id: String,
    role: MessageRole,
    #[serde(default)]
    content: Vec<ContentDto>,
}

impl MessageDto {
    fn into_message(self) -> ThreadMessage {
        ThreadMessage {
            id: MessageId(self.id),
            role: self.role,
            content: self.content.into_iter().map(ContentDto::into_content).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentDto {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<TextDto>,
}

#[derive(Debug, Deserialize)]
struct TextDto {
    value: String,
}

impl ContentDto {
    fn into_content(self) -> MessageContent {
        match (self.kind.as_str(), self.text) {
            ("text", Some(text)) => MessageContent::Text(text.value),
            _ => MessageContent::Other { kind: self.kind },
        }
    }
}

#[cfg(test)]
mod tests {
    use guardchat_core::{MessageContent, MessageRole};

    use super::{ListDto, MessageDto};

    #[test]
    fn message_page_keeps_text_and_marks_other_parts() {
        let page: ListDto<MessageDto> = serde_json::from_str(
            r#"{
                "object": "list",
                "data": [{
                    "id": "msg_2",
                    "role": "assistant",
                    "content": [
                        {"type": "image_file", "image_file": {"file_id": "f1"}},
                        {"type": "text", "text": {"value": "hi there", "annotations": []}}
                    ]
                }],
                "has_more": false
            }"#,
        )
        .expect("page should decode");

        let message = page.data.into_iter().next().expect("one message").into_message();
        assert_eq!(message.role, MessageRole::Assistant);
        assert_eq!(message.content[0], MessageContent::Other { kind: "image_file".to_string() });
        assert_eq!(message.first_text(), Some("hi there"));
    }
}
