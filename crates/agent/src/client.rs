use async_trait::async_trait;
use guardchat_core::{
    AgentId, AgentInfo, ListOrder, MessageHandle, MessageRole, RunHandle, RunId, ServiceError,
    ThreadHandle, ThreadId, ThreadMessage,
};

/// Capability surface of the hosted agent service.
///
/// Any backend exposing these operations is interchangeable; the orchestrator
/// treats every error as fatal for the current turn only.
#[async_trait]
pub trait AgentSessionClient: Send + Sync {
    async fn get_agent(&self, agent_id: &AgentId) -> Result<AgentInfo, ServiceError>;

    async fn create_thread(&self) -> Result<ThreadHandle, ServiceError>;

    async fn post_message(
        &self,
        thread_id: &ThreadId,
        role: MessageRole,
        content: &str,
    ) -> Result<MessageHandle, ServiceError>;

    async fn create_run(
        &self,
        thread_id: &ThreadId,
        agent_id: &AgentId,
    ) -> Result<RunHandle, ServiceError>;

    /// Status refresh only; no side effects on the run.
    async fn get_run(&self, thread_id: &ThreadId, run_id: &RunId)
        -> Result<RunHandle, ServiceError>;

    async fn cancel_run(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
    ) -> Result<RunHandle, ServiceError>;

    async fn list_messages(
        &self,
        thread_id: &ThreadId,
        order: ListOrder,
    ) -> Result<Vec<ThreadMessage>, ServiceError>;
}
