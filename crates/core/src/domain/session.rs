use serde::{Deserialize, Serialize};

use crate::domain::agent::{AgentId, AgentInfo, ThreadId};
use crate::domain::turn::Turn;

/// One conversation with one remote agent over one remote thread.
///
/// The agent and thread are bound at construction and never change; the remote
/// thread is left in place when the session ends so it can be resumed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    agent: AgentInfo,
    thread_id: ThreadId,
    turn_counter: u64,
}

impl Session {
    pub fn new(agent: AgentInfo, thread_id: ThreadId) -> Self {
        Self { agent, thread_id, turn_counter: 0 }
    }

    pub fn agent(&self) -> &AgentInfo {
        &self.agent
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent.id
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn turn_counter(&self) -> u64 {
        self.turn_counter
    }

    /// Counts one pass of the input loop, whether or not it ends up running a turn.
    pub fn next_iteration(&mut self) -> u64 {
        self.turn_counter += 1;
        self.turn_counter
    }

    /// Counts an iteration and returns the turn for it.
    pub fn begin_turn(&mut self, raw_input: impl Into<String>) -> Turn {
        Turn::new(self.next_iteration(), raw_input)
    }
}
