//! `TestingAgent` (`§3`). The target agent is not persisted separately; its identity lives
//! inside the Runner (`mta_runner::target_loop`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::Timestamp;
use crate::scenario::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestingAgentStatus {
    Idle,
    Spawning,
    Active,
    Paused,
    Terminated,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestingAgent {
    pub agent_id: Uuid,
    pub test_id: Uuid,
    pub profile: Profile,
    pub status: TestingAgentStatus,
    pub minecraft_bot_id: Option<String>,
    pub system_prompt: String,
    pub spawned_at: Option<Timestamp>,
    pub last_action_at: Option<Timestamp>,
    pub action_count: u64,
    pub behavior_intensity: f32,
}

impl TestingAgent {
    pub fn new(test_id: Uuid, profile: Profile, system_prompt: String, behavior_intensity: f32) -> Self {
        Self {
            agent_id: Uuid::now_v7(),
            test_id,
            profile,
            status: TestingAgentStatus::Idle,
            minecraft_bot_id: None,
            system_prompt,
            spawned_at: None,
            last_action_at: None,
            action_count: 0,
            behavior_intensity,
        }
    }
}
