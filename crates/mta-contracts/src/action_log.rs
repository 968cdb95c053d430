//! `ActionLog` (`§3`): append-only record of one action or decision.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::common::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Target,
    TestingAgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionCategory {
    Minecraft,
    Discord,
    LlmDecision,
}

/// `metadata` is the one place the spec's "any" escape hatch survives (`§9`): an opaque
/// key/value map, not a typed struct, because action detail shapes vary by category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLog {
    pub log_id: Uuid,
    pub test_id: Uuid,
    pub source_agent_id: Uuid,
    pub source_type: SourceType,
    pub action_category: ActionCategory,
    pub action_detail: String,
    pub timestamp: Timestamp,
    pub metadata: Value,
}

impl ActionLog {
    pub fn new(
        test_id: Uuid,
        source_agent_id: Uuid,
        source_type: SourceType,
        action_category: ActionCategory,
        action_detail: impl Into<String>,
        metadata: Value,
    ) -> Self {
        Self {
            log_id: Uuid::now_v7(),
            test_id,
            source_agent_id,
            source_type,
            action_category,
            action_detail: action_detail.into(),
            timestamp: chrono::Utc::now(),
            metadata,
        }
    }
}
