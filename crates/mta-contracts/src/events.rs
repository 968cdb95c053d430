//! `DomainEvent` (`§3`, `§4.6`): a typed sum serialised on the wire as a tagged object
//! `{type, testId, ...fields}`. The `#[serde(tag = "type")]` encoding is what gives the
//! fan-out its injective-per-type property (`§4.6`) without any hand-rolled matching.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action_log::SourceType;
use crate::common::Timestamp;
use crate::metrics::TestMetrics;
use crate::run::{CompletionReason, TestRunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatChannel {
    Text,
    Voice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum DomainEvent {
    TestStatusChanged {
        test_id: Uuid,
        previous_status: TestRunStatus,
        new_status: TestRunStatus,
        timestamp: Timestamp,
    },
    TargetLlmDecision {
        test_id: Uuid,
        reasoning: String,
        parsed_actions: Vec<String>,
        response_time_ms: u64,
        timestamp: Timestamp,
    },
    AgentAction {
        test_id: Uuid,
        source_agent_id: Uuid,
        source_type: SourceType,
        action_type: String,
        success: bool,
        timestamp: Timestamp,
    },
    TestChatMessage {
        test_id: Uuid,
        source_agent_id: Uuid,
        source_type: SourceType,
        channel: ChatChannel,
        message: String,
        timestamp: Timestamp,
    },
    TestMetricsUpdated {
        test_id: Uuid,
        llm_decision_count: u64,
        target_action_count: u64,
        testing_agent_action_count: u64,
        target_message_count: u64,
        testing_agent_message_count: u64,
        llm_error_count: u64,
        timestamp: Timestamp,
    },
    TestCompleted {
        test_id: Uuid,
        reason: CompletionReason,
        timestamp: Timestamp,
    },
    TestError {
        test_id: Uuid,
        message: String,
        fatal: bool,
        timestamp: Timestamp,
    },
}

impl DomainEvent {
    /// Builds a `TestMetricsUpdated` from a `TestMetrics` snapshot, so callers that already
    /// hold one (e.g. the return value of `Repository::increment_metric`) don't repeat its
    /// field list at every publish site.
    pub fn metrics_updated(test_id: Uuid, metrics: &TestMetrics, timestamp: Timestamp) -> Self {
        DomainEvent::TestMetricsUpdated {
            test_id,
            llm_decision_count: metrics.llm_decision_count,
            target_action_count: metrics.target_action_count,
            testing_agent_action_count: metrics.testing_agent_action_count,
            target_message_count: metrics.target_message_count,
            testing_agent_message_count: metrics.testing_agent_message_count,
            llm_error_count: metrics.llm_error_count,
            timestamp,
        }
    }

    pub fn test_id(&self) -> Uuid {
        match self {
            DomainEvent::TestStatusChanged { test_id, .. }
            | DomainEvent::TargetLlmDecision { test_id, .. }
            | DomainEvent::AgentAction { test_id, .. }
            | DomainEvent::TestChatMessage { test_id, .. }
            | DomainEvent::TestMetricsUpdated { test_id, .. }
            | DomainEvent::TestCompleted { test_id, .. }
            | DomainEvent::TestError { test_id, .. } => *test_id,
        }
    }
}
