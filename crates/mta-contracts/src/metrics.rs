//! `TestMetrics` (`§3`): an embedded, strictly monotonic counter record.

use serde::{Deserialize, Serialize};

use crate::common::Timestamp;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestMetrics {
    pub llm_decision_count: u64,
    pub target_action_count: u64,
    pub testing_agent_action_count: u64,
    pub target_message_count: u64,
    pub testing_agent_message_count: u64,
    pub llm_error_count: u64,
    pub total_llm_response_time_ms: u64,
    pub last_llm_decision_at: Option<Timestamp>,
}

/// `§4.7` the only fields `IncrementMetric` is allowed to touch. Keeping this as an enum
/// (rather than a free-form field name string) means a typo in a caller is a compile error,
/// not a silently-ignored no-op increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    LlmDecisionCount,
    TargetActionCount,
    TestingAgentActionCount,
    TargetMessageCount,
    TestingAgentMessageCount,
    LlmErrorCount,
    TotalLlmResponseTimeMs,
}

impl MetricField {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricField::LlmDecisionCount => "llm_decision_count",
            MetricField::TargetActionCount => "target_action_count",
            MetricField::TestingAgentActionCount => "testing_agent_action_count",
            MetricField::TargetMessageCount => "target_message_count",
            MetricField::TestingAgentMessageCount => "testing_agent_message_count",
            MetricField::LlmErrorCount => "llm_error_count",
            MetricField::TotalLlmResponseTimeMs => "total_llm_response_time_ms",
        }
    }
}

impl TestMetrics {
    /// Applies a delta to one field. Callers (the repository implementations) are
    /// responsible for making this atomic with respect to concurrent writers.
    pub fn apply(&mut self, field: MetricField, delta: u64) {
        let target = match field {
            MetricField::LlmDecisionCount => &mut self.llm_decision_count,
            MetricField::TargetActionCount => &mut self.target_action_count,
            MetricField::TestingAgentActionCount => &mut self.testing_agent_action_count,
            MetricField::TargetMessageCount => &mut self.target_message_count,
            MetricField::TestingAgentMessageCount => &mut self.testing_agent_message_count,
            MetricField::LlmErrorCount => &mut self.llm_error_count,
            MetricField::TotalLlmResponseTimeMs => &mut self.total_llm_response_time_ms,
        };
        *target = target.saturating_add(delta);
    }
}
