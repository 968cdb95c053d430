//! The `TestRun` aggregate and its lifecycle enums.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::Timestamp;
use crate::config::{TestRunConfig, TestRunConfigOverrides};
use crate::metrics::TestMetrics;

/// `§4.1` lifecycle states. `Completing` is a transient state cleanup may pass through but
/// never settles in; it is included here so intermediate transitions are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestRunStatus {
    Created,
    Initializing,
    Coordination,
    Executing,
    Completing,
    Completed,
    Failed,
    Cancelled,
}

impl TestRunStatus {
    /// `§4.1` active states: the ones a concurrency cap counts and a completion detector runs
    /// timers for.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TestRunStatus::Initializing | TestRunStatus::Coordination | TestRunStatus::Executing
        )
    }

    /// Terminal states are absorbing: once reached, no further transition is legal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TestRunStatus::Completed | TestRunStatus::Failed | TestRunStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TestRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TestRunStatus::Created => "created",
            TestRunStatus::Initializing => "initializing",
            TestRunStatus::Coordination => "coordination",
            TestRunStatus::Executing => "executing",
            TestRunStatus::Completing => "completing",
            TestRunStatus::Completed => "completed",
            TestRunStatus::Failed => "failed",
            TestRunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for TestRunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(TestRunStatus::Created),
            "initializing" => Ok(TestRunStatus::Initializing),
            "coordination" => Ok(TestRunStatus::Coordination),
            "executing" => Ok(TestRunStatus::Executing),
            "completing" => Ok(TestRunStatus::Completing),
            "completed" => Ok(TestRunStatus::Completed),
            "failed" => Ok(TestRunStatus::Failed),
            "cancelled" => Ok(TestRunStatus::Cancelled),
            other => Err(format!("unknown test run status: {other}")),
        }
    }
}

/// `§3` scenario enum. Two scenarios ship with the registry (`§4.8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioType {
    Cooperation,
    ResourceManagement,
}

impl std::fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScenarioType::Cooperation => "cooperation",
            ScenarioType::ResourceManagement => "resource-management",
        };
        f.write_str(s)
    }
}

impl FromStr for ScenarioType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cooperation" => Ok(ScenarioType::Cooperation),
            "resource-management" => Ok(ScenarioType::ResourceManagement),
            other => Err(format!("unknown scenario type: {other}")),
        }
    }
}

/// `§3` completion reasons. Non-null iff `status` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionReason {
    Success,
    Timeout,
    ManualStop,
    Error,
    AllAgentsFailed,
}

impl std::fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompletionReason::Success => "success",
            CompletionReason::Timeout => "timeout",
            CompletionReason::ManualStop => "manual-stop",
            CompletionReason::Error => "error",
            CompletionReason::AllAgentsFailed => "all-agents-failed",
        };
        f.write_str(s)
    }
}

impl CompletionReason {
    /// `§4.1`: success/timeout land the run in `completed`; error/all-agents-failed land it
    /// in `failed`. `manual-stop` always lands in `cancelled`.
    pub fn terminal_status(self) -> TestRunStatus {
        match self {
            CompletionReason::Success | CompletionReason::Timeout => TestRunStatus::Completed,
            CompletionReason::Error | CompletionReason::AllAgentsFailed => TestRunStatus::Failed,
            CompletionReason::ManualStop => TestRunStatus::Cancelled,
        }
    }
}

/// The primary aggregate (`§3`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRun {
    pub test_id: Uuid,
    pub scenario_type: ScenarioType,
    pub status: TestRunStatus,
    pub target_llm_model: String,
    pub testing_agent_profiles: Vec<Profile>,
    pub testing_agent_ids: Vec<Uuid>,
    pub target_agent_id: Uuid,
    pub target_bot_id: Option<String>,
    pub discord_text_channel_id: Option<String>,
    pub discord_voice_channel_id: Option<String>,
    pub duration_seconds: u32,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub completion_reason: Option<CompletionReason>,
    pub config: TestRunConfig,
    pub metrics: TestMetrics,
}

/// `§6.1` `POST /api/tests` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestRequest {
    pub scenario_type: String,
    pub target_llm_model: Option<String>,
    pub testing_agent_profiles: Option<Vec<Profile>>,
    pub duration_seconds: Option<u32>,
    pub config: Option<TestRunConfigOverrides>,
}

pub use crate::scenario::Profile;
