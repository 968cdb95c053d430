//! Database row shapes (`§6.6`). Kept distinct from the `mta-contracts` wire types, as the
//! teacher's `models.rs` keeps `UserRow` distinct from its public DTOs — metrics are
//! individual columns here (to make `increment_metric` a plain arithmetic `UPDATE`), not the
//! nested struct the domain type uses.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use mta_contracts::action_log::{ActionCategory, SourceType};
use mta_contracts::agent::TestingAgentStatus;
use mta_contracts::run::{CompletionReason, ScenarioType, TestRunStatus};
use mta_contracts::scenario::Profile;
use mta_contracts::{ActionLog, TestMetrics, TestRun, TestingAgent};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct TestRunRow {
    pub test_id: Uuid,
    pub scenario_type: String,
    pub status: String,
    pub target_llm_model: String,
    pub testing_agent_profiles: sqlx::types::JsonValue,
    pub testing_agent_ids: sqlx::types::JsonValue,
    pub target_agent_id: Uuid,
    pub target_bot_id: Option<String>,
    pub discord_text_channel_id: Option<String>,
    pub discord_voice_channel_id: Option<String>,
    pub duration_seconds: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub completion_reason: Option<String>,
    pub config: sqlx::types::JsonValue,

    pub llm_decision_count: i64,
    pub target_action_count: i64,
    pub testing_agent_action_count: i64,
    pub target_message_count: i64,
    pub testing_agent_message_count: i64,
    pub llm_error_count: i64,
    pub total_llm_response_time_ms: i64,
    pub last_llm_decision_at: Option<DateTime<Utc>>,
}

impl TestRunRow {
    pub fn into_domain(self) -> anyhow::Result<TestRun> {
        let testing_agent_profiles: Vec<Profile> = serde_json::from_value(self.testing_agent_profiles)?;
        let testing_agent_ids: Vec<Uuid> = serde_json::from_value(self.testing_agent_ids)?;
        let config = serde_json::from_value(self.config)?;

        Ok(TestRun {
            test_id: self.test_id,
            scenario_type: ScenarioType::from_str(&self.scenario_type)
                .map_err(|e| anyhow::anyhow!(e))?,
            status: TestRunStatus::from_str(&self.status).map_err(|e| anyhow::anyhow!(e))?,
            target_llm_model: self.target_llm_model,
            testing_agent_profiles,
            testing_agent_ids,
            target_agent_id: self.target_agent_id,
            target_bot_id: self.target_bot_id,
            discord_text_channel_id: self.discord_text_channel_id,
            discord_voice_channel_id: self.discord_voice_channel_id,
            duration_seconds: self.duration_seconds as u32,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            completion_reason: self
                .completion_reason
                .map(|s| completion_reason_from_str(&s))
                .transpose()?,
            config,
            metrics: TestMetrics {
                llm_decision_count: self.llm_decision_count as u64,
                target_action_count: self.target_action_count as u64,
                testing_agent_action_count: self.testing_agent_action_count as u64,
                target_message_count: self.target_message_count as u64,
                testing_agent_message_count: self.testing_agent_message_count as u64,
                llm_error_count: self.llm_error_count as u64,
                total_llm_response_time_ms: self.total_llm_response_time_ms as u64,
                last_llm_decision_at: self.last_llm_decision_at,
            },
        })
    }
}

fn completion_reason_from_str(s: &str) -> anyhow::Result<CompletionReason> {
    Ok(match s {
        "success" => CompletionReason::Success,
        "timeout" => CompletionReason::Timeout,
        "manual-stop" => CompletionReason::ManualStop,
        "error" => CompletionReason::Error,
        "all-agents-failed" => CompletionReason::AllAgentsFailed,
        other => anyhow::bail!("unknown completion reason: {other}"),
    })
}

fn completion_reason_as_str(reason: CompletionReason) -> &'static str {
    match reason {
        CompletionReason::Success => "success",
        CompletionReason::Timeout => "timeout",
        CompletionReason::ManualStop => "manual-stop",
        CompletionReason::Error => "error",
        CompletionReason::AllAgentsFailed => "all-agents-failed",
    }
}

/// Bind values for an `INSERT`/`UPDATE` of `test_runs`, split out of `TestRun` so callers
/// don't repeat the `serde_json::to_value` dance at each call site.
pub struct TestRunBindings {
    pub scenario_type: String,
    pub status: String,
    pub testing_agent_profiles: sqlx::types::JsonValue,
    pub testing_agent_ids: sqlx::types::JsonValue,
    pub completion_reason: Option<String>,
    pub config: sqlx::types::JsonValue,
}

impl TestRunBindings {
    pub fn from_domain(run: &TestRun) -> anyhow::Result<Self> {
        Ok(Self {
            scenario_type: run.scenario_type.to_string(),
            status: run.status.to_string(),
            testing_agent_profiles: serde_json::to_value(&run.testing_agent_profiles)?,
            testing_agent_ids: serde_json::to_value(&run.testing_agent_ids)?,
            completion_reason: run.completion_reason.map(completion_reason_as_str).map(str::to_string),
            config: serde_json::to_value(&run.config)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ActionLogRow {
    pub log_id: Uuid,
    pub test_id: Uuid,
    pub source_agent_id: Uuid,
    pub source_type: String,
    pub action_category: String,
    pub action_detail: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: sqlx::types::JsonValue,
}

impl ActionLogRow {
    pub fn into_domain(self) -> anyhow::Result<ActionLog> {
        Ok(ActionLog {
            log_id: self.log_id,
            test_id: self.test_id,
            source_agent_id: self.source_agent_id,
            source_type: match self.source_type.as_str() {
                "target" => SourceType::Target,
                "testing-agent" => SourceType::TestingAgent,
                other => anyhow::bail!("unknown source type: {other}"),
            },
            action_category: match self.action_category.as_str() {
                "minecraft" => ActionCategory::Minecraft,
                "discord" => ActionCategory::Discord,
                "llm-decision" => ActionCategory::LlmDecision,
                other => anyhow::bail!("unknown action category: {other}"),
            },
            action_detail: self.action_detail,
            timestamp: self.timestamp,
            metadata: self.metadata,
        })
    }
}

pub fn source_type_as_str(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::Target => "target",
        SourceType::TestingAgent => "testing-agent",
    }
}

pub fn action_category_as_str(category: ActionCategory) -> &'static str {
    match category {
        ActionCategory::Minecraft => "minecraft",
        ActionCategory::Discord => "discord",
        ActionCategory::LlmDecision => "llm-decision",
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TestingAgentRow {
    pub agent_id: Uuid,
    pub test_id: Uuid,
    pub profile: String,
    pub status: String,
    pub minecraft_bot_id: Option<String>,
    pub system_prompt: String,
    pub spawned_at: Option<DateTime<Utc>>,
    pub last_action_at: Option<DateTime<Utc>>,
    pub action_count: i64,
    pub behavior_intensity: f32,
}

impl TestingAgentRow {
    pub fn into_domain(self) -> anyhow::Result<TestingAgent> {
        Ok(TestingAgent {
            agent_id: self.agent_id,
            test_id: self.test_id,
            profile: profile_from_str(&self.profile)?,
            status: agent_status_from_str(&self.status)?,
            minecraft_bot_id: self.minecraft_bot_id,
            system_prompt: self.system_prompt,
            spawned_at: self.spawned_at,
            last_action_at: self.last_action_at,
            action_count: self.action_count as u64,
            behavior_intensity: self.behavior_intensity,
        })
    }
}

fn profile_from_str(s: &str) -> anyhow::Result<Profile> {
    Ok(match s {
        "leader" => Profile::Leader,
        "follower" => Profile::Follower,
        "non-cooperator" => Profile::NonCooperator,
        "confuser" => Profile::Confuser,
        "resource-hoarder" => Profile::ResourceHoarder,
        "task-abandoner" => Profile::TaskAbandoner,
        other => anyhow::bail!("unknown profile: {other}"),
    })
}

fn agent_status_from_str(s: &str) -> anyhow::Result<TestingAgentStatus> {
    Ok(match s {
        "idle" => TestingAgentStatus::Idle,
        "spawning" => TestingAgentStatus::Spawning,
        "active" => TestingAgentStatus::Active,
        "paused" => TestingAgentStatus::Paused,
        "terminated" => TestingAgentStatus::Terminated,
        "error" => TestingAgentStatus::Error,
        other => anyhow::bail!("unknown testing agent status: {other}"),
    })
}

pub fn agent_status_as_str(status: TestingAgentStatus) -> &'static str {
    match status {
        TestingAgentStatus::Idle => "idle",
        TestingAgentStatus::Spawning => "spawning",
        TestingAgentStatus::Active => "active",
        TestingAgentStatus::Paused => "paused",
        TestingAgentStatus::Terminated => "terminated",
        TestingAgentStatus::Error => "error",
    }
}
