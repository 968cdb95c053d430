//! The engine's external-collaborator seams (`§6`). Everything the Runner touches outside
//! its own process — the game, the LLM, voice, and persistence — is a trait here. Production
//! wiring picks concrete implementations (`mta-storage`, `mta-llm`, and a Minecraft/Discord
//! adapter the engine does not ship); tests use in-memory fakes.

use async_trait::async_trait;
use mta_contracts::{
    run::{ScenarioType, TestRunStatus},
    ActionLog, TestMetrics, TestRun, TestingAgent,
};
use mta_contracts::metrics::MetricField;
use uuid::Uuid;

use crate::error::Result;
use crate::game::{BotState, ChatMessage};

// ============================================================================
// GameClient (§6.3) — consumed
// ============================================================================

#[derive(Debug, Clone)]
pub struct SpawnTeleport {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
}

#[derive(Debug, Clone)]
pub enum GameEvent {
    Chat { sender: String, message: String },
    Damage { amount: f32 },
    Death,
    Kicked { reason: String },
    Moved,
}

/// A container opened with `GameClient::open_container` (`§6.3`).
#[async_trait]
pub trait ContainerHandle: Send + Sync {
    async fn items(&self) -> Result<Vec<crate::game::InventoryItem>>;
    async fn withdraw(&self, item_type: &str, count: u32) -> Result<u32>;
    async fn close(&self) -> Result<()>;
}

/// A [`GameClient`] stand-in for deployments that have not wired a real Minecraft adapter
/// (`§6.3`, `§9` Non-goals: the engine does not ship one). Every call fails with a
/// `GameClient` error instead of panicking, so a misconfigured deployment surfaces as a
/// normal `502` on the first test it tries to run rather than a crash at startup.
pub struct UnconfiguredGameClient;

fn unconfigured<T>() -> Result<T> {
    Err(crate::error::EngineError::game_client(
        "no GameClient is configured for this deployment",
    ))
}

#[async_trait]
impl GameClient for UnconfiguredGameClient {
    async fn create_bot(
        &self,
        _username: &str,
        _host: &str,
        _port: u16,
        _version: Option<&str>,
        _spawn_teleport: Option<SpawnTeleport>,
    ) -> Result<String> {
        unconfigured()
    }

    async fn disconnect_bot(&self, _bot_id: &str) -> Result<()> {
        unconfigured()
    }

    async fn get_state(&self, _bot_id: &str) -> Result<BotState> {
        unconfigured()
    }

    async fn look_at(&self, _bot_id: &str, _x: f64, _y: f64, _z: f64) -> Result<bool> {
        unconfigured()
    }

    async fn walk_forward(&self, _bot_id: &str, _duration_ms: u64) -> Result<bool> {
        unconfigured()
    }

    async fn jump(&self, _bot_id: &str) -> Result<bool> {
        unconfigured()
    }

    async fn pathfind_to(&self, _bot_id: &str, _x: f64, _y: f64, _z: f64, _arrive_within: f64) -> Result<bool> {
        unconfigured()
    }

    async fn dig(&self, _bot_id: &str, _x: f64, _y: f64, _z: f64) -> Result<bool> {
        unconfigured()
    }

    async fn place_block(&self, _bot_id: &str, _ref_x: f64, _ref_y: f64, _ref_z: f64, _face: (f64, f64, f64)) -> Result<bool> {
        unconfigured()
    }

    async fn equip(&self, _bot_id: &str, _item_name: &str) -> Result<bool> {
        unconfigured()
    }

    async fn attack(&self, _bot_id: &str, _target_name: &str) -> Result<bool> {
        unconfigured()
    }

    async fn find_nearest_block(&self, _bot_id: &str, _name_pattern: &str, _max_distance: f64) -> Result<Option<(f64, f64, f64)>> {
        unconfigured()
    }

    async fn block_at(&self, _bot_id: &str, _x: f64, _y: f64, _z: f64) -> Result<Option<String>> {
        unconfigured()
    }

    async fn open_container(&self, _bot_id: &str, _x: f64, _y: f64, _z: f64) -> Result<Box<dyn ContainerHandle>> {
        unconfigured()
    }

    async fn send_chat(&self, _bot_id: &str, _message: &str) -> Result<bool> {
        unconfigured()
    }

    async fn recent_chat(&self, _bot_id: &str, _limit: usize) -> Result<Vec<ChatMessage>> {
        unconfigured()
    }
}

#[async_trait]
pub trait GameClient: Send + Sync {
    async fn create_bot(
        &self,
        username: &str,
        host: &str,
        port: u16,
        version: Option<&str>,
        spawn_teleport: Option<SpawnTeleport>,
    ) -> Result<String>;

    async fn disconnect_bot(&self, bot_id: &str) -> Result<()>;

    async fn get_state(&self, bot_id: &str) -> Result<BotState>;

    async fn look_at(&self, bot_id: &str, x: f64, y: f64, z: f64) -> Result<bool>;
    async fn walk_forward(&self, bot_id: &str, duration_ms: u64) -> Result<bool>;
    async fn jump(&self, bot_id: &str) -> Result<bool>;
    async fn pathfind_to(&self, bot_id: &str, x: f64, y: f64, z: f64, arrive_within: f64) -> Result<bool>;

    async fn dig(&self, bot_id: &str, x: f64, y: f64, z: f64) -> Result<bool>;
    async fn place_block(&self, bot_id: &str, ref_x: f64, ref_y: f64, ref_z: f64, face: (f64, f64, f64)) -> Result<bool>;

    async fn equip(&self, bot_id: &str, item_name: &str) -> Result<bool>;
    async fn attack(&self, bot_id: &str, target_name: &str) -> Result<bool>;

    async fn find_nearest_block(&self, bot_id: &str, name_pattern: &str, max_distance: f64) -> Result<Option<(f64, f64, f64)>>;
    async fn block_at(&self, bot_id: &str, x: f64, y: f64, z: f64) -> Result<Option<String>>;

    async fn open_container(&self, bot_id: &str, x: f64, y: f64, z: f64) -> Result<Box<dyn ContainerHandle>>;

    async fn send_chat(&self, bot_id: &str, message: &str) -> Result<bool>;

    async fn recent_chat(&self, bot_id: &str, limit: usize) -> Result<Vec<ChatMessage>>;
}

// ============================================================================
// LlmProvider (§6.4) — consumed
// ============================================================================

#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<LlmMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: String,
    pub usage: Option<(u32, u32)>,
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}

// ============================================================================
// VoiceCoordinator (§6.5) — consumed
// ============================================================================

#[derive(Debug, Clone)]
pub struct TestSessionChannels {
    pub text_channel_id: String,
    pub voice_channel_id: String,
}

#[async_trait]
pub trait VoiceCoordinator: Send + Sync {
    async fn ensure_test_session_channels(&self, guild_id: &str, test_id: Uuid) -> Result<TestSessionChannels>;
    async fn join_voice(&self, guild_id: &str, channel_id: &str) -> Result<()>;
    async fn leave_voice(&self, guild_id: &str) -> Result<()>;
    async fn register_agent_voice(&self, agent_id: Uuid, voice_id: &str, display_name: &str) -> Result<()>;
    async fn unregister_agent_voice(&self, agent_id: Uuid) -> Result<()>;
    async fn speak_as_agent(&self, guild_id: &str, agent_id: Uuid, text: &str) -> Result<()>;
}

// ============================================================================
// Repository (§6.6, §4.7) — implemented by mta-storage
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RunFilters {
    pub status: Option<TestRunStatus>,
    pub scenario_type: Option<ScenarioType>,
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn create(&self, run: TestRun) -> Result<TestRun>;
    async fn find_by_id(&self, test_id: Uuid) -> Result<Option<TestRun>>;
    /// `§4.7`: sorted by `createdAt` descending.
    async fn find_all(&self, filters: RunFilters) -> Result<Vec<TestRun>>;
    async fn update(&self, run: TestRun) -> Result<TestRun>;
    async fn delete(&self, test_id: Uuid) -> Result<bool>;

    async fn create_action_log(&self, log: ActionLog) -> Result<ActionLog>;
    async fn find_action_logs(&self, test_id: Uuid, limit: usize) -> Result<Vec<ActionLog>>;

    async fn count(&self) -> Result<usize>;
    async fn exists(&self, test_id: Uuid) -> Result<bool>;
    async fn count_active(&self) -> Result<usize>;

    /// Atomic per-field increment (`§4.7`); must be free of lost updates under concurrent
    /// writers. Returns the metrics record after the increment.
    async fn increment_metric(&self, test_id: Uuid, field: MetricField, delta: u64) -> Result<TestMetrics>;

    /// Targeted write of `lastLlmDecisionAt` that does not read the rest of the record.
    async fn update_metric_timestamp(&self, test_id: Uuid, value: chrono::DateTime<chrono::Utc>) -> Result<()>;

    // ------------------------------------------------------------------
    // TestingAgent (§3, §4.3) — one record per spawned testing agent.
    // ------------------------------------------------------------------

    async fn create_agent(&self, agent: TestingAgent) -> Result<TestingAgent>;
    async fn find_agent(&self, agent_id: Uuid) -> Result<Option<TestingAgent>>;
    /// `§4.5` cleanup: every agent spawned for a run, so each can be torn down.
    async fn find_agents_by_test(&self, test_id: Uuid) -> Result<Vec<TestingAgent>>;
    async fn update_agent(&self, agent: TestingAgent) -> Result<TestingAgent>;
}
