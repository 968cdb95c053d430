//! Process-wide engine configuration, read once at startup from the environment (`§6.7`).

use mta_contracts::config::TestRunConfig;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub minecraft_host: String,
    pub minecraft_port: u16,
    pub minecraft_version: Option<String>,
    pub discord_bot_token: Option<String>,
    pub discord_guild_id: Option<String>,
    pub discord_auto_start: bool,
    pub elevenlabs_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub default_llm_model: String,
    pub max_concurrent_tests: usize,
    pub coordination_phase_seconds: u64,
    pub default_llm_polling_interval_ms: u64,
    pub default_test_duration_seconds: u32,
    pub default_behavior_intensity: f32,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_var(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    /// Create configuration from environment variables, clamping the bounded fields
    /// described in `§6.7` so an out-of-range env var cannot silently violate an invariant.
    pub fn from_env() -> Self {
        let llm_polling_interval_ms =
            env_parse("DEFAULT_LLM_POLLING_INTERVAL_MS", 7_000u64).clamp(3_000, 30_000);
        let default_test_duration_seconds =
            env_parse("DEFAULT_TEST_DURATION_SECONDS", 600u32).clamp(60, 1_800);
        let default_behavior_intensity =
            env_parse("DEFAULT_BEHAVIOR_INTENSITY", 0.5f32).clamp(0.0, 1.0);

        Self {
            port: env_parse("PORT", 8080u16),
            database_url: env_var("DATABASE_URL"),
            minecraft_host: env_var("MINECRAFT_HOST").unwrap_or_else(|| "localhost".to_string()),
            minecraft_port: env_parse("MINECRAFT_PORT", 25_565u16),
            minecraft_version: env_var("MINECRAFT_VERSION"),
            discord_bot_token: env_var("DISCORD_BOT_TOKEN"),
            discord_guild_id: env_var("DISCORD_GUILD_ID"),
            discord_auto_start: env_parse("DISCORD_AUTO_START", false),
            elevenlabs_api_key: env_var("ELEVENLABS_API_KEY"),
            openrouter_api_key: env_var("OPENROUTER_API_KEY"),
            default_llm_model: env_var("DEFAULT_LLM_MODEL")
                .unwrap_or_else(|| "openai/gpt-4o-mini".to_string()),
            max_concurrent_tests: env_parse("MAX_CONCURRENT_TESTS", 3usize),
            coordination_phase_seconds: env_parse("COORDINATION_PHASE_SECONDS", 30u64),
            default_llm_polling_interval_ms: llm_polling_interval_ms,
            default_test_duration_seconds,
            default_behavior_intensity,
        }
    }

    /// The baseline [`TestRunConfig`] every new run starts from before `CreateTestRequest`
    /// overrides are applied.
    pub fn default_run_config(&self) -> TestRunConfig {
        TestRunConfig {
            llm_polling_interval_ms: self.default_llm_polling_interval_ms,
            coordination_phase_seconds: self.coordination_phase_seconds,
            non_leader_start_offset_seconds: 12,
            criteria_poll_seconds: 5,
            behavior_intensity: self.default_behavior_intensity,
        }
    }

    pub fn voice_enabled(&self) -> bool {
        self.discord_bot_token.is_some() && self.elevenlabs_api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_env_values() {
        std::env::set_var("DEFAULT_LLM_POLLING_INTERVAL_MS", "1");
        std::env::set_var("DEFAULT_TEST_DURATION_SECONDS", "99999");
        std::env::set_var("DEFAULT_BEHAVIOR_INTENSITY", "5.0");
        let cfg = EngineConfig::from_env();
        assert_eq!(cfg.default_llm_polling_interval_ms, 3_000);
        assert_eq!(cfg.default_test_duration_seconds, 1_800);
        assert_eq!(cfg.default_behavior_intensity, 1.0);
        std::env::remove_var("DEFAULT_LLM_POLLING_INTERVAL_MS");
        std::env::remove_var("DEFAULT_TEST_DURATION_SECONDS");
        std::env::remove_var("DEFAULT_BEHAVIOR_INTENSITY");
    }
}
