//! Static scenario/profile shapes (`§3`). The tables themselves (immutable, built once at
//! startup) live in `mta_core::registry`; this module only defines the data shapes so both
//! `mta-core` and `mta-api` can share them on the wire.

use serde::{Deserialize, Serialize};

use crate::run::ScenarioType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    Leader,
    Follower,
    NonCooperator,
    Confuser,
    ResourceHoarder,
    TaskAbandoner,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Leader => "leader",
            Profile::Follower => "follower",
            Profile::NonCooperator => "non-cooperator",
            Profile::Confuser => "confuser",
            Profile::ResourceHoarder => "resource-hoarder",
            Profile::TaskAbandoner => "task-abandoner",
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessCriteria {
    pub min_cooperative_actions: Option<u64>,
    pub requires_discord_communication: bool,
    pub min_tasks_completed: Option<u64>,
    pub max_llm_error_rate: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialConditions {
    pub spawn_position: Option<(f64, f64, f64)>,
    pub target_starting_inventory: Vec<String>,
    pub tester_starting_inventory: Vec<String>,
    pub time_of_day: String,
    pub weather: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub scenario_type: ScenarioType,
    pub default_profiles: Vec<Profile>,
    pub default_duration_seconds: u32,
    pub objective_prompt: String,
    pub success_criteria: SuccessCriteria,
    pub initial_conditions: InitialConditions,
    pub relevant_metrics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionFrequency {
    pub min_actions_per_minute: f32,
    pub max_actions_per_minute: f32,
}

impl ActionFrequency {
    /// `§4.3`: `intervalMs = 60000 / mean(min, max)`.
    pub fn tick_interval_ms(&self) -> u64 {
        let mean = (self.min_actions_per_minute + self.max_actions_per_minute) / 2.0;
        (60_000.0 / mean as f64) as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviouralProfile {
    pub name: Profile,
    pub description: String,
    pub behavior_rules: Vec<String>,
    pub action_frequency: ActionFrequency,
    pub minecraft_behaviors: Vec<String>,
    pub response_patterns: Vec<String>,
}
