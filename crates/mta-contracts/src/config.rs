//! Per-run configuration: the resolved values a `TestRun` actually executes with, and the
//! partial overrides a `CreateTestRequest` may supply.

use serde::{Deserialize, Serialize};

/// Fully resolved configuration for one test run. Defaults come from
/// `mta_core::config::EngineConfig`; a `CreateTestRequest.config` may override any subset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestRunConfig {
    /// Target decision loop tick interval, clamped to [3000, 30000] ms.
    pub llm_polling_interval_ms: u64,
    /// Fixed dwell in `coordination` before advancing to `executing`.
    pub coordination_phase_seconds: u64,
    /// Fixed offset non-leader testing agents wait before their first tick.
    pub non_leader_start_offset_seconds: u64,
    /// Interval between completion-criteria polls.
    pub criteria_poll_seconds: u64,
    /// Scales testing-agent "intensity" flavour text; bounded [0, 1]. Does not change the
    /// tick rate, which is derived solely from the profile's `actionFrequency`.
    pub behavior_intensity: f32,
}

/// Partial override of [`TestRunConfig`]; `None` fields fall back to the engine default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunConfigOverrides {
    pub llm_polling_interval_ms: Option<u64>,
    pub coordination_phase_seconds: Option<u64>,
    pub non_leader_start_offset_seconds: Option<u64>,
    pub criteria_poll_seconds: Option<u64>,
    pub behavior_intensity: Option<f32>,
}

impl TestRunConfig {
    pub fn apply_overrides(mut self, overrides: &TestRunConfigOverrides) -> Self {
        if let Some(v) = overrides.llm_polling_interval_ms {
            self.llm_polling_interval_ms = v.clamp(3_000, 30_000);
        }
        if let Some(v) = overrides.coordination_phase_seconds {
            self.coordination_phase_seconds = v;
        }
        if let Some(v) = overrides.non_leader_start_offset_seconds {
            self.non_leader_start_offset_seconds = v;
        }
        if let Some(v) = overrides.criteria_poll_seconds {
            self.criteria_poll_seconds = v;
        }
        if let Some(v) = overrides.behavior_intensity {
            self.behavior_intensity = v.clamp(0.0, 1.0);
        }
        self
    }
}
