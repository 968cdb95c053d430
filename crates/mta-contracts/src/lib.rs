//! Wire-level domain types for the test orchestration engine.
//!
//! Everything in this crate is `Serialize`/`Deserialize` and carries no behaviour beyond
//! small constructors and enum parsing. The engine logic (state machine transitions, loop
//! bodies, selection policies) lives in `mta-core` and `mta-runner`.

pub mod action_log;
pub mod agent;
pub mod common;
pub mod config;
pub mod events;
pub mod metrics;
pub mod run;
pub mod scenario;

pub use action_log::{ActionCategory, ActionLog, SourceType};
pub use agent::{TestingAgent, TestingAgentStatus};
pub use common::Timestamp;
pub use events::DomainEvent;
pub use metrics::TestMetrics;
pub use config::{TestRunConfig, TestRunConfigOverrides};
pub use run::{CompletionReason, CreateTestRequest, ScenarioType, TestRun, TestRunStatus};
pub use scenario::{BehaviouralProfile, InitialConditions, Profile, Scenario, SuccessCriteria};
