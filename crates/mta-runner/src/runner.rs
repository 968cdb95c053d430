//! The Test Runner (`§4`): owns the active-run registry and drives each run's lifecycle —
//! bot provisioning, the coordination dwell, the decision/behaviour loops, completion
//! detection, and cleanup — as one Tokio task per run. Grounded on the teacher's
//! `InMemoryRunner`: an `Arc<RwLock<HashMap<Uuid, JoinHandle<()>>>>` registry of spawned
//! orchestration tasks, generalised from one task-per-workflow-run to one task-per-test-run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mta_contracts::agent::TestingAgentStatus;
use mta_contracts::run::{CreateTestRequest, ScenarioType, TestRunStatus};
use mta_contracts::{CompletionReason, TestRun, TestRunConfig, TestingAgent};
use mta_core::config::EngineConfig;
use mta_core::error::{EngineError, Result};
use mta_core::registry::lookup_scenario;
use mta_core::traits::{GameClient, LlmProvider, Repository, RunFilters, SpawnTeleport, VoiceCoordinator};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::behaviour_loop::{self, BehaviourLoopContext};
use crate::cleanup::{self, CleanupContext};
use crate::completion_detector;
use crate::event_bus::EventBus;
use crate::target_loop::{self, TargetLoopContext};

struct RunHandles {
    cancel_tx: watch::Sender<bool>,
    reason_tx: mpsc::Sender<CompletionReason>,
    task: JoinHandle<()>,
}

/// Everything the orchestrator needs to drive a run, bundled so `TestRunner::new` doesn't
/// grow an unreadable positional-argument list.
pub struct RunnerDeps {
    pub repository: Arc<dyn Repository>,
    pub game_client: Arc<dyn GameClient>,
    pub llm_provider: Arc<dyn LlmProvider>,
    pub voice: Option<Arc<dyn VoiceCoordinator>>,
}

pub struct TestRunner {
    deps: Arc<RunnerDeps>,
    config: EngineConfig,
    event_bus: Arc<EventBus>,
    active: Arc<RwLock<HashMap<Uuid, RunHandles>>>,
}

impl TestRunner {
    pub fn new(deps: RunnerDeps, config: EngineConfig) -> Self {
        Self {
            deps: Arc::new(deps),
            config,
            event_bus: Arc::new(EventBus::new()),
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// `§6.1` `POST /api/tests`.
    pub async fn create_test(&self, request: CreateTestRequest) -> Result<TestRun> {
        let scenario_type: ScenarioType = request
            .scenario_type
            .parse()
            .map_err(|_| EngineError::InvalidScenario(request.scenario_type.clone()))?;
        let scenario =
            lookup_scenario(scenario_type).ok_or_else(|| EngineError::InvalidScenario(scenario_type.to_string()))?;

        if self.deps.repository.count_active().await? >= self.config.max_concurrent_tests {
            return Err(EngineError::MaxTestsReached);
        }

        let testing_agent_profiles = request.testing_agent_profiles.unwrap_or(scenario.default_profiles);
        let testing_agent_ids = testing_agent_profiles.iter().map(|_| Uuid::now_v7()).collect();

        let mut config: TestRunConfig = self.config.default_run_config();
        if let Some(overrides) = &request.config {
            config = config.apply_overrides(overrides);
        }

        let run = TestRun {
            test_id: Uuid::now_v7(),
            scenario_type,
            status: TestRunStatus::Created,
            target_llm_model: request.target_llm_model.unwrap_or_else(|| self.config.default_llm_model.clone()),
            testing_agent_profiles,
            testing_agent_ids,
            target_agent_id: Uuid::now_v7(),
            target_bot_id: None,
            discord_text_channel_id: None,
            discord_voice_channel_id: None,
            duration_seconds: request.duration_seconds.unwrap_or(scenario.default_duration_seconds),
            created_at: chrono::Utc::now(),
            started_at: None,
            ended_at: None,
            completion_reason: None,
            config,
            metrics: Default::default(),
        };

        self.deps.repository.create(run).await
    }

    pub async fn get_test(&self, test_id: Uuid) -> Result<TestRun> {
        self.deps.repository.find_by_id(test_id).await?.ok_or(EngineError::TestNotFound(test_id))
    }

    pub async fn list_tests(&self, filters: RunFilters) -> Result<Vec<TestRun>> {
        self.deps.repository.find_all(filters).await
    }

    pub async fn get_action_logs(&self, test_id: Uuid, limit: usize) -> Result<Vec<mta_contracts::ActionLog>> {
        self.deps.repository.find_action_logs(test_id, limit).await
    }

    /// `§6.1` `POST /api/tests/{id}/start`.
    pub async fn start_test(&self, test_id: Uuid) -> Result<()> {
        let run = self.get_test(test_id).await?;
        if run.status != TestRunStatus::Created {
            return Err(EngineError::InvalidStatus(format!(
                "cannot start a test in status {}",
                run.status
            )));
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (reason_tx, reason_rx) = mpsc::channel(1);

        let orchestrator = Orchestrator {
            deps: self.deps.clone(),
            config: self.config.clone(),
            event_bus: self.event_bus.clone(),
        };
        let active = self.active.clone();
        let drive_reason_tx = reason_tx.clone();

        // Hold the write lock across `spawn` so the task cannot reach its own removal
        // before the entry it's removing has been inserted below.
        let mut guard = self.active.write().await;
        let task = tokio::spawn(async move {
            orchestrator.drive(run, cancel_rx, drive_reason_tx, reason_rx).await;
            active.write().await.remove(&test_id);
        });
        guard.insert(test_id, RunHandles { cancel_tx, reason_tx, task });
        Ok(())
    }

    /// `§6.1` `POST /api/tests/{id}/stop`: a manual stop always wins over whatever
    /// `completion_detector` is about to decide, since it is requested by the operator.
    /// A run that has already reached a terminal state on its own is pruned from `active`
    /// by its own orchestrator task, so an unknown `test_id` here means either "never
    /// existed" (`404`) or "already finished" (`409`), never a leaked handle.
    pub async fn stop_test(&self, test_id: Uuid) -> Result<()> {
        if let Some(handles) = self.active.read().await.get(&test_id) {
            let _ = handles.reason_tx.try_send(CompletionReason::ManualStop);
            return Ok(());
        }

        self.get_test(test_id).await?;
        Err(EngineError::InvalidStatus(format!("test {test_id} is not running")))
    }

    /// `§6.1` `DELETE /api/tests/{id}`: refuses while the run is active (`TEST_ACTIVE`).
    pub async fn delete_test(&self, test_id: Uuid) -> Result<()> {
        let run = self.get_test(test_id).await?;
        if run.status.is_active() {
            return Err(EngineError::TestActive(test_id));
        }
        cleanup::delete_test(self.deps.repository.as_ref(), &self.event_bus, test_id).await?;
        Ok(())
    }

    /// Best-effort drain on process shutdown: signals every active run to cancel and waits
    /// for its orchestrator task to finish cleanup.
    pub async fn shutdown(&self) {
        let mut active = self.active.write().await;
        for (test_id, handles) in active.drain() {
            info!(test_id = %test_id, "cancelling active test on shutdown");
            let _ = handles.cancel_tx.send(true);
            let _ = handles.task.await;
        }
    }
}

struct Orchestrator {
    deps: Arc<RunnerDeps>,
    config: EngineConfig,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    async fn transition(&self, run: &mut TestRun, to: TestRunStatus) -> Result<()> {
        let from = run.status;
        if !mta_core::state_machine::is_allowed_transition(from, to) {
            return Err(EngineError::InvalidStatus(format!("{from} -> {to} is not a legal transition")));
        }
        run.status = to;
        *run = self.deps.repository.update(run.clone()).await?;
        self.event_bus
            .publish(mta_contracts::events::DomainEvent::TestStatusChanged {
                test_id: run.test_id,
                previous_status: from,
                new_status: to,
                timestamp: chrono::Utc::now(),
            })
            .await;
        Ok(())
    }

    /// Creates the target bot plus one bot per testing agent, and persists a [`TestingAgent`]
    /// record for each so the behaviour loop (`§4.3`) and cleanup (`§4.5`) have somewhere to
    /// read and update agent state from instead of carrying it only on the stack.
    async fn provision_bots(&self, run: &mut TestRun) -> Result<()> {
        let target_bot_id = self
            .deps
            .game_client
            .create_bot(
                &format!("target-{}", run.test_id),
                &self.config.minecraft_host,
                self.config.minecraft_port,
                self.config.minecraft_version.as_deref(),
                Some(SpawnTeleport { x: 0.0, y: 64.0, z: 0.0, yaw: 0.0 }),
            )
            .await?;
        run.target_bot_id = Some(target_bot_id);
        *run = self.deps.repository.update(run.clone()).await?;

        for (i, agent_id) in run.testing_agent_ids.clone().into_iter().enumerate() {
            let profile =
                run.testing_agent_profiles.get(i).copied().unwrap_or(mta_contracts::scenario::Profile::Follower);
            let table = mta_core::registry::lookup_profile(profile);

            let bot_id = self
                .deps
                .game_client
                .create_bot(
                    &format!("tester-{}-{i}", run.test_id),
                    &self.config.minecraft_host,
                    self.config.minecraft_port,
                    self.config.minecraft_version.as_deref(),
                    Some(SpawnTeleport { x: 2.0 + i as f64, y: 64.0, z: 0.0, yaw: 0.0 }),
                )
                .await?;

            let mut agent = TestingAgent::new(run.test_id, profile, table.description.clone(), run.config.behavior_intensity);
            agent.agent_id = agent_id;
            agent.minecraft_bot_id = Some(bot_id);
            agent.status = TestingAgentStatus::Active;
            agent.spawned_at = Some(chrono::Utc::now());
            self.deps.repository.create_agent(agent).await?;
        }
        Ok(())
    }

    async fn drive(
        self,
        mut run: TestRun,
        mut cancel_rx: watch::Receiver<bool>,
        reason_tx: mpsc::Sender<CompletionReason>,
        reason_rx: mpsc::Receiver<CompletionReason>,
    ) {
        let test_id = run.test_id;

        let outcome = self.run_lifecycle(&mut run, &mut cancel_rx, reason_tx, reason_rx).await;
        let reason = match outcome {
            Ok(reason) => reason,
            Err(e) => {
                warn!(test_id = %test_id, error = %e, "test run failed during orchestration");
                CompletionReason::Error
            }
        };

        let _ = cancel_rx.has_changed();
        let cleanup_ctx = CleanupContext {
            game_client: self.deps.game_client.clone(),
            voice: self.deps.voice.clone(),
            repository: self.deps.repository.clone(),
            event_bus: self.event_bus.clone(),
        };
        cleanup::run(&cleanup_ctx, run, reason).await;
    }

    async fn run_lifecycle(
        &self,
        run: &mut TestRun,
        cancel_rx: &mut watch::Receiver<bool>,
        reason_tx: mpsc::Sender<CompletionReason>,
        mut reason_rx: mpsc::Receiver<CompletionReason>,
    ) -> Result<CompletionReason> {
        self.transition(run, TestRunStatus::Initializing).await?;
        self.provision_bots(run).await?;

        if self.config.voice_enabled() {
            if let (Some(voice), Some(guild_id)) = (&self.deps.voice, &self.config.discord_guild_id) {
                let channels = voice.ensure_test_session_channels(guild_id, run.test_id).await?;
                voice.join_voice(guild_id, &channels.voice_channel_id).await?;
                run.discord_text_channel_id = Some(channels.text_channel_id);
                run.discord_voice_channel_id = Some(channels.voice_channel_id);
                *run = self.deps.repository.update(run.clone()).await?;
            }
        }

        self.transition(run, TestRunStatus::Coordination).await?;
        tokio::time::sleep(Duration::from_secs(run.config.coordination_phase_seconds)).await;

        self.transition(run, TestRunStatus::Executing).await?;
        run.started_at = Some(chrono::Utc::now());
        *run = self.deps.repository.update(run.clone()).await?;

        let scenario = lookup_scenario(run.scenario_type).ok_or_else(|| {
            EngineError::InvalidScenario(run.scenario_type.to_string())
        })?;

        let (loop_cancel_tx, loop_cancel_rx) = watch::channel(false);
        let mut handles = Vec::new();

        let (voice, guild_id) = if self.config.voice_enabled() {
            (self.deps.voice.clone(), self.config.discord_guild_id.clone())
        } else {
            (None, None)
        };

        let target_ctx = TargetLoopContext {
            test_id: run.test_id,
            target_agent_id: run.target_agent_id,
            bot_id: run.target_bot_id.clone().unwrap_or_default(),
            model: run.target_llm_model.clone(),
            objective: scenario.objective_prompt.clone(),
            tick_interval: Duration::from_millis(run.config.llm_polling_interval_ms),
            game_client: self.deps.game_client.clone(),
            llm_provider: self.deps.llm_provider.clone(),
            repository: self.deps.repository.clone(),
            event_bus: self.event_bus.clone(),
            voice,
            guild_id,
        };
        handles.push(tokio::spawn(target_loop::run(target_ctx, loop_cancel_rx.clone())));

        for agent_id in run.testing_agent_ids.clone() {
            let agent = self
                .deps
                .repository
                .find_agent(agent_id)
                .await?
                .ok_or_else(|| EngineError::Internal(anyhow::anyhow!("provisioned agent {agent_id} went missing")))?;
            let table = mta_core::registry::lookup_profile(agent.profile);
            let start_offset = if agent.profile == mta_contracts::scenario::Profile::Leader {
                Duration::ZERO
            } else {
                Duration::from_secs(run.config.non_leader_start_offset_seconds)
            };
            let behaviour_ctx = BehaviourLoopContext {
                test_id: run.test_id,
                agent_id,
                bot_id: agent.minecraft_bot_id.clone().unwrap_or_default(),
                profile: agent.profile,
                tick_interval: Duration::from_millis(table.action_frequency.tick_interval_ms()),
                start_offset,
                mediate_to_rebel: vec!["Let's not fight about this.".to_string()],
                mediate_to_leader: vec!["They'll come around, give it a moment.".to_string()],
                game_client: self.deps.game_client.clone(),
                repository: self.deps.repository.clone(),
                event_bus: self.event_bus.clone(),
            };
            handles.push(tokio::spawn(behaviour_loop::run(behaviour_ctx, loop_cancel_rx.clone())));
        }

        let detector_repository = self.deps.repository.clone();
        let criteria = scenario.success_criteria.clone();
        let poll_interval = Duration::from_secs(run.config.criteria_poll_seconds);
        let detector_cancel_rx = loop_cancel_rx.clone();
        let detector_reason_tx = reason_tx.clone();
        let detector_test_id = run.test_id;
        tokio::spawn(async move {
            if let Some(reason) =
                completion_detector::run(detector_test_id, criteria, poll_interval, detector_repository, detector_cancel_rx).await
            {
                let _ = detector_reason_tx.send(reason).await;
            }
        });

        let reason = tokio::select! {
            Some(reason) = reason_rx.recv() => reason,
            _ = cancel_rx.changed() => CompletionReason::ManualStop,
        };

        let _ = loop_cancel_tx.send(true);
        for handle in handles {
            let _ = handle.await;
        }

        Ok(reason)
    }
}
