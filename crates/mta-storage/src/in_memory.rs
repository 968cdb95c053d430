//! In-memory `Repository` (`§6.6`): the default backend, fast but not durable across
//! process restarts. Grounded on the worker crate's `Arc<RwLock<HashMap<...>>>` runner
//! bookkeeping — the same shape, applied to the run aggregate instead of task handles.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mta_contracts::metrics::MetricField;
use mta_contracts::{ActionLog, TestMetrics, TestRun, TestingAgent};
use mta_core::error::{EngineError, Result};
use mta_core::traits::{Repository, RunFilters};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    runs: HashMap<Uuid, TestRun>,
    action_logs: HashMap<Uuid, Vec<ActionLog>>,
    agents: HashMap<Uuid, TestingAgent>,
}

/// All mutation goes through a single `RwLock`, so `increment_metric` is a lock-held
/// read-modify-write and cannot lose a concurrent update (`§4.7`).
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create(&self, run: TestRun) -> Result<TestRun> {
        let mut inner = self.inner.write().await;
        inner.runs.insert(run.test_id, run.clone());
        Ok(run)
    }

    async fn find_by_id(&self, test_id: Uuid) -> Result<Option<TestRun>> {
        Ok(self.inner.read().await.runs.get(&test_id).cloned())
    }

    async fn find_all(&self, filters: RunFilters) -> Result<Vec<TestRun>> {
        let inner = self.inner.read().await;
        let mut runs: Vec<TestRun> = inner
            .runs
            .values()
            .filter(|r| filters.status.map(|s| r.status == s).unwrap_or(true))
            .filter(|r| filters.scenario_type.map(|st| r.scenario_type == st).unwrap_or(true))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    async fn update(&self, run: TestRun) -> Result<TestRun> {
        let mut inner = self.inner.write().await;
        if !inner.runs.contains_key(&run.test_id) {
            return Err(EngineError::TestNotFound(run.test_id));
        }
        inner.runs.insert(run.test_id, run.clone());
        Ok(run)
    }

    async fn delete(&self, test_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        inner.action_logs.remove(&test_id);
        Ok(inner.runs.remove(&test_id).is_some())
    }

    async fn create_action_log(&self, log: ActionLog) -> Result<ActionLog> {
        let mut inner = self.inner.write().await;
        inner.action_logs.entry(log.test_id).or_default().push(log.clone());
        Ok(log)
    }

    async fn find_action_logs(&self, test_id: Uuid, limit: usize) -> Result<Vec<ActionLog>> {
        let inner = self.inner.read().await;
        let logs = inner.action_logs.get(&test_id).cloned().unwrap_or_default();
        let start = logs.len().saturating_sub(limit);
        Ok(logs[start..].to_vec())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.inner.read().await.runs.len())
    }

    async fn exists(&self, test_id: Uuid) -> Result<bool> {
        Ok(self.inner.read().await.runs.contains_key(&test_id))
    }

    async fn count_active(&self) -> Result<usize> {
        Ok(self.inner.read().await.runs.values().filter(|r| r.status.is_active()).count())
    }

    async fn increment_metric(&self, test_id: Uuid, field: MetricField, delta: u64) -> Result<TestMetrics> {
        let mut inner = self.inner.write().await;
        let run = inner.runs.get_mut(&test_id).ok_or(EngineError::TestNotFound(test_id))?;
        run.metrics.apply(field, delta);
        Ok(run.metrics.clone())
    }

    async fn update_metric_timestamp(&self, test_id: Uuid, value: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let run = inner.runs.get_mut(&test_id).ok_or(EngineError::TestNotFound(test_id))?;
        run.metrics.last_llm_decision_at = Some(value);
        Ok(())
    }

    async fn create_agent(&self, agent: TestingAgent) -> Result<TestingAgent> {
        let mut inner = self.inner.write().await;
        inner.agents.insert(agent.agent_id, agent.clone());
        Ok(agent)
    }

    async fn find_agent(&self, agent_id: Uuid) -> Result<Option<TestingAgent>> {
        Ok(self.inner.read().await.agents.get(&agent_id).cloned())
    }

    async fn find_agents_by_test(&self, test_id: Uuid) -> Result<Vec<TestingAgent>> {
        Ok(self.inner.read().await.agents.values().filter(|a| a.test_id == test_id).cloned().collect())
    }

    async fn update_agent(&self, agent: TestingAgent) -> Result<TestingAgent> {
        let mut inner = self.inner.write().await;
        if !inner.agents.contains_key(&agent.agent_id) {
            return Err(EngineError::validation(format!("unknown testing agent: {}", agent.agent_id)));
        }
        inner.agents.insert(agent.agent_id, agent.clone());
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_contracts::run::{ScenarioType, TestRunStatus};

    fn sample_run(status: TestRunStatus) -> TestRun {
        TestRun {
            test_id: Uuid::now_v7(),
            scenario_type: ScenarioType::Cooperation,
            status,
            target_llm_model: "test-model".to_string(),
            testing_agent_profiles: vec![],
            testing_agent_ids: vec![],
            target_agent_id: Uuid::now_v7(),
            target_bot_id: None,
            discord_text_channel_id: None,
            discord_voice_channel_id: None,
            duration_seconds: 600,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            completion_reason: None,
            config: mta_contracts::config::TestRunConfig {
                llm_polling_interval_ms: 7_000,
                coordination_phase_seconds: 30,
                non_leader_start_offset_seconds: 12,
                criteria_poll_seconds: 5,
                behavior_intensity: 0.5,
            },
            metrics: TestMetrics::default(),
        }
    }

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let repo = InMemoryRepository::new();
        let run = sample_run(TestRunStatus::Created);
        let id = run.test_id;
        repo.create(run).await.unwrap();
        let found = repo.find_by_id(id).await.unwrap();
        assert_eq!(found.unwrap().test_id, id);
    }

    #[tokio::test]
    async fn increment_metric_is_read_modify_write_under_the_lock() {
        let repo = InMemoryRepository::new();
        let run = sample_run(TestRunStatus::Executing);
        let id = run.test_id;
        repo.create(run).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.increment_metric(id, MetricField::TargetActionCount, 1).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let metrics = repo.find_by_id(id).await.unwrap().unwrap().metrics;
        assert_eq!(metrics.target_action_count, 50);
    }

    #[tokio::test]
    async fn delete_removes_run_and_its_action_logs() {
        let repo = InMemoryRepository::new();
        let run = sample_run(TestRunStatus::Completed);
        let id = run.test_id;
        repo.create(run).await.unwrap();
        assert!(repo.delete(id).await.unwrap());
        assert!(repo.find_by_id(id).await.unwrap().is_none());
        assert!(!repo.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn count_active_only_counts_active_statuses() {
        let repo = InMemoryRepository::new();
        repo.create(sample_run(TestRunStatus::Executing)).await.unwrap();
        repo.create(sample_run(TestRunStatus::Completed)).await.unwrap();
        assert_eq!(repo.count_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_agents_by_test_only_returns_that_runs_agents() {
        use mta_contracts::agent::TestingAgentStatus;
        use mta_contracts::scenario::Profile;

        let repo = InMemoryRepository::new();
        let test_id = Uuid::now_v7();
        let other_test_id = Uuid::now_v7();

        let mut agent = TestingAgent::new(test_id, Profile::Leader, "leads".to_string(), 0.5);
        agent.status = TestingAgentStatus::Active;
        repo.create_agent(agent.clone()).await.unwrap();
        repo.create_agent(TestingAgent::new(other_test_id, Profile::Follower, "follows".to_string(), 0.5))
            .await
            .unwrap();

        let found = repo.find_agents_by_test(test_id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].agent_id, agent.agent_id);

        let mut updated = found[0].clone();
        updated.action_count += 1;
        repo.update_agent(updated).await.unwrap();
        let refetched = repo.find_agent(agent.agent_id).await.unwrap().unwrap();
        assert_eq!(refetched.action_count, 1);
    }
}
