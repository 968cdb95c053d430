//! Postgres-backed `Repository` (`§6.6`), grounded on the teacher's `Database`/`sqlx::query_as`
//! pattern. Counter increments are plain arithmetic `UPDATE`s, so there is no read-modify-write
//! race even across multiple processes sharing one database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mta_contracts::metrics::MetricField;
use mta_contracts::run::TestRunStatus;
use mta_contracts::{ActionLog, TestMetrics, TestRun, TestingAgent};
use mta_core::error::{EngineError, Result};
use mta_core::traits::{Repository, RunFilters};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    action_category_as_str, agent_status_as_str, source_type_as_str, ActionLogRow, TestRunBindings,
    TestRunRow, TestingAgentRow,
};

#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn store_err(e: impl std::fmt::Display) -> EngineError {
    EngineError::store(e.to_string())
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create(&self, run: TestRun) -> Result<TestRun> {
        let bindings = TestRunBindings::from_domain(&run).map_err(store_err)?;

        sqlx::query(
            r#"
            INSERT INTO test_runs (
                test_id, scenario_type, status, target_llm_model, testing_agent_profiles,
                testing_agent_ids, target_agent_id, target_bot_id, discord_text_channel_id,
                discord_voice_channel_id, duration_seconds, created_at, started_at, ended_at,
                completion_reason, config
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(run.test_id)
        .bind(&bindings.scenario_type)
        .bind(&bindings.status)
        .bind(&run.target_llm_model)
        .bind(&bindings.testing_agent_profiles)
        .bind(&bindings.testing_agent_ids)
        .bind(run.target_agent_id)
        .bind(&run.target_bot_id)
        .bind(&run.discord_text_channel_id)
        .bind(&run.discord_voice_channel_id)
        .bind(run.duration_seconds as i32)
        .bind(run.created_at)
        .bind(run.started_at)
        .bind(run.ended_at)
        .bind(&bindings.completion_reason)
        .bind(&bindings.config)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(run)
    }

    async fn find_by_id(&self, test_id: Uuid) -> Result<Option<TestRun>> {
        let row = sqlx::query_as::<_, TestRunRow>("SELECT * FROM test_runs WHERE test_id = $1")
            .bind(test_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        row.map(|r| r.into_domain().map_err(store_err)).transpose()
    }

    async fn find_all(&self, filters: RunFilters) -> Result<Vec<TestRun>> {
        let status = filters.status.map(|s| s.to_string());
        let scenario_type = filters.scenario_type.map(|s| s.to_string());

        let rows = sqlx::query_as::<_, TestRunRow>(
            r#"
            SELECT * FROM test_runs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR scenario_type = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .bind(scenario_type)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(|r| r.into_domain().map_err(store_err)).collect()
    }

    async fn update(&self, run: TestRun) -> Result<TestRun> {
        let bindings = TestRunBindings::from_domain(&run).map_err(store_err)?;

        let result = sqlx::query(
            r#"
            UPDATE test_runs SET
                status = $2, target_bot_id = $3, discord_text_channel_id = $4,
                discord_voice_channel_id = $5, started_at = $6, ended_at = $7,
                completion_reason = $8, config = $9
            WHERE test_id = $1
            "#,
        )
        .bind(run.test_id)
        .bind(&bindings.status)
        .bind(&run.target_bot_id)
        .bind(&run.discord_text_channel_id)
        .bind(&run.discord_voice_channel_id)
        .bind(run.started_at)
        .bind(run.ended_at)
        .bind(&bindings.completion_reason)
        .bind(&bindings.config)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(EngineError::TestNotFound(run.test_id));
        }
        Ok(run)
    }

    async fn delete(&self, test_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM test_runs WHERE test_id = $1")
            .bind(test_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_action_log(&self, log: ActionLog) -> Result<ActionLog> {
        sqlx::query(
            r#"
            INSERT INTO action_logs (
                log_id, test_id, source_agent_id, source_type, action_category,
                action_detail, "timestamp", metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(log.log_id)
        .bind(log.test_id)
        .bind(log.source_agent_id)
        .bind(source_type_as_str(log.source_type))
        .bind(action_category_as_str(log.action_category))
        .bind(&log.action_detail)
        .bind(log.timestamp)
        .bind(&log.metadata)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(log)
    }

    async fn find_action_logs(&self, test_id: Uuid, limit: usize) -> Result<Vec<ActionLog>> {
        let rows = sqlx::query_as::<_, ActionLogRow>(
            r#"
            SELECT * FROM action_logs WHERE test_id = $1
            ORDER BY "timestamp" DESC
            LIMIT $2
            "#,
        )
        .bind(test_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut logs: Vec<ActionLog> =
            rows.into_iter().map(|r| r.into_domain().map_err(store_err)).collect::<Result<_>>()?;
        logs.reverse();
        Ok(logs)
    }

    async fn count(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM test_runs")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(count as usize)
    }

    async fn exists(&self, test_id: Uuid) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM test_runs WHERE test_id = $1)")
                .bind(test_id)
                .fetch_one(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(exists)
    }

    async fn count_active(&self) -> Result<usize> {
        let active: Vec<String> =
            [TestRunStatus::Initializing, TestRunStatus::Coordination, TestRunStatus::Executing]
                .iter()
                .map(|s| s.to_string())
                .collect();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM test_runs WHERE status = ANY($1)")
            .bind(&active)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(count as usize)
    }

    async fn increment_metric(&self, test_id: Uuid, field: MetricField, delta: u64) -> Result<TestMetrics> {
        let column = field.as_str();
        let sql = format!(
            "UPDATE test_runs SET {column} = {column} + $2 WHERE test_id = $1 RETURNING \
             llm_decision_count, target_action_count, testing_agent_action_count, \
             target_message_count, testing_agent_message_count, llm_error_count, \
             total_llm_response_time_ms, last_llm_decision_at"
        );

        let row: (i64, i64, i64, i64, i64, i64, i64, Option<DateTime<Utc>>) = sqlx::query_as(&sql)
            .bind(test_id)
            .bind(delta as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?
            .ok_or(EngineError::TestNotFound(test_id))?;

        Ok(TestMetrics {
            llm_decision_count: row.0 as u64,
            target_action_count: row.1 as u64,
            testing_agent_action_count: row.2 as u64,
            target_message_count: row.3 as u64,
            testing_agent_message_count: row.4 as u64,
            llm_error_count: row.5 as u64,
            total_llm_response_time_ms: row.6 as u64,
            last_llm_decision_at: row.7,
        })
    }

    async fn update_metric_timestamp(&self, test_id: Uuid, value: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE test_runs SET last_llm_decision_at = $2 WHERE test_id = $1")
            .bind(test_id)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(EngineError::TestNotFound(test_id));
        }
        Ok(())
    }

    async fn create_agent(&self, agent: TestingAgent) -> Result<TestingAgent> {
        sqlx::query(
            r#"
            INSERT INTO testing_agents (
                agent_id, test_id, profile, status, minecraft_bot_id, system_prompt,
                spawned_at, last_action_at, action_count, behavior_intensity
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(agent.agent_id)
        .bind(agent.test_id)
        .bind(agent.profile.to_string())
        .bind(agent_status_as_str(agent.status))
        .bind(&agent.minecraft_bot_id)
        .bind(&agent.system_prompt)
        .bind(agent.spawned_at)
        .bind(agent.last_action_at)
        .bind(agent.action_count as i64)
        .bind(agent.behavior_intensity)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(agent)
    }

    async fn find_agent(&self, agent_id: Uuid) -> Result<Option<TestingAgent>> {
        let row = sqlx::query_as::<_, TestingAgentRow>("SELECT * FROM testing_agents WHERE agent_id = $1")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        row.map(|r| r.into_domain().map_err(store_err)).transpose()
    }

    async fn find_agents_by_test(&self, test_id: Uuid) -> Result<Vec<TestingAgent>> {
        let rows = sqlx::query_as::<_, TestingAgentRow>("SELECT * FROM testing_agents WHERE test_id = $1")
            .bind(test_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        rows.into_iter().map(|r| r.into_domain().map_err(store_err)).collect()
    }

    async fn update_agent(&self, agent: TestingAgent) -> Result<TestingAgent> {
        let result = sqlx::query(
            r#"
            UPDATE testing_agents SET
                status = $2, minecraft_bot_id = $3, spawned_at = $4, last_action_at = $5,
                action_count = $6
            WHERE agent_id = $1
            "#,
        )
        .bind(agent.agent_id)
        .bind(agent_status_as_str(agent.status))
        .bind(&agent.minecraft_bot_id)
        .bind(agent.spawned_at)
        .bind(agent.last_action_at)
        .bind(agent.action_count as i64)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(EngineError::validation(format!("unknown testing agent: {}", agent.agent_id)));
        }
        Ok(agent)
    }
}
