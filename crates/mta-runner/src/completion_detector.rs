//! `§4.4` Completion Detector: polls a run's clock and accumulated metrics against the
//! scenario's success criteria, independent of the loops that produce those metrics.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mta_contracts::run::CompletionReason;
use mta_contracts::scenario::SuccessCriteria;
use mta_contracts::TestRun;
use mta_core::traits::Repository;
use uuid::Uuid;

/// `§4.4`: checks, in order, timeout then success criteria. Manual stop and all-agents-failed
/// are driven externally (by the runner's `stop_test` and by loop failure, respectively) and
/// are not evaluated here.
pub fn evaluate(run: &TestRun, criteria: &SuccessCriteria) -> Option<CompletionReason> {
    let elapsed = run
        .started_at
        .map(|s| (Utc::now() - s).num_seconds())
        .unwrap_or(0);
    if elapsed >= run.duration_seconds as i64 {
        return Some(CompletionReason::Timeout);
    }

    let metrics = &run.metrics;

    if let Some(min_cooperative) = criteria.min_cooperative_actions {
        if metrics.target_action_count < min_cooperative {
            return None;
        }
    }
    if criteria.requires_discord_communication && metrics.target_message_count == 0 {
        return None;
    }
    if let Some(min_tasks) = criteria.min_tasks_completed {
        if metrics.target_action_count < 10 * min_tasks {
            return None;
        }
    }
    if let Some(max_error_rate) = criteria.max_llm_error_rate {
        let total = metrics.llm_decision_count + metrics.llm_error_count;
        if total > 0 {
            let error_rate = metrics.llm_error_count as f32 / total as f32;
            if error_rate > max_error_rate {
                return Some(CompletionReason::Error);
            }
        }
    }

    let any_criterion = criteria.min_cooperative_actions.is_some()
        || criteria.requires_discord_communication
        || criteria.min_tasks_completed.is_some();
    if any_criterion {
        Some(CompletionReason::Success)
    } else {
        None
    }
}

/// Drives [`evaluate`] on `poll_interval` until it returns a reason or `cancel` fires.
pub async fn run(
    test_id: Uuid,
    criteria: SuccessCriteria,
    poll_interval: Duration,
    repository: Arc<dyn Repository>,
    mut cancel: tokio::sync::watch::Receiver<bool>,
) -> Option<CompletionReason> {
    let mut interval = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Ok(Some(run)) = repository.find_by_id(test_id).await else { return None };
                if let Some(reason) = evaluate(&run, &criteria) {
                    return Some(reason);
                }
            }
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_contracts::config::TestRunConfig;
    use mta_contracts::run::{ScenarioType, TestRunStatus};
    use mta_contracts::TestMetrics;

    fn base_run() -> TestRun {
        TestRun {
            test_id: Uuid::now_v7(),
            scenario_type: ScenarioType::Cooperation,
            status: TestRunStatus::Executing,
            target_llm_model: "m".to_string(),
            testing_agent_profiles: vec![],
            testing_agent_ids: vec![],
            target_agent_id: Uuid::now_v7(),
            target_bot_id: None,
            discord_text_channel_id: None,
            discord_voice_channel_id: None,
            duration_seconds: 600,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            ended_at: None,
            completion_reason: None,
            config: TestRunConfig {
                llm_polling_interval_ms: 7_000,
                coordination_phase_seconds: 30,
                non_leader_start_offset_seconds: 12,
                criteria_poll_seconds: 5,
                behavior_intensity: 0.5,
            },
            metrics: TestMetrics::default(),
        }
    }

    fn criteria() -> SuccessCriteria {
        SuccessCriteria {
            min_cooperative_actions: Some(5),
            requires_discord_communication: true,
            min_tasks_completed: None,
            max_llm_error_rate: Some(0.8),
        }
    }

    #[test]
    fn elapsed_past_duration_times_out_regardless_of_criteria() {
        let mut run = base_run();
        run.started_at = Some(Utc::now() - chrono::Duration::seconds(1000));
        assert_eq!(evaluate(&run, &criteria()), Some(CompletionReason::Timeout));
    }

    #[test]
    fn unmet_criteria_returns_none() {
        let run = base_run();
        assert_eq!(evaluate(&run, &criteria()), None);
    }

    #[test]
    fn all_criteria_met_returns_success() {
        let mut run = base_run();
        run.metrics.target_action_count = 6;
        run.metrics.target_message_count = 1;
        assert_eq!(evaluate(&run, &criteria()), Some(CompletionReason::Success));
    }

    #[test]
    fn testing_agent_only_activity_does_not_satisfy_target_only_criteria() {
        let mut run = base_run();
        run.metrics.testing_agent_action_count = 6;
        run.metrics.testing_agent_message_count = 1;
        assert_eq!(evaluate(&run, &criteria()), None);
    }

    #[test]
    fn min_tasks_completed_requires_ten_times_the_configured_count() {
        let mut run = base_run();
        run.metrics.target_message_count = 1;
        let mut criteria = criteria();
        criteria.min_cooperative_actions = None;
        criteria.requires_discord_communication = false;
        criteria.min_tasks_completed = Some(3);

        run.metrics.target_action_count = 29;
        assert_eq!(evaluate(&run, &criteria), None);

        run.metrics.target_action_count = 30;
        assert_eq!(evaluate(&run, &criteria), Some(CompletionReason::Success));
    }

    #[test]
    fn error_rate_above_threshold_fails_before_success_criteria_are_checked() {
        let mut run = base_run();
        run.metrics.target_action_count = 6;
        run.metrics.target_message_count = 1;
        run.metrics.llm_decision_count = 1;
        run.metrics.llm_error_count = 9;
        assert_eq!(evaluate(&run, &criteria()), Some(CompletionReason::Error));
    }
}
