//! `§4.5` Cleanup Coordinator: tears down everything a test run reserved — bots, the voice
//! session, the event bus's subscriber list — once a completion reason is known. Runs exactly
//! once per test, after the loops for that test have been cancelled.

use std::sync::Arc;

use mta_contracts::agent::TestingAgentStatus;
use mta_contracts::events::DomainEvent;
use mta_contracts::run::CompletionReason;
use mta_contracts::TestRun;
use mta_core::traits::{GameClient, Repository, VoiceCoordinator};
use tracing::{error, info};
use uuid::Uuid;

use crate::event_bus::EventBus;

pub struct CleanupContext {
    pub game_client: Arc<dyn GameClient>,
    pub voice: Option<Arc<dyn VoiceCoordinator>>,
    pub repository: Arc<dyn Repository>,
    pub event_bus: Arc<EventBus>,
}

/// `§4.5`: disconnect bots first (so the world stops changing), then leave voice, then
/// persist the terminal state, then emit `TestCompleted`, then drop the event bus's
/// subscriber list last — subscribers must see the completion event before being cut off.
pub async fn run(ctx: &CleanupContext, mut run: TestRun, reason: CompletionReason) {
    let test_id = run.test_id;

    match ctx.repository.find_agents_by_test(test_id).await {
        Ok(agents) => {
            for mut agent in agents {
                if let Some(bot_id) = &agent.minecraft_bot_id {
                    if let Err(e) = ctx.game_client.disconnect_bot(bot_id).await {
                        error!(test_id = %test_id, agent_id = %agent.agent_id, error = %e, "failed to disconnect testing-agent bot during cleanup");
                    }
                }
                agent.status = TestingAgentStatus::Terminated;
                if let Err(e) = ctx.repository.update_agent(agent).await {
                    error!(test_id = %test_id, error = %e, "failed to persist terminated testing agent during cleanup");
                }
            }
        }
        Err(e) => {
            error!(test_id = %test_id, error = %e, "failed to look up testing agents during cleanup");
        }
    }

    if let Some(bot_id) = &run.target_bot_id {
        if let Err(e) = ctx.game_client.disconnect_bot(bot_id).await {
            error!(test_id = %test_id, error = %e, "failed to disconnect target bot during cleanup");
        }
    }

    if let (Some(voice), Some(guild_id)) = (&ctx.voice, &run.discord_voice_channel_id) {
        if let Err(e) = voice.leave_voice(guild_id).await {
            error!(test_id = %test_id, error = %e, "failed to leave voice channel during cleanup");
        }
        for agent_id in run.testing_agent_ids.iter().chain(std::iter::once(&run.target_agent_id)) {
            let _ = voice.unregister_agent_voice(*agent_id).await;
        }
    }

    run.status = reason.terminal_status();
    run.completion_reason = Some(reason);
    run.ended_at = Some(chrono::Utc::now());

    if let Err(e) = ctx.repository.update(run).await {
        error!(test_id = %test_id, error = %e, "failed to persist terminal run state");
    }

    ctx.event_bus
        .publish(DomainEvent::TestCompleted { test_id, reason, timestamp: chrono::Utc::now() })
        .await;

    ctx.event_bus.drop_test(test_id).await;

    info!(test_id = %test_id, reason = %reason, "test run cleaned up");
}

/// `§6.1` `DELETE /api/tests/{id}`: refuses to delete an active run (`TEST_ACTIVE`); the
/// caller is expected to have already checked that via `Repository::find_by_id`.
pub async fn delete_test(repository: &dyn Repository, event_bus: &EventBus, test_id: Uuid) -> mta_core::error::Result<bool> {
    let deleted = repository.delete(test_id).await?;
    event_bus.drop_test(test_id).await;
    Ok(deleted)
}
