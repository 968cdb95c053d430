//! `§4.3` Testing-Agent Behaviour Loop: drives one testing agent's scripted/randomised
//! disruption or cooperation pattern against the target, independent of the target's own
//! decision loop.

use std::sync::Arc;
use std::time::Duration;

use mta_contracts::action_log::{ActionCategory, SourceType};
use mta_contracts::agent::TestingAgentStatus;
use mta_contracts::events::{ChatChannel, DomainEvent};
use mta_contracts::metrics::MetricField;
use mta_contracts::scenario::Profile;
use mta_contracts::ActionLog;
use mta_core::behaviour::{select_behaviour, MessageRotation, RandRoll, Selection};
use mta_core::traits::GameClient;
use mta_core::traits::Repository;
use tracing::warn;
use uuid::Uuid;

use crate::event_bus::EventBus;
use crate::movement::random_bearing_drift;

pub struct BehaviourLoopContext {
    pub test_id: Uuid,
    pub agent_id: Uuid,
    pub bot_id: String,
    pub profile: Profile,
    pub tick_interval: Duration,
    pub start_offset: Duration,
    pub mediate_to_rebel: Vec<String>,
    pub mediate_to_leader: Vec<String>,
    pub game_client: Arc<dyn GameClient>,
    pub repository: Arc<dyn Repository>,
    pub event_bus: Arc<EventBus>,
}

/// Runs the action named by `action_tag` as a chat line, since this crate has no dedicated
/// Minecraft-behaviour executor: behaviour tags narrate intent (`§4.3.1`), and the concrete
/// motor primitive is whichever of the allowed actions (`§4.2`) best expresses it.
async fn execute_behaviour_action(ctx: &BehaviourLoopContext, action_tag: &str) -> bool {
    let state = match ctx.game_client.get_state(&ctx.bot_id).await {
        Ok(s) => s,
        Err(e) => {
            warn!(test_id = %ctx.test_id, error = %e, "failed to read testing-agent state");
            return false;
        }
    };

    if action_tag.contains("chest") {
        if let Some((x, y, z)) = ctx
            .game_client
            .find_nearest_block(&ctx.bot_id, "chest", 32.0)
            .await
            .unwrap_or(None)
        {
            if let Ok(handle) = ctx.game_client.open_container(&ctx.bot_id, x, y, z).await {
                let withdrew = handle.withdraw("oak_planks", 4).await.unwrap_or(0);
                let _ = handle.close().await;
                return withdrew > 0;
            }
        }
        return false;
    }

    if action_tag.contains("break") {
        let target = (state.position.x, state.position.y - 1.0, state.position.z);
        return ctx.game_client.dig(&ctx.bot_id, target.0, target.1, target.2).await.unwrap_or(false);
    }

    if action_tag.contains("place") {
        let target = (state.position.x + 1.0, state.position.y, state.position.z);
        return ctx
            .game_client
            .place_block(&ctx.bot_id, target.0, target.1, target.2, (0.0, 1.0, 0.0))
            .await
            .unwrap_or(false);
    }

    // Coordination/assist/follow/announce behaviours are narrated via a walk forward,
    // which is observable in the world without requiring a specific target.
    ctx.game_client.walk_forward(&ctx.bot_id, 500).await.unwrap_or(false)
}

async fn record_action(ctx: &BehaviourLoopContext, action_tag: &str, success: bool) -> mta_core::error::Result<()> {
    let metrics = ctx.repository.increment_metric(ctx.test_id, MetricField::TestingAgentActionCount, 1).await?;
    ctx.repository
        .create_action_log(ActionLog::new(
            ctx.test_id,
            ctx.agent_id,
            SourceType::TestingAgent,
            ActionCategory::Minecraft,
            action_tag,
            serde_json::json!({ "profile": ctx.profile.as_str() }),
        ))
        .await?;
    ctx.event_bus
        .publish(DomainEvent::AgentAction {
            test_id: ctx.test_id,
            source_agent_id: ctx.agent_id,
            source_type: SourceType::TestingAgent,
            action_type: action_tag.to_string(),
            success,
            timestamp: chrono::Utc::now(),
        })
        .await;
    ctx.event_bus.publish(DomainEvent::metrics_updated(ctx.test_id, &metrics, chrono::Utc::now())).await;
    Ok(())
}

async fn record_chat(ctx: &BehaviourLoopContext, message: &str) -> mta_core::error::Result<()> {
    let _ = ctx.game_client.send_chat(&ctx.bot_id, message).await;
    let metrics = ctx.repository.increment_metric(ctx.test_id, MetricField::TestingAgentMessageCount, 1).await?;
    ctx.event_bus
        .publish(DomainEvent::TestChatMessage {
            test_id: ctx.test_id,
            source_agent_id: ctx.agent_id,
            source_type: SourceType::TestingAgent,
            channel: ChatChannel::Text,
            message: message.to_string(),
            timestamp: chrono::Utc::now(),
        })
        .await;
    ctx.event_bus.publish(DomainEvent::metrics_updated(ctx.test_id, &metrics, chrono::Utc::now())).await;
    Ok(())
}

/// `§4.3`: non-leader testing agents wait `start_offset` before their first tick so the
/// leader's opening script lands first.
pub async fn run(ctx: BehaviourLoopContext, mut cancel: tokio::sync::watch::Receiver<bool>) {
    tokio::time::sleep(ctx.start_offset).await;

    let mut roll = RandRoll;
    let mut rotation = MessageRotation::default();
    let mut interval = tokio::time::interval(ctx.tick_interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let state = match ctx.game_client.get_state(&ctx.bot_id).await {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(test_id = %ctx.test_id, error = %e, "failed to read testing-agent state, skipping tick");
                        continue;
                    }
                };
                let mut agent = match ctx.repository.find_agent(ctx.agent_id).await {
                    Ok(Some(agent)) if agent.status == TestingAgentStatus::Active => agent,
                    Ok(Some(agent)) => {
                        warn!(test_id = %ctx.test_id, status = ?agent.status, "testing agent is not active, skipping tick");
                        continue;
                    }
                    Ok(None) => {
                        warn!(test_id = %ctx.test_id, agent_id = %ctx.agent_id, "testing agent record missing, skipping tick");
                        continue;
                    }
                    Err(e) => {
                        warn!(test_id = %ctx.test_id, error = %e, "failed to read testing-agent record, skipping tick");
                        continue;
                    }
                };
                let has_planks = state.has_item_matching("planks");

                match select_behaviour(ctx.profile, agent.action_count, has_planks, &mut roll) {
                    Selection::Action(tag) => {
                        let success = execute_behaviour_action(&ctx, &tag).await;
                        if let Err(e) = record_action(&ctx, &tag, success).await {
                            warn!(test_id = %ctx.test_id, error = %e, "failed to record testing-agent action");
                        }
                    }
                    Selection::Chat(pool) => {
                        let lines = match pool {
                            mta_core::behaviour::ChatPool::MediateToRebel => &ctx.mediate_to_rebel,
                            mta_core::behaviour::ChatPool::MediateToLeader => &ctx.mediate_to_leader,
                        };
                        if let Some(message) = rotation.next(lines) {
                            let message = message.to_string();
                            if let Err(e) = record_chat(&ctx, &message).await {
                                warn!(test_id = %ctx.test_id, error = %e, "failed to record testing-agent chat");
                            }
                        }
                    }
                }

                // `§4.3` subtle drift: every tick, independent of the selected action/chat,
                // the agent also nudges toward a random bearing so it never looks frozen.
                let drift_ms = 600 + (rand::random::<f64>() * 800.0) as u64;
                let _ = random_bearing_drift(&ctx.game_client, &ctx.bot_id, state.position, 3.0, drift_ms).await;

                agent.action_count += 1;
                agent.last_action_at = Some(chrono::Utc::now());
                if let Err(e) = ctx.repository.update_agent(agent).await {
                    warn!(test_id = %ctx.test_id, error = %e, "failed to persist testing-agent tick state");
                }
            }
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    break;
                }
            }
        }
    }
}
