//! `§4.2` Target-Agent Decision Loop: poll the target bot's state, prompt the LLM under
//! test, parse its decision, execute whatever actions survive parsing, and record the tick.

use std::sync::Arc;
use std::time::Duration;

use mta_contracts::action_log::{ActionCategory, SourceType};
use mta_contracts::events::DomainEvent;
use mta_contracts::metrics::MetricField;
use mta_contracts::ActionLog;
use mta_core::error::Result;
use mta_core::game::{ChatMessage, GameAction};
use mta_core::llm_parser::parse_decision;
use mta_core::prompt::{build_system_prompt, build_user_prompt};
use mta_core::traits::{ChatRequest, GameClient, LlmMessage, LlmProvider, Repository, VoiceCoordinator};
use tracing::{info, warn};
use uuid::Uuid;

use crate::event_bus::EventBus;
use crate::movement::random_bearing_drift;

pub struct TargetLoopContext {
    pub test_id: Uuid,
    pub target_agent_id: Uuid,
    pub bot_id: String,
    pub model: String,
    pub objective: String,
    pub tick_interval: Duration,
    pub game_client: Arc<dyn GameClient>,
    pub llm_provider: Arc<dyn LlmProvider>,
    pub repository: Arc<dyn Repository>,
    pub event_bus: Arc<EventBus>,
    /// `§4.2` step 10: only `Some` when the deployment has a voice coordinator wired and
    /// `EngineConfig::voice_enabled` is true.
    pub voice: Option<Arc<dyn VoiceCoordinator>>,
    pub guild_id: Option<String>,
}

/// One tick of `§4.2`: steps 1-6 run in sequence; any failure short-circuits to an
/// `llm_error_count` increment plus a `TestError` event rather than propagating — a single
/// bad tick must not kill the loop (`§4.2` edge case: LLM errors are tolerated up to a rate
/// threshold, not treated as fatal).
async fn run_tick(ctx: &TargetLoopContext, recent_chat: &mut Vec<ChatMessage>) -> Result<()> {
    let state = ctx.game_client.get_state(&ctx.bot_id).await?;
    let fresh_chat = ctx.game_client.recent_chat(&ctx.bot_id, 20).await.unwrap_or_default();
    *recent_chat = fresh_chat;

    let system = build_system_prompt(&ctx.objective);
    let user = build_user_prompt(&state, recent_chat);

    let request = ChatRequest {
        model: ctx.model.clone(),
        system,
        messages: vec![LlmMessage { role: "user", content: user }],
        temperature: 0.7,
        max_tokens: 800,
    };

    let started = std::time::Instant::now();
    let response = match ctx.llm_provider.chat(request).await {
        Ok(r) => r,
        Err(e) => {
            warn!(test_id = %ctx.test_id, error = %e, "target LLM call failed");
            ctx.repository.increment_metric(ctx.test_id, MetricField::LlmErrorCount, 1).await?;
            ctx.event_bus
                .publish(DomainEvent::TestError {
                    test_id: ctx.test_id,
                    message: e.to_string(),
                    fatal: false,
                    timestamp: chrono::Utc::now(),
                })
                .await;
            return Ok(());
        }
    };
    let response_time_ms = started.elapsed().as_millis() as u64;

    let decision = match parse_decision(&response.text) {
        Some(d) => d,
        None => {
            warn!(test_id = %ctx.test_id, "target LLM reply had no parsable JSON object");
            ctx.repository.increment_metric(ctx.test_id, MetricField::LlmErrorCount, 1).await?;
            return Ok(());
        }
    };

    ctx.repository.increment_metric(ctx.test_id, MetricField::LlmDecisionCount, 1).await?;
    let metrics = ctx
        .repository
        .increment_metric(ctx.test_id, MetricField::TotalLlmResponseTimeMs, response_time_ms)
        .await?;
    ctx.repository.update_metric_timestamp(ctx.test_id, chrono::Utc::now()).await?;
    ctx.event_bus.publish(DomainEvent::metrics_updated(ctx.test_id, &metrics, chrono::Utc::now())).await;

    for tag in &decision.dropped_action_types {
        info!(test_id = %ctx.test_id, action_type = %tag, "dropped unrecognised target action");
    }

    ctx.event_bus
        .publish(DomainEvent::TargetLlmDecision {
            test_id: ctx.test_id,
            reasoning: decision.reasoning.clone(),
            parsed_actions: decision.actions.iter().map(|a| a.type_tag().to_string()).collect(),
            response_time_ms,
            timestamp: chrono::Utc::now(),
        })
        .await;

    if decision.is_empty() {
        info!(test_id = %ctx.test_id, "target decision was empty, exploring instead");
        let success = random_bearing_drift(&ctx.game_client, &ctx.bot_id, state.position, 8.0, 1_500).await.unwrap_or(false);
        ctx.repository.increment_metric(ctx.test_id, MetricField::TargetActionCount, 1).await?;
        ctx.repository
            .create_action_log(ActionLog::new(
                ctx.test_id,
                ctx.target_agent_id,
                SourceType::Target,
                ActionCategory::Minecraft,
                "fallback-exploration",
                serde_json::json!({ "reasoning": decision.reasoning }),
            ))
            .await?;
        ctx.event_bus
            .publish(DomainEvent::AgentAction {
                test_id: ctx.test_id,
                source_agent_id: ctx.target_agent_id,
                source_type: SourceType::Target,
                action_type: "fallback-exploration".to_string(),
                success,
                timestamp: chrono::Utc::now(),
            })
            .await;
    }

    for action in &decision.actions {
        let success = execute_action(ctx, &state.bot_id, action).await;
        ctx.repository.increment_metric(ctx.test_id, MetricField::TargetActionCount, 1).await?;
        ctx.repository
            .create_action_log(ActionLog::new(
                ctx.test_id,
                ctx.target_agent_id,
                SourceType::Target,
                ActionCategory::Minecraft,
                action.type_tag(),
                serde_json::json!({ "reasoning": decision.reasoning }),
            ))
            .await?;
        ctx.event_bus
            .publish(DomainEvent::AgentAction {
                test_id: ctx.test_id,
                source_agent_id: ctx.target_agent_id,
                source_type: SourceType::Target,
                action_type: action.type_tag().to_string(),
                success,
                timestamp: chrono::Utc::now(),
            })
            .await;
    }

    if let Some(chat) = decision.chat.filter(|c| !c.is_empty()) {
        let success = ctx.game_client.send_chat(&ctx.bot_id, &chat).await.unwrap_or(false);
        ctx.repository.increment_metric(ctx.test_id, MetricField::TargetMessageCount, 1).await?;
        ctx.event_bus
            .publish(DomainEvent::TestChatMessage {
                test_id: ctx.test_id,
                source_agent_id: ctx.target_agent_id,
                source_type: SourceType::Target,
                channel: mta_contracts::events::ChatChannel::Text,
                message: chat,
                timestamp: chrono::Utc::now(),
            })
            .await;
        let _ = success;
    }

    if let Some(speak) = decision.speak.filter(|s| !s.is_empty()) {
        if let (Some(voice), Some(guild_id)) = (&ctx.voice, &ctx.guild_id) {
            match voice.speak_as_agent(guild_id, ctx.target_agent_id, &speak).await {
                Ok(()) => {
                    ctx.event_bus
                        .publish(DomainEvent::TestChatMessage {
                            test_id: ctx.test_id,
                            source_agent_id: ctx.target_agent_id,
                            source_type: SourceType::Target,
                            channel: mta_contracts::events::ChatChannel::Voice,
                            message: speak,
                            timestamp: chrono::Utc::now(),
                        })
                        .await;
                }
                Err(e) => {
                    warn!(test_id = %ctx.test_id, error = %e, "failed to request TTS playback");
                }
            }
        }
    }

    Ok(())
}

async fn execute_action(ctx: &TargetLoopContext, bot_id: &str, action: &GameAction) -> bool {
    let result = match action {
        GameAction::MoveTo { x, y, z } => ctx.game_client.pathfind_to(bot_id, *x, *y, *z, 1.5).await,
        GameAction::OpenContainer { x, y, z } => {
            ctx.game_client.open_container(bot_id, *x, *y, *z).await.map(|_| true)
        }
        GameAction::Jump => ctx.game_client.jump(bot_id).await,
        GameAction::Dig { x, y, z } => ctx.game_client.dig(bot_id, *x, *y, *z).await,
        GameAction::PlaceBlock { x, y, z } => {
            ctx.game_client.place_block(bot_id, *x, *y, *z, (0.0, 1.0, 0.0)).await
        }
        GameAction::SendChat { message } => ctx.game_client.send_chat(bot_id, message).await,
        GameAction::LookAt { x, y, z } => ctx.game_client.look_at(bot_id, *x, *y, *z).await,
        GameAction::Equip { item_name } => ctx.game_client.equip(bot_id, item_name).await,
        GameAction::Attack { target } => ctx.game_client.attack(bot_id, target).await,
    };

    match result {
        Ok(success) => success,
        Err(e) => {
            warn!(test_id = %ctx.test_id, action = action.type_tag(), error = %e, "action execution failed");
            false
        }
    }
}

/// Drives `run_tick` on `ctx.tick_interval` until `cancel` fires (`§4.2`: "runs until the
/// test completes or is stopped").
pub async fn run(ctx: TargetLoopContext, mut cancel: tokio::sync::watch::Receiver<bool>) {
    let mut recent_chat = Vec::new();
    let mut interval = tokio::time::interval(ctx.tick_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_tick(&ctx, &mut recent_chat).await {
                    warn!(test_id = %ctx.test_id, error = %e, "target loop tick failed");
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
