//! `§4.9` Prompt Builder: a pure function of `(objective, BotState, recent chat)`.

use std::collections::BTreeSet;

use crate::game::{BotState, ChatMessage};

const ALLOWED_ACTIONS: &[&str] = &[
    "move-to{x,y,z}",
    "open-container{x,y,z}",
    "jump",
    "dig{x,y,z}",
    "place-block{x,y,z}",
    "send-chat{message}",
    "look-at{x,y,z}",
    "equip{itemName}",
    "attack{target}",
];

pub fn build_system_prompt(objective: &str) -> String {
    let actions = ALLOWED_ACTIONS.join(", ");
    format!(
        "You are a Minecraft agent being evaluated. Objective: {objective}\n\n\
         Respond with a single JSON object and nothing else:\n\
         {{\"reasoning\": string, \"actions\": [{{\"type\": string, ...}}], \"chat\": string | null, \"speak\": string | null}}\n\n\
         Allowed action types: {actions}.\n\
         Propose at most 3 actions per response. Unknown action types are ignored."
    )
}

/// `§4.9`: nearby players are inferred from the last 10 chat senders.
fn nearby_players(chat: &[ChatMessage]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    for msg in chat.iter().rev().take(10) {
        seen.insert(msg.sender.clone());
    }
    seen.into_iter().collect()
}

pub fn build_user_prompt(state: &BotState, recent_chat: &[ChatMessage]) -> String {
    let (x, y, z) = state.position.rounded();
    let mut lines = vec![
        format!("Position: ({x}, {y}, {z})"),
        format!("Health: {:.0}/20", state.health),
        format!("Food: {:.0}/20", state.food),
    ];

    lines.push("Inventory:".to_string());
    if state.inventory.is_empty() {
        lines.push("  (empty)".to_string());
    } else {
        for item in &state.inventory {
            lines.push(format!("  - {} x{} (slot {})", item.name, item.count, item.slot));
        }
    }

    let players = nearby_players(recent_chat);
    if players.is_empty() {
        lines.push("Nearby players: (none observed)".to_string());
    } else {
        lines.push(format!("Nearby players: {}", players.join(", ")));
    }

    lines.push("Recent chat:".to_string());
    let tail_start = recent_chat.len().saturating_sub(10);
    if recent_chat[tail_start..].is_empty() {
        lines.push("  (no recent chat)".to_string());
    } else {
        for msg in &recent_chat[tail_start..] {
            lines.push(format!("  {}: {}", msg.sender, msg.message));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Position;
    use chrono::Utc;

    fn state() -> BotState {
        BotState {
            bot_id: "bot-1".into(),
            position: Position { x: 10.4, y: 64.6, z: -3.2 },
            yaw: 0.0,
            pitch: 0.0,
            health: 18.0,
            food: 15.0,
            inventory: vec![],
            last_updated_at: Utc::now(),
        }
    }

    #[test]
    fn system_prompt_contains_objective_and_contract() {
        let prompt = build_system_prompt("build a house");
        assert!(prompt.contains("build a house"));
        assert!(prompt.contains("\"reasoning\""));
        assert!(prompt.contains("move-to{x,y,z}"));
        assert!(prompt.contains("at most 3"));
    }

    #[test]
    fn user_prompt_rounds_position_and_reports_vitals() {
        let prompt = build_user_prompt(&state(), &[]);
        assert!(prompt.contains("Position: (10, 65, -3)"));
        assert!(prompt.contains("Health: 18/20"));
        assert!(prompt.contains("Food: 15/20"));
        assert!(prompt.contains("(no recent chat)"));
    }

    #[test]
    fn user_prompt_is_deterministic() {
        let chat = vec![ChatMessage { sender: "alice".into(), message: "hi".into(), timestamp: Utc::now() }];
        let a = build_user_prompt(&state(), &chat);
        let b = build_user_prompt(&state(), &chat);
        assert_eq!(a, b);
    }

    #[test]
    fn user_prompt_truncates_chat_to_last_ten_and_players_to_last_ten_senders() {
        let chat: Vec<ChatMessage> = (0..15)
            .map(|i| ChatMessage { sender: format!("p{i}"), message: format!("msg{i}"), timestamp: Utc::now() })
            .collect();
        let prompt = build_user_prompt(&state(), &chat);
        assert!(!prompt.contains("p4:"));
        assert!(prompt.contains("p14: msg14"));
    }
}
