//! Shapes describing the state of, and actions against, a Minecraft bot. The Game Client
//! itself is an external collaborator (`§6.3`); this module only models what crosses that
//! boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn rounded(&self) -> (i64, i64, i64) {
        (self.x.round() as i64, self.y.round() as i64, self.z.round() as i64)
    }

    /// A point `distance` blocks out along `bearing_rad`, holding `y` fixed (`§4.2` fallback
    /// exploration, `§4.3` subtle drift — both just need somewhere horizontal to walk toward).
    pub fn horizontal_offset(&self, distance: f64, bearing_rad: f64) -> (f64, f64) {
        (self.x + distance * bearing_rad.cos(), self.z + distance * bearing_rad.sin())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub slot: u32,
    pub name: String,
    pub count: u32,
}

/// Snapshot returned by `GameClient::get_state` (`§6.3`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotState {
    pub bot_id: String,
    pub position: Position,
    pub yaw: f32,
    pub pitch: f32,
    pub health: f32,
    pub food: f32,
    pub inventory: Vec<InventoryItem>,
    pub last_updated_at: chrono::DateTime<chrono::Utc>,
}

impl BotState {
    pub fn has_item_matching(&self, pattern: &str) -> bool {
        self.inventory
            .iter()
            .any(|item| item.count > 0 && item.name.contains(pattern))
    }

    pub fn count_matching(&self, pattern: &str) -> u32 {
        self.inventory
            .iter()
            .filter(|item| item.name.contains(pattern))
            .map(|item| item.count)
            .sum()
    }
}

/// One turn's worth of chat, keyed by sender, as retained in the recent-chat buffer (`§4.2`,
/// capped at 20 messages by the caller).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// `§4.2` allowed-action table. Unknown action types and actions with non-numeric
/// coordinates are dropped by [`GameAction::from_value`] rather than represented here.
#[derive(Debug, Clone, PartialEq)]
pub enum GameAction {
    MoveTo { x: f64, y: f64, z: f64 },
    OpenContainer { x: f64, y: f64, z: f64 },
    Jump,
    Dig { x: f64, y: f64, z: f64 },
    PlaceBlock { x: f64, y: f64, z: f64 },
    SendChat { message: String },
    LookAt { x: f64, y: f64, z: f64 },
    Equip { item_name: String },
    Attack { target: String },
}

impl GameAction {
    pub fn type_tag(&self) -> &'static str {
        match self {
            GameAction::MoveTo { .. } => "move-to",
            GameAction::OpenContainer { .. } => "open-container",
            GameAction::Jump => "jump",
            GameAction::Dig { .. } => "dig",
            GameAction::PlaceBlock { .. } => "place-block",
            GameAction::SendChat { .. } => "send-chat",
            GameAction::LookAt { .. } => "look-at",
            GameAction::Equip { .. } => "equip",
            GameAction::Attack { .. } => "attack",
        }
    }

    /// Coerces `value` (one element of the LLM decision's `actions[]`) into a `GameAction`.
    /// Returns `None` for an unknown `type`, a missing `type`, or coordinates that cannot be
    /// coerced to a number (`§4.2`: "non-numeric coordinates drop the action").
    pub fn from_value(value: &Value) -> Option<GameAction> {
        let ty = value.get("type")?.as_str()?;
        let coord = |key: &str| -> Option<f64> {
            match value.get(key)? {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
        };
        let xyz = || -> Option<(f64, f64, f64)> { Some((coord("x")?, coord("y")?, coord("z")?)) };
        let string_field = |key: &str| -> Option<String> {
            value.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
        };

        match ty {
            "move-to" => xyz().map(|(x, y, z)| GameAction::MoveTo { x, y, z }),
            "open-container" => xyz().map(|(x, y, z)| GameAction::OpenContainer { x, y, z }),
            "jump" => Some(GameAction::Jump),
            "dig" => xyz().map(|(x, y, z)| GameAction::Dig { x, y, z }),
            "place-block" => xyz().map(|(x, y, z)| GameAction::PlaceBlock { x, y, z }),
            "send-chat" => string_field("message").map(|message| GameAction::SendChat { message }),
            "look-at" => xyz().map(|(x, y, z)| GameAction::LookAt { x, y, z }),
            "equip" => string_field("itemName").map(|item_name| GameAction::Equip { item_name }),
            "attack" => string_field("target").map(|target| GameAction::Attack { target }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_string_coordinates_to_numbers() {
        let v = json!({"type": "move-to", "x": "10", "y": 64, "z": 20});
        assert_eq!(
            GameAction::from_value(&v),
            Some(GameAction::MoveTo { x: 10.0, y: 64.0, z: 20.0 })
        );
    }

    #[test]
    fn drops_action_with_non_numeric_coordinate() {
        let v = json!({"type": "move-to", "x": "north", "y": 64, "z": 20});
        assert_eq!(GameAction::from_value(&v), None);
    }

    #[test]
    fn unknown_type_is_dropped() {
        let v = json!({"type": "teleport-home"});
        assert_eq!(GameAction::from_value(&v), None);
    }

    #[test]
    fn jump_needs_no_fields() {
        let v = json!({"type": "jump"});
        assert_eq!(GameAction::from_value(&v), Some(GameAction::Jump));
    }

    #[test]
    fn horizontal_offset_moves_along_the_bearing() {
        let p = Position { x: 0.0, y: 64.0, z: 0.0 };
        let (x, z) = p.horizontal_offset(8.0, 0.0);
        assert!((x - 8.0).abs() < 1e-9);
        assert!(z.abs() < 1e-9);
    }

    #[test]
    fn send_chat_extracts_message() {
        let v = json!({"type": "send-chat", "message": "hello"});
        assert_eq!(
            GameAction::from_value(&v),
            Some(GameAction::SendChat { message: "hello".to_string() })
        );
    }
}
