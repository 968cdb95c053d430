//! Shared "walk toward a random horizontal bearing" primitive, used by both the target
//! loop's fallback exploration (`§4.2` step 6) and the behaviour loop's subtle drift
//! (`§4.3` step 6) — the two are the same motor primitive at different call sites.

use std::sync::Arc;

use mta_core::error::Result;
use mta_core::game::Position;
use mta_core::traits::GameClient;

/// Looks toward a random bearing `distance` blocks out from `position`, then walks forward
/// for `duration_ms`. Returns whatever `walk_forward` reports.
pub async fn random_bearing_drift(
    game_client: &Arc<dyn GameClient>,
    bot_id: &str,
    position: Position,
    distance: f64,
    duration_ms: u64,
) -> Result<bool> {
    let bearing = rand::random::<f64>() * std::f64::consts::TAU;
    let (x, z) = position.horizontal_offset(distance, bearing);
    game_client.look_at(bot_id, x, position.y, z).await?;
    game_client.walk_forward(bot_id, duration_ms).await
}
