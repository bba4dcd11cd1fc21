use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{GameEntity, GameState},
    dto::format_system_time,
};

/// Projection of a game exposed in command acknowledgements.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSummary {
    /// Identifier to address the game in `/stop` and `/reset`.
    pub id: Uuid,
    /// Chat hosting the game.
    pub chat_id: i64,
    /// Gift currency.
    pub currency: String,
    /// Gift budget.
    pub amount: i64,
    /// Whether registration is still open.
    pub state: GameState,
    /// Creation timestamp, RFC3339.
    pub created_at: String,
}

impl From<GameEntity> for GameSummary {
    fn from(game: GameEntity) -> Self {
        Self {
            id: game.id,
            chat_id: game.chat_id,
            currency: game.currency,
            amount: game.amount,
            state: game.state,
            created_at: format_system_time(game.created_at),
        }
    }
}
