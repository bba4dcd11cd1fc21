use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Registration state of a persisted game.
///
/// A game that has been reset no longer exists in storage, so the two
/// remaining states describe whether registration is still open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    /// Registration is open and members may join.
    Open,
    /// Registration closed and pairs have been drawn.
    Closed,
}

/// Aggregate game entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Chat room the game belongs to. At most one non-reset game per chat.
    pub chat_id: i64,
    /// Currency of the gift budget, fixed at creation.
    pub currency: String,
    /// Gift budget, fixed at creation.
    pub amount: i64,
    /// Whether registration is still open.
    pub state: GameState,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the game entity was updated.
    pub updated_at: SystemTime,
}

impl GameEntity {
    /// Build a fresh open game for `chat_id` with the given gift terms.
    pub fn new(chat_id: i64, currency: String, amount: i64) -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            chat_id,
            currency,
            amount,
            state: GameState::Open,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A registered member of a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Primary key of the participant.
    pub id: Uuid,
    /// Owning game. Deleting the game deletes its participants.
    pub game_id: Uuid,
    /// External chat-platform identity; unique within a game.
    pub user_id: i64,
    /// Public label captured at join time.
    pub display_name: String,
    /// The participant this one gives a gift to, set when pairs are drawn.
    /// Never the participant's own id.
    pub assigned_to_id: Option<Uuid>,
    /// Whether the member held admin rights when joining. Informational only.
    pub is_admin: bool,
}

impl ParticipantEntity {
    /// Build an unassigned participant for `game_id`.
    pub fn new(game_id: Uuid, user_id: i64, display_name: String, is_admin: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id,
            user_id,
            display_name,
            assigned_to_id: None,
            is_admin,
        }
    }
}
