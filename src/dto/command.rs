use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::game::GameSummary;

/// Chat update pushed by the platform adapter to `/webhook`.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct InboundUpdate {
    /// Chat room the message was posted in.
    pub chat_id: i64,
    /// Identity of the message author.
    pub user_id: i64,
    /// Public label of the author, captured for registrations.
    #[validate(length(min = 1))]
    pub display_name: String,
    /// Raw message text, expected to carry a command.
    #[validate(length(min = 1))]
    pub text: String,
}

/// Outcome of processing one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    /// The command ran and its effects are persisted.
    Accepted,
    /// The command was understood but rejected; the chat was told why.
    Rejected,
}

/// Acknowledgement returned to the platform adapter.
///
/// Rejections are still HTTP 200: the update was consumed and answered
/// in-chat, so the platform must not redeliver it.
#[derive(Debug, Serialize, ToSchema)]
pub struct CommandAck {
    /// Whether the command took effect.
    pub status: AckStatus,
    /// Why the command was rejected, when it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The affected game, when the command touched one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<GameSummary>,
}

impl CommandAck {
    /// Acknowledge a command that took effect.
    pub fn accepted() -> Self {
        Self {
            status: AckStatus::Accepted,
            reason: None,
            game: None,
        }
    }

    /// Acknowledge a command that was rejected for the given reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Rejected,
            reason: Some(reason.into()),
            game: None,
        }
    }

    /// Attach the affected game's summary.
    pub fn with_game(mut self, game: GameSummary) -> Self {
        self.game = Some(game);
        self
    }
}
