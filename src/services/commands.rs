//! Inbound chat-command parsing and dispatch.
//!
//! The transport hands over raw text; this module resolves it to a lifecycle
//! operation. Domain rejections are answered in-chat and acknowledged with a
//! `rejected` status so the platform does not redeliver the update; only
//! storage trouble propagates as an error.

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::{
    dto::command::{CommandAck, InboundUpdate},
    error::ServiceError,
    notifier::ChatNotification,
    services::lifecycle,
    state::SharedState,
};

/// A recognized chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start <currency> <amount>` — open registration.
    Start {
        /// Gift currency.
        currency: String,
        /// Gift budget.
        amount: i64,
    },
    /// `/join` — register in the open game.
    Join,
    /// `/stop [game_id]` — close registration and draw pairs.
    Stop {
        /// Explicit target game; the chat's open game when absent.
        game_id: Option<Uuid>,
    },
    /// `/reset [game_id]` — wipe the game.
    Reset {
        /// Explicit target game; the chat's game when absent.
        game_id: Option<Uuid>,
    },
}

/// Why a message could not be resolved to a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    /// The message contained no text.
    #[error("empty message")]
    Empty,
    /// The leading word is not one of the known commands.
    #[error("`{0}` is not a known command")]
    UnknownCommand(String),
    /// A required argument is absent.
    #[error("missing argument `{0}`")]
    MissingArgument(&'static str),
    /// The amount argument is not a positive integer.
    #[error("`{0}` is not a valid amount")]
    InvalidAmount(String),
    /// The game id argument is not a UUID.
    #[error("`{0}` is not a valid game id")]
    InvalidGameId(String),
}

impl Command {
    /// Parse a raw chat message into a command.
    pub fn parse(text: &str) -> Result<Self, CommandParseError> {
        let mut words = text.split_whitespace();
        let Some(head) = words.next() else {
            return Err(CommandParseError::Empty);
        };
        // Group chats may address the bot explicitly (`/start@santa_bot`).
        let name = head.split('@').next().unwrap_or(head);

        match name {
            "/start" => {
                let currency = words
                    .next()
                    .ok_or(CommandParseError::MissingArgument("currency"))?;
                let raw_amount = words
                    .next()
                    .ok_or(CommandParseError::MissingArgument("amount"))?;
                let amount = raw_amount
                    .parse::<i64>()
                    .ok()
                    .filter(|amount| *amount > 0)
                    .ok_or_else(|| CommandParseError::InvalidAmount(raw_amount.to_owned()))?;
                Ok(Command::Start {
                    currency: currency.to_owned(),
                    amount,
                })
            }
            "/join" => Ok(Command::Join),
            "/stop" => Ok(Command::Stop {
                game_id: parse_optional_game_id(words.next())?,
            }),
            "/reset" => Ok(Command::Reset {
                game_id: parse_optional_game_id(words.next())?,
            }),
            other => Err(CommandParseError::UnknownCommand(other.to_owned())),
        }
    }
}

fn parse_optional_game_id(word: Option<&str>) -> Result<Option<Uuid>, CommandParseError> {
    match word {
        None => Ok(None),
        Some(raw) => raw
            .parse::<Uuid>()
            .map(Some)
            .map_err(|_| CommandParseError::InvalidGameId(raw.to_owned())),
    }
}

/// Resolve an inbound update to a lifecycle operation and run it.
pub async fn dispatch(
    state: &SharedState,
    update: InboundUpdate,
) -> Result<CommandAck, ServiceError> {
    let command = match Command::parse(&update.text) {
        Ok(command) => command,
        Err(err) => {
            debug!(chat_id = update.chat_id, error = %err, "unparseable command");
            if let Err(delivery) = state
                .notifier()
                .notify_chat(update.chat_id, ChatNotification::UnknownCommand)
                .await
            {
                tracing::warn!(chat_id = update.chat_id, error = %delivery, "failed to answer an unknown command");
            }
            return Ok(CommandAck::rejected(err.to_string()));
        }
    };

    let outcome = match command {
        Command::Start { currency, amount } => {
            lifecycle::start_game(state, update.chat_id, update.user_id, currency, amount)
                .await
                .map(|game| CommandAck::accepted().with_game(game.into()))
        }
        Command::Join => lifecycle::join_game(
            state,
            update.chat_id,
            update.user_id,
            update.display_name.clone(),
        )
        .await
        .map(|()| CommandAck::accepted()),
        Command::Stop { game_id } => {
            lifecycle::stop_game(state, update.chat_id, update.user_id, game_id)
                .await
                .map(|outcome| CommandAck::accepted().with_game(outcome.game.into()))
        }
        Command::Reset { game_id } => {
            lifecycle::reset_game(state, update.chat_id, update.user_id, game_id)
                .await
                .map(|()| CommandAck::accepted())
        }
    };

    match outcome {
        Ok(ack) => Ok(ack),
        // Domain rejections were already reported in-chat by the lifecycle.
        Err(err @ (ServiceError::Unavailable(_) | ServiceError::Degraded)) => Err(err),
        Err(err) => Ok(CommandAck::rejected(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::{
        dao::santa_store::memory::MemoryStore,
        dto::command::AckStatus,
        notifier::recording::RecordingNotifier,
        services::auth::AdminRoster,
        state::AppState,
    };

    #[test]
    fn parses_start_with_terms() {
        assert_eq!(
            Command::parse("/start USD 100").unwrap(),
            Command::Start {
                currency: "USD".into(),
                amount: 100
            }
        );
    }

    #[test]
    fn parses_addressed_commands() {
        assert_eq!(Command::parse("/join@santa_bot").unwrap(), Command::Join);
    }

    #[test]
    fn parses_stop_with_and_without_id() {
        assert_eq!(Command::parse("/stop").unwrap(), Command::Stop { game_id: None });

        let id = Uuid::new_v4();
        assert_eq!(
            Command::parse(&format!("/reset {id}")).unwrap(),
            Command::Reset { game_id: Some(id) }
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(
            Command::parse("/start USD").unwrap_err(),
            CommandParseError::MissingArgument("amount")
        );
        assert_eq!(
            Command::parse("/start USD ten").unwrap_err(),
            CommandParseError::InvalidAmount("ten".into())
        );
        assert_eq!(
            Command::parse("/start USD -5").unwrap_err(),
            CommandParseError::InvalidAmount("-5".into())
        );
        assert_eq!(
            Command::parse("/stop not-a-uuid").unwrap_err(),
            CommandParseError::InvalidGameId("not-a-uuid".into())
        );
        assert_eq!(
            Command::parse("/dance").unwrap_err(),
            CommandParseError::UnknownCommand("/dance".into())
        );
        assert_eq!(Command::parse("  ").unwrap_err(), CommandParseError::Empty);
    }

    async fn test_state() -> (crate::state::SharedState, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        let state = AppState::new(AdminRoster::new([904281253]), Arc::new(notifier.clone()));
        state.install_store(Arc::new(MemoryStore::new())).await;
        (state, notifier)
    }

    fn update(user_id: i64, text: &str) -> InboundUpdate {
        InboundUpdate {
            chat_id: 1,
            user_id,
            display_name: format!("user-{user_id}"),
            text: text.to_owned(),
        }
    }

    #[tokio::test]
    async fn unknown_command_is_acked_and_answered_in_chat() {
        let (state, notifier) = test_state().await;

        let ack = dispatch(&state, update(5, "/dance")).await.unwrap();
        assert_eq!(ack.status, AckStatus::Rejected);
        assert_eq!(
            notifier.chat_notes(),
            vec![(1, ChatNotification::UnknownCommand)]
        );
    }

    #[tokio::test]
    async fn start_ack_carries_the_game_id() {
        let (state, _notifier) = test_state().await;

        let ack = dispatch(&state, update(904281253, "/start USD 100"))
            .await
            .unwrap();
        assert_eq!(ack.status, AckStatus::Accepted);
        let game = ack.game.expect("started game in the ack");
        assert_eq!(game.currency, "USD");
        assert_eq!(game.amount, 100);
    }

    #[tokio::test]
    async fn domain_rejection_still_acks_the_update() {
        let (state, _notifier) = test_state().await;

        let ack = dispatch(&state, update(5, "/start USD 100")).await.unwrap();
        assert_eq!(ack.status, AckStatus::Rejected);
        assert!(ack.reason.is_some());
    }

    #[tokio::test]
    async fn degraded_mode_propagates_to_the_transport() {
        let notifier = RecordingNotifier::new();
        let state = AppState::new(AdminRoster::new([904281253]), Arc::new(notifier.clone()));

        let err = dispatch(&state, update(904281253, "/join"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
