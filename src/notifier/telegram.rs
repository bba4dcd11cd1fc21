//! Telegram Bot API notifier.
//!
//! Delivers notifications through the `sendMessage` endpoint. Message texts
//! live here, next to the transport, so the service layer never deals with
//! wording.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde_json::json;
use thiserror::Error;

use super::{ChatNotification, Notifier, NotifyError, NotifyResult, UserNotification};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Runtime configuration describing how to reach the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather.
    pub token: String,
    /// API host, overridable for self-hosted Bot API servers.
    pub api_base: String,
}

impl TelegramConfig {
    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> Result<Self, TelegramError> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").map_err(|_| {
            TelegramError::MissingEnvVar {
                var: "TELEGRAM_BOT_TOKEN",
            }
        })?;
        let api_base =
            std::env::var("TELEGRAM_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_owned());
        Ok(Self { token, api_base })
    }
}

/// Failures that can occur while calling the Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Required environment variable is missing.
    #[error("missing Telegram environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the absent variable.
        var: &'static str,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Telegram client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent.
    #[error("failed to send Telegram request for chat `{chat_id}`")]
    RequestSend {
        /// Addressed chat or user.
        chat_id: i64,
        #[source]
        source: reqwest::Error,
    },
    /// The Bot API answered with an unexpected status code.
    #[error("unexpected Telegram response status {status} for chat `{chat_id}`")]
    RequestStatus {
        /// Addressed chat or user.
        chat_id: i64,
        /// HTTP status returned by the Bot API.
        status: StatusCode,
    },
}

/// Notifier delivering messages through the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    send_message_url: Arc<str>,
}

impl TelegramNotifier {
    /// Build the notifier from its configuration.
    pub fn new(config: TelegramConfig) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .build()
            .map_err(|source| TelegramError::ClientBuilder { source })?;
        let send_message_url = Arc::<str>::from(format!(
            "{}/bot{}/sendMessage",
            config.api_base.trim_end_matches('/'),
            config.token
        ));
        Ok(Self {
            client,
            send_message_url,
        })
    }

    async fn send_message(
        client: Client,
        url: Arc<str>,
        chat_id: i64,
        text: String,
    ) -> Result<(), TelegramError> {
        let response = client
            .post(url.as_ref())
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .map_err(|source| TelegramError::RequestSend { chat_id, source })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TelegramError::RequestStatus { chat_id, status })
        }
    }
}

impl Notifier for TelegramNotifier {
    fn notify_chat(&self, chat_id: i64, note: ChatNotification) -> BoxFuture<'static, NotifyResult> {
        let client = self.client.clone();
        let url = self.send_message_url.clone();
        let text = render_chat_note(&note);
        Box::pin(async move {
            Self::send_message(client, url, chat_id, text)
                .await
                .map_err(|source| NotifyError::delivery(format!("chat {chat_id}"), source))
        })
    }

    fn notify_user(&self, user_id: i64, note: UserNotification) -> BoxFuture<'static, NotifyResult> {
        let client = self.client.clone();
        let url = self.send_message_url.clone();
        let text = render_user_note(&note);
        // Private messages go through the same endpoint; the user id acts as
        // the chat id of the one-on-one conversation.
        Box::pin(async move {
            Self::send_message(client, url, user_id, text)
                .await
                .map_err(|source| NotifyError::delivery(format!("user {user_id}"), source))
        })
    }
}

fn render_chat_note(note: &ChatNotification) -> String {
    match note {
        ChatNotification::GameStarted { currency, amount } => format!(
            "🎅 Secret Santa has started! Registration is open, send /join to take part.\n\
             Gift budget: {amount} {currency}"
        ),
        ChatNotification::GameStopped => "🏁 Registration is closed and pairs have been drawn. \
             Everyone receives a private message with their recipient."
            .to_owned(),
        ChatNotification::GameReset => "❌ The game was reset and all its data wiped. \
             Wait for an admin to start a new one."
            .to_owned(),
        ChatNotification::GameNotFound => "❌ No game is currently open in this chat.".to_owned(),
        ChatNotification::GameAlreadyOpen => "⛔ A game is already running in this chat. \
             Reset it before starting a new one."
            .to_owned(),
        ChatNotification::Unauthorized => {
            "⛔ You do not have permission to run this command.".to_owned()
        }
        ChatNotification::AlreadyJoined { display_name } => {
            format!("{display_name}, you are already taking part 🎁")
        }
        ChatNotification::OddParticipantCount => "⚠️ Odd number of participants: one member \
             could not be paired this round."
            .to_owned(),
        ChatNotification::NoParticipants => {
            "⚠️ Nobody joined the game, there is nothing to pair.".to_owned()
        }
        ChatNotification::ParticipantJoined {
            display_name,
            currency,
            amount,
        } => format!("✅ {display_name} joined the game! Gift budget: {amount} {currency}"),
        ChatNotification::UnknownCommand => {
            "Unknown command 😕. Please try again.".to_owned()
        }
    }
}

fn render_user_note(note: &UserNotification) -> String {
    match note {
        UserNotification::ParticipantAssigned {
            recipient_name,
            currency,
            amount,
        } => format!(
            "🎅 Santa has decided!\n🎁 You are gifting to {recipient_name}.\n\
             Reminder: the budget is {amount} {currency}."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_text_names_recipient_and_terms() {
        let text = render_user_note(&UserNotification::ParticipantAssigned {
            recipient_name: "ann".into(),
            currency: "USD".into(),
            amount: 100,
        });
        assert!(text.contains("ann"));
        assert!(text.contains("100 USD"));
    }

    #[test]
    fn start_text_carries_gift_terms() {
        let text = render_chat_note(&ChatNotification::GameStarted {
            currency: "EUR".into(),
            amount: 25,
        });
        assert!(text.contains("25 EUR"));
    }
}
