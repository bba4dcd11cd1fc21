//! Outbound messaging towards the chat platform.
//!
//! The service layer only decides *what* happened; rendering and delivering
//! the matching message is the notifier's concern. A Telegram implementation
//! is available behind the `telegram-notifier` feature and a log-only
//! implementation covers token-free runs.

pub mod log;
#[cfg(feature = "telegram-notifier")]
pub mod telegram;

use std::error::Error;

use futures::future::BoxFuture;
use thiserror::Error;

/// Result alias for delivery attempts.
pub type NotifyResult = Result<(), NotifyError>;

/// Error raised when a notification could not be delivered.
#[derive(Debug, Error)]
#[error("failed to deliver notification to {target}")]
pub struct NotifyError {
    /// Chat or user the delivery was addressed to.
    pub target: String,
    #[source]
    source: Box<dyn Error + Send + Sync>,
}

impl NotifyError {
    /// Wrap a transport failure for the given target.
    pub fn delivery(target: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        Self {
            target: target.into(),
            source: Box::new(source),
        }
    }
}

/// Events announced to the whole chat room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatNotification {
    /// Registration opened with the given gift terms.
    GameStarted {
        /// Gift currency.
        currency: String,
        /// Gift budget.
        amount: i64,
    },
    /// Registration closed and pairs were drawn.
    GameStopped,
    /// The game and all its data were wiped.
    GameReset,
    /// The addressed game does not exist (or registration is over).
    GameNotFound,
    /// A start was rejected because the chat already hosts a game.
    GameAlreadyOpen,
    /// The actor lacks admin rights for the attempted command.
    Unauthorized,
    /// The member tried to join a game they already belong to.
    AlreadyJoined {
        /// Label of the member, echoed back.
        display_name: String,
    },
    /// Registration closed on an odd headcount; one member stays unpaired.
    OddParticipantCount,
    /// Registration closed on an empty game; nothing was paired.
    NoParticipants,
    /// A member registered successfully.
    ParticipantJoined {
        /// Label of the new member.
        display_name: String,
        /// Gift currency, echoed as a reminder.
        currency: String,
        /// Gift budget, echoed as a reminder.
        amount: i64,
    },
    /// The command could not be understood.
    UnknownCommand,
}

/// Events delivered privately to a single member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserNotification {
    /// The member's drawn recipient.
    ParticipantAssigned {
        /// Display name of the recipient to gift.
        recipient_name: String,
        /// Gift currency.
        currency: String,
        /// Gift budget.
        amount: i64,
    },
}

/// Delivery of lifecycle events to chats and individual members.
pub trait Notifier: Send + Sync {
    /// Announce an event to a chat room.
    fn notify_chat(&self, chat_id: i64, note: ChatNotification) -> BoxFuture<'static, NotifyResult>;
    /// Deliver an event privately to a member.
    fn notify_user(&self, user_id: i64, note: UserNotification) -> BoxFuture<'static, NotifyResult>;
}
