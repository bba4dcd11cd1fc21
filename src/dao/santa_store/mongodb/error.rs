//! Error types shared by the MongoDB storage implementation.

use thiserror::Error;
use uuid::Uuid;

/// Convenient result alias returning [`MongoDaoError`] failures.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection string could not be parsed.
    #[error("invalid MongoDB connection string `{uri}`")]
    InvalidUri {
        /// Offending connection string.
        uri: String,
        #[source]
        source: mongodb::error::Error,
    },
    /// Building the client from parsed options failed.
    #[error("failed to construct MongoDB client")]
    ClientConstruction {
        #[source]
        source: mongodb::error::Error,
    },
    /// The initial ping never succeeded within the retry budget.
    #[error("MongoDB did not answer the initial ping after {attempts} attempts")]
    InitialPing {
        /// Number of ping attempts performed.
        attempts: u32,
        #[source]
        source: mongodb::error::Error,
    },
    /// A health-check ping failed on an established connection.
    #[error("MongoDB health ping failed")]
    HealthPing {
        #[source]
        source: mongodb::error::Error,
    },
    /// Creating one of the required indexes failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection carrying the index.
        collection: &'static str,
        /// Index description.
        index: &'static str,
        #[source]
        source: mongodb::error::Error,
    },
    /// Writing a game document failed.
    #[error("failed to save game `{id}`")]
    SaveGame {
        /// Game primary key.
        id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    /// Reading a game document failed.
    #[error("failed to load game `{id}`")]
    LoadGame {
        /// Game primary key.
        id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    /// Looking up a chat's game failed.
    #[error("failed to look up the game of chat `{chat_id}`")]
    LoadGameByChat {
        /// Chat identifier.
        chat_id: i64,
        #[source]
        source: mongodb::error::Error,
    },
    /// Deleting a game or its participants failed.
    #[error("failed to delete game `{id}`")]
    DeleteGame {
        /// Game primary key.
        id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    /// Writing a participant document failed.
    #[error("failed to save participant `{id}`")]
    SaveParticipant {
        /// Participant primary key.
        id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    /// Reading participant documents failed.
    #[error("failed to load participants of game `{game_id}`")]
    LoadParticipants {
        /// Owning game.
        game_id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    /// A session transaction could not be started, committed or applied.
    #[error("participant batch transaction failed")]
    Transaction {
        #[source]
        source: mongodb::error::Error,
    },
    /// A unique index rejected the write.
    #[error("duplicate key: {detail}")]
    Duplicate {
        /// Which key was duplicated.
        detail: String,
    },
}

/// Whether a driver error is a unique-index violation (server code 11000).
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}
