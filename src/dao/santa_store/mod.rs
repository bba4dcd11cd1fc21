pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{GameEntity, ParticipantEntity};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for games and their participants.
///
/// Backends enforce the relational constraints themselves: one non-reset game
/// per chat, unique `(game_id, user_id)` pairs, and a unique reverse link on
/// `assigned_to_id`. Violations surface as [`StorageError::Constraint`].
///
/// [`StorageError::Constraint`]: crate::dao::storage::StorageError::Constraint
pub trait SantaStore: Send + Sync {
    /// Insert a new game. Fails the chat-uniqueness constraint if the chat
    /// already has a game.
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace an existing game entity.
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a game by id.
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Fetch the chat's game, whatever its state.
    fn find_game_by_chat(
        &self,
        chat_id: i64,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Delete a game and its participants. Assignment links between the
    /// participants are cleared before any row is removed. Returns whether a
    /// game was actually deleted.
    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Insert a new participant. Fails the `(game_id, user_id)` uniqueness
    /// constraint on a duplicate join.
    fn add_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// All participants of a game.
    fn list_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    /// Participants of a game that have no assignment yet.
    fn list_unassigned_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    /// Persist a batch of updated participants as a unit: either every entry
    /// is written or none is.
    fn save_participants(
        &self,
        batch: Vec<ParticipantEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Whether `user_id` is already registered in `game_id`.
    fn is_user_in_game(
        &self,
        game_id: Uuid,
        user_id: i64,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a dropped connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
