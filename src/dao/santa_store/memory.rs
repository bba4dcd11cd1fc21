//! In-process storage backend.
//!
//! Used by the test suite and by token-free local runs. It enforces the same
//! uniqueness constraints as the database-backed stores so the service layer
//! observes identical failure modes.

use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    models::{GameEntity, ParticipantEntity},
    santa_store::SantaStore,
    storage::{StorageError, StorageResult},
};

/// Storage backend keeping every entity in process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    games: IndexMap<Uuid, GameEntity>,
    participants: IndexMap<Uuid, ParticipantEntity>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SantaStore for MemoryStore {
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.write().await;
            if inner.games.values().any(|g| g.chat_id == game.chat_id) {
                return Err(StorageError::constraint(format!(
                    "chat `{}` already has a game",
                    game.chat_id
                )));
            }
            inner.games.insert(game.id, game);
            Ok(())
        })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.write().await.games.insert(game.id, game);
            Ok(())
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.read().await.games.get(&id).cloned()) })
    }

    fn find_game_by_chat(
        &self,
        chat_id: i64,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.read().await;
            Ok(inner.games.values().find(|g| g.chat_id == chat_id).cloned())
        })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.write().await;
            if !inner.games.contains_key(&id) {
                return Ok(false);
            }
            // Break the self-referencing links before the cascade so the same
            // sequence holds for backends with enforced foreign keys.
            for participant in inner.participants.values_mut() {
                if participant.game_id == id {
                    participant.assigned_to_id = None;
                }
            }
            inner.participants.retain(|_, p| p.game_id != id);
            inner.games.shift_remove(&id);
            Ok(true)
        })
    }

    fn add_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.write().await;
            if inner
                .participants
                .values()
                .any(|p| p.game_id == participant.game_id && p.user_id == participant.user_id)
            {
                return Err(StorageError::constraint(format!(
                    "user `{}` already registered in game `{}`",
                    participant.user_id, participant.game_id
                )));
            }
            inner.participants.insert(participant.id, participant);
            Ok(())
        })
    }

    fn list_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.read().await;
            Ok(inner
                .participants
                .values()
                .filter(|p| p.game_id == game_id)
                .cloned()
                .collect())
        })
    }

    fn list_unassigned_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.read().await;
            Ok(inner
                .participants
                .values()
                .filter(|p| p.game_id == game_id && p.assigned_to_id.is_none())
                .cloned()
                .collect())
        })
    }

    fn save_participants(
        &self,
        batch: Vec<ParticipantEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.write().await;
            // Reject duplicated reverse links across the whole batch before
            // touching anything, keeping the write all-or-nothing.
            for entry in &batch {
                if let Some(target) = entry.assigned_to_id {
                    let taken = inner.participants.values().any(|p| {
                        p.id != entry.id
                            && p.assigned_to_id == Some(target)
                            && batch.iter().all(|b| b.id != p.id)
                    }) || batch
                        .iter()
                        .any(|b| b.id != entry.id && b.assigned_to_id == Some(target));
                    if taken {
                        return Err(StorageError::constraint(format!(
                            "participant `{target}` already has a giver"
                        )));
                    }
                }
            }
            for entry in batch {
                inner.participants.insert(entry.id, entry);
            }
            Ok(())
        })
    }

    fn is_user_in_game(
        &self,
        game_id: Uuid,
        user_id: i64,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.read().await;
            Ok(inner
                .participants
                .values()
                .any(|p| p.game_id == game_id && p.user_id == user_id))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn store() -> Arc<dyn SantaStore> {
        Arc::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn one_game_per_chat() {
        let store = store();
        store
            .create_game(GameEntity::new(7, "EUR".into(), 25))
            .await
            .unwrap();

        let err = store
            .create_game(GameEntity::new(7, "USD".into(), 50))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Constraint { .. }));

        // A different chat is unaffected.
        store
            .create_game(GameEntity::new(8, "USD".into(), 50))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_join_rejected() {
        let store = store();
        let game = GameEntity::new(1, "EUR".into(), 25);
        store.create_game(game.clone()).await.unwrap();

        store
            .add_participant(ParticipantEntity::new(game.id, 42, "ann".into(), false))
            .await
            .unwrap();
        let err = store
            .add_participant(ParticipantEntity::new(game.id, 42, "ann".into(), false))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Constraint { .. }));
    }

    #[tokio::test]
    async fn delete_game_cascades_and_clears_links() {
        let store = store();
        let game = GameEntity::new(1, "EUR".into(), 25);
        store.create_game(game.clone()).await.unwrap();

        let mut a = ParticipantEntity::new(game.id, 1, "a".into(), false);
        let mut b = ParticipantEntity::new(game.id, 2, "b".into(), false);
        a.assigned_to_id = Some(b.id);
        b.assigned_to_id = Some(a.id);
        store.add_participant(a).await.unwrap();
        store.add_participant(b).await.unwrap();

        assert!(store.delete_game(game.id).await.unwrap());
        assert!(store.find_game(game.id).await.unwrap().is_none());
        assert!(store.list_participants(game.id).await.unwrap().is_empty());
        // Deleting again reports that nothing was removed.
        assert!(!store.delete_game(game.id).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_reverse_link_rejected() {
        let store = store();
        let game = GameEntity::new(1, "EUR".into(), 25);
        store.create_game(game.clone()).await.unwrap();

        let mut a = ParticipantEntity::new(game.id, 1, "a".into(), false);
        let b = ParticipantEntity::new(game.id, 2, "b".into(), false);
        let mut c = ParticipantEntity::new(game.id, 3, "c".into(), false);
        store.add_participant(a.clone()).await.unwrap();
        store.add_participant(b.clone()).await.unwrap();
        store.add_participant(c.clone()).await.unwrap();

        a.assigned_to_id = Some(b.id);
        c.assigned_to_id = Some(b.id);
        let err = store.save_participants(vec![a, c]).await.unwrap_err();
        assert!(matches!(err, StorageError::Constraint { .. }));
    }
}
