use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{MongoGameDocument, MongoParticipantDocument, doc_id, uuid_as_binary},
};
use crate::dao::{
    models::{GameEntity, ParticipantEntity},
    santa_store::SantaStore,
    storage::StorageResult,
};

const GAME_COLLECTION_NAME: &str = "games";
const PARTICIPANT_COLLECTION_NAME: &str = "participants";

/// MongoDB-backed implementation of [`SantaStore`].
#[derive(Clone)]
pub struct MongoSantaStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoSantaStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Create the unique indexes backing the relational constraints: one game
    /// per chat, one registration per user per game, one giver per recipient.
    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let games = database.collection::<MongoGameDocument>(GAME_COLLECTION_NAME);
        let chat_index = mongodb::IndexModel::builder()
            .keys(doc! {"chat_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("game_chat_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        games
            .create_index(chat_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_COLLECTION_NAME,
                index: "chat_id",
                source,
            })?;

        let participants =
            database.collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION_NAME);
        let user_index = mongodb::IndexModel::builder()
            .keys(doc! {"game_id": 1, "user_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("participant_user_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        participants
            .create_index(user_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PARTICIPANT_COLLECTION_NAME,
                index: "game_id,user_id",
                source,
            })?;

        // Partial so unassigned participants (field absent) do not collide.
        let assignee_index = mongodb::IndexModel::builder()
            .keys(doc! {"assigned_to_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("participant_assignee_idx".to_owned()))
                    .unique(Some(true))
                    .partial_filter_expression(Some(doc! {
                        "assigned_to_id": { "$exists": true }
                    }))
                    .build(),
            )
            .build();
        participants
            .create_index(assignee_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PARTICIPANT_COLLECTION_NAME,
                index: "assigned_to_id",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn game_collection(&self) -> Collection<MongoGameDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    async fn participant_collection(&self) -> Collection<MongoParticipantDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION_NAME)
    }

    async fn create_game(&self, game: GameEntity) -> MongoResult<()> {
        let id = game.id;
        let chat_id = game.chat_id;
        let document: MongoGameDocument = game.into();
        let collection = self.game_collection().await;
        collection.insert_one(&document).await.map_err(|source| {
            if is_duplicate_key(&source) {
                MongoDaoError::Duplicate {
                    detail: format!("chat `{chat_id}` already has a game"),
                }
            } else {
                MongoDaoError::SaveGame { id, source }
            }
        })?;
        Ok(())
    }

    async fn save_game(&self, game: GameEntity) -> MongoResult<()> {
        let id = game.id;
        let document: MongoGameDocument = game.into();
        let collection = self.game_collection().await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveGame { id, source })?;
        Ok(())
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        let collection = self.game_collection().await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadGame { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_game_by_chat(&self, chat_id: i64) -> MongoResult<Option<GameEntity>> {
        let collection = self.game_collection().await;
        let document = collection
            .find_one(doc! {"chat_id": chat_id})
            .await
            .map_err(|source| MongoDaoError::LoadGameByChat { chat_id, source })?;
        Ok(document.map(Into::into))
    }

    async fn delete_game(&self, id: Uuid) -> MongoResult<bool> {
        let participants = self.participant_collection().await;

        // Two-phase teardown: drop the self-referencing links first so the
        // unique reverse-link index never sees a dangling reference, then
        // cascade to the rows themselves.
        participants
            .update_many(
                doc! {"game_id": uuid_as_binary(id)},
                doc! {"$unset": {"assigned_to_id": ""}},
            )
            .await
            .map_err(|source| MongoDaoError::DeleteGame { id, source })?;
        participants
            .delete_many(doc! {"game_id": uuid_as_binary(id)})
            .await
            .map_err(|source| MongoDaoError::DeleteGame { id, source })?;

        let games = self.game_collection().await;
        let result = games
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteGame { id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn add_participant(&self, participant: ParticipantEntity) -> MongoResult<()> {
        let id = participant.id;
        let game_id = participant.game_id;
        let user_id = participant.user_id;
        let document: MongoParticipantDocument = participant.into();
        let collection = self.participant_collection().await;
        collection.insert_one(&document).await.map_err(|source| {
            if is_duplicate_key(&source) {
                MongoDaoError::Duplicate {
                    detail: format!("user `{user_id}` already registered in game `{game_id}`"),
                }
            } else {
                MongoDaoError::SaveParticipant { id, source }
            }
        })?;
        Ok(())
    }

    async fn list_participants(&self, game_id: Uuid) -> MongoResult<Vec<ParticipantEntity>> {
        let collection = self.participant_collection().await;
        let documents: Vec<MongoParticipantDocument> = collection
            .find(doc! {"game_id": uuid_as_binary(game_id)})
            .await
            .map_err(|source| MongoDaoError::LoadParticipants { game_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadParticipants { game_id, source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn list_unassigned_participants(
        &self,
        game_id: Uuid,
    ) -> MongoResult<Vec<ParticipantEntity>> {
        let collection = self.participant_collection().await;
        let documents: Vec<MongoParticipantDocument> = collection
            .find(doc! {
                "game_id": uuid_as_binary(game_id),
                "assigned_to_id": { "$exists": false },
            })
            .await
            .map_err(|source| MongoDaoError::LoadParticipants { game_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadParticipants { game_id, source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    /// Write the batch inside a session transaction so a crash mid-batch never
    /// leaves a half-paired game. Requires a replica-set deployment.
    async fn save_participants(&self, batch: Vec<ParticipantEntity>) -> MongoResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let client = self.client().await;
        let collection = self.participant_collection().await;

        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::Transaction { source })?;
        session
            .start_transaction()
            .await
            .map_err(|source| MongoDaoError::Transaction { source })?;

        for participant in batch {
            let id = participant.id;
            let document: MongoParticipantDocument = participant.into();
            let write = collection
                .replace_one(doc_id(id), &document)
                .upsert(true)
                .session(&mut session)
                .await;
            if let Err(source) = write {
                let _ = session.abort_transaction().await;
                if is_duplicate_key(&source) {
                    return Err(MongoDaoError::Duplicate {
                        detail: format!("conflicting assignment for participant `{id}`"),
                    });
                }
                return Err(MongoDaoError::SaveParticipant { id, source });
            }
        }

        session
            .commit_transaction()
            .await
            .map_err(|source| MongoDaoError::Transaction { source })?;
        Ok(())
    }

    async fn is_user_in_game(&self, game_id: Uuid, user_id: i64) -> MongoResult<bool> {
        let collection = self.participant_collection().await;
        let document = collection
            .find_one(doc! {
                "game_id": uuid_as_binary(game_id),
                "user_id": user_id,
            })
            .await
            .map_err(|source| MongoDaoError::LoadParticipants { game_id, source })?;
        Ok(document.is_some())
    }
}

impl SantaStore for MongoSantaStore {
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_game(game).await.map_err(Into::into) })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game(game).await.map_err(Into::into) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn find_game_by_chat(
        &self,
        chat_id: i64,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game_by_chat(chat_id).await.map_err(Into::into) })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_game(id).await.map_err(Into::into) })
    }

    fn add_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.add_participant(participant).await.map_err(Into::into) })
    }

    fn list_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_participants(game_id).await.map_err(Into::into) })
    }

    fn list_unassigned_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_unassigned_participants(game_id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_participants(
        &self,
        batch: Vec<ParticipantEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_participants(batch).await.map_err(Into::into) })
    }

    fn is_user_in_game(
        &self,
        game_id: Uuid,
        user_id: i64,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .is_user_in_game(game_id, user_id)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
