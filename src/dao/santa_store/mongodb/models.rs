use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{GameEntity, GameState, ParticipantEntity};

/// Game document as stored in the `games` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    chat_id: i64,
    currency: String,
    amount: i64,
    state: GameState,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            chat_id: value.chat_id,
            currency: value.currency,
            amount: value.amount,
            state: value.state,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            id: value.id,
            chat_id: value.chat_id,
            currency: value.currency,
            amount: value.amount,
            state: value.state,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Participant document as stored in the `participants` collection.
///
/// `assigned_to_id` is omitted while unset so the partial unique index on the
/// reverse link only covers assigned participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    game_id: Uuid,
    user_id: i64,
    display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_to_id: Option<Uuid>,
    #[serde(default)]
    is_admin: bool,
}

impl From<ParticipantEntity> for MongoParticipantDocument {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id,
            game_id: value.game_id,
            user_id: value.user_id,
            display_name: value.display_name,
            assigned_to_id: value.assigned_to_id,
            is_admin: value.is_admin,
        }
    }
}

impl From<MongoParticipantDocument> for ParticipantEntity {
    fn from(value: MongoParticipantDocument) -> Self {
        Self {
            id: value.id,
            game_id: value.game_id,
            user_id: value.user_id,
            display_name: value.display_name,
            assigned_to_id: value.assigned_to_id,
            is_admin: value.is_admin,
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
