//! Pairing draw over a game's unassigned participants.

use std::sync::Arc;

use rand::{rng, seq::SliceRandom};
use uuid::Uuid;

use crate::{
    dao::{models::ParticipantEntity, santa_store::SantaStore},
    error::ServiceError,
};

/// Result of a pairing draw.
#[derive(Debug, Clone)]
pub struct PairingOutcome {
    /// Participants that received an assignment in this draw.
    pub paired: Vec<ParticipantEntity>,
    /// The one participant left without a match on an odd headcount.
    pub unpaired: Option<ParticipantEntity>,
}

impl PairingOutcome {
    /// Whether the draw ran on an odd headcount.
    pub fn is_odd(&self) -> bool {
        self.unpaired.is_some()
    }
}

/// Draw gift pairs for every unassigned participant of `game_id`.
///
/// Participants already holding an assignment are untouched, so a repeated
/// call only pairs newcomers. An odd headcount is not an error: the draw
/// pairs as many as possible and reports the leftover through the outcome.
/// The updated batch is persisted as a unit; no partial draw is ever
/// observable.
pub async fn assign_pairs(
    store: &Arc<dyn SantaStore>,
    game_id: Uuid,
) -> Result<PairingOutcome, ServiceError> {
    let mut pool = store.list_unassigned_participants(game_id).await?;
    if pool.is_empty() {
        return Err(ServiceError::NoParticipants);
    }

    pool.shuffle(&mut rng());

    let unpaired = if pool.len() % 2 == 1 { pool.pop() } else { None };

    // Adjacent members of the shuffled pool gift each other.
    for pair in pool.chunks_exact_mut(2) {
        let (first_id, second_id) = (pair[0].id, pair[1].id);
        pair[0].assigned_to_id = Some(second_id);
        pair[1].assigned_to_id = Some(first_id);
    }

    store.save_participants(pool.clone()).await?;

    Ok(PairingOutcome {
        paired: pool,
        unpaired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::dao::{
        models::GameEntity,
        santa_store::memory::MemoryStore,
    };

    async fn seeded_game(store: &Arc<dyn SantaStore>, members: i64) -> GameEntity {
        let game = GameEntity::new(1, "USD".into(), 100);
        store.create_game(game.clone()).await.unwrap();
        for user_id in 0..members {
            store
                .add_participant(ParticipantEntity::new(
                    game.id,
                    user_id,
                    format!("user-{user_id}"),
                    false,
                ))
                .await
                .unwrap();
        }
        game
    }

    fn assert_mutual(participants: &[ParticipantEntity]) {
        let by_id: HashMap<_, _> = participants.iter().map(|p| (p.id, p)).collect();
        for participant in participants {
            let target = participant.assigned_to_id.expect("assignment missing");
            assert_ne!(target, participant.id, "self-assignment");
            let partner = by_id.get(&target).expect("partner outside the game");
            assert_eq!(partner.assigned_to_id, Some(participant.id));
        }
    }

    #[tokio::test]
    async fn even_headcount_pairs_everyone_mutually() {
        let store: Arc<dyn SantaStore> = Arc::new(MemoryStore::new());
        let game = seeded_game(&store, 6).await;

        let outcome = assign_pairs(&store, game.id).await.unwrap();
        assert!(!outcome.is_odd());
        assert_eq!(outcome.paired.len(), 6);

        let persisted = store.list_participants(game.id).await.unwrap();
        assert!(persisted.iter().all(|p| p.assigned_to_id.is_some()));
        assert_mutual(&persisted);
    }

    #[tokio::test]
    async fn odd_headcount_leaves_exactly_one_unpaired() {
        let store: Arc<dyn SantaStore> = Arc::new(MemoryStore::new());
        let game = seeded_game(&store, 5).await;

        let outcome = assign_pairs(&store, game.id).await.unwrap();
        assert!(outcome.is_odd());
        assert_eq!(outcome.paired.len(), 4);

        let persisted = store.list_participants(game.id).await.unwrap();
        let unassigned: Vec<_> = persisted
            .iter()
            .filter(|p| p.assigned_to_id.is_none())
            .collect();
        assert_eq!(unassigned.len(), 1);
        assert_eq!(
            unassigned[0].id,
            outcome.unpaired.as_ref().unwrap().id,
            "leftover reported by the outcome must match storage"
        );
        assert_mutual(&persisted
            .iter()
            .filter(|p| p.assigned_to_id.is_some())
            .cloned()
            .collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn empty_pool_aborts() {
        let store: Arc<dyn SantaStore> = Arc::new(MemoryStore::new());
        let game = seeded_game(&store, 0).await;

        let err = assign_pairs(&store, game.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NoParticipants));
    }

    #[tokio::test]
    async fn repeated_draw_only_pairs_newcomers() {
        let store: Arc<dyn SantaStore> = Arc::new(MemoryStore::new());
        let game = seeded_game(&store, 2).await;

        assign_pairs(&store, game.id).await.unwrap();
        let first_round = store.list_participants(game.id).await.unwrap();

        for user_id in [10, 11] {
            store
                .add_participant(ParticipantEntity::new(
                    game.id,
                    user_id,
                    format!("late-{user_id}"),
                    false,
                ))
                .await
                .unwrap();
        }

        let outcome = assign_pairs(&store, game.id).await.unwrap();
        assert_eq!(outcome.paired.len(), 2);

        let second_round = store.list_participants(game.id).await.unwrap();
        for original in &first_round {
            let unchanged = second_round.iter().find(|p| p.id == original.id).unwrap();
            assert_eq!(unchanged.assigned_to_id, original.assigned_to_id);
        }
        assert_mutual(&second_round);
    }
}
