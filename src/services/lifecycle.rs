//! Game lifecycle operations driven by chat commands.
//!
//! Each operation grabs the chat's gate so two transitions for the same chat
//! never interleave, consults the authorization gate where required, mutates
//! storage, and reports the outcome back to the chat. Rejections leave the
//! data untouched and are announced in-chat; only storage failures stay
//! silent towards the room and bubble up to the transport instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{GameEntity, GameState, ParticipantEntity},
        santa_store::SantaStore,
        storage::StorageError,
    },
    error::ServiceError,
    notifier::{ChatNotification, UserNotification},
    services::pairing,
    state::{
        SharedState,
        phase::{GamePhase, LifecycleEvent},
    },
};

/// Summary of a completed close operation.
#[derive(Debug)]
pub struct StopOutcome {
    /// The closed game.
    pub game: GameEntity,
    /// How many participants received an assignment in this draw.
    pub paired: usize,
    /// Whether one participant stayed unpaired because of an odd headcount.
    pub odd: bool,
    /// How many assignment messages were actually delivered.
    pub notified: usize,
}

/// Open registration for a new game in `chat_id`.
///
/// Admin only. Rejected with [`ServiceError::GameAlreadyOpen`] while any
/// non-reset game exists for the chat, whatever its state.
pub async fn start_game(
    state: &SharedState,
    chat_id: i64,
    actor_id: i64,
    currency: String,
    amount: i64,
) -> Result<GameEntity, ServiceError> {
    let result = start_game_inner(state, chat_id, actor_id, currency, amount).await;
    report_rejection(state, chat_id, &result).await;
    result
}

async fn start_game_inner(
    state: &SharedState,
    chat_id: i64,
    actor_id: i64,
    currency: String,
    amount: i64,
) -> Result<GameEntity, ServiceError> {
    let gate = state.chat_gate(chat_id);
    let _guard = gate.lock().await;
    let store = state.require_store().await?;

    ensure_admin(state, actor_id)?;

    let existing = store.find_game_by_chat(chat_id).await?;
    if GamePhase::of(existing.as_ref())
        .apply(LifecycleEvent::StartGame)
        .is_err()
    {
        return Err(ServiceError::GameAlreadyOpen { chat_id });
    }

    let game = GameEntity::new(chat_id, currency, amount);
    match store.create_game(game.clone()).await {
        Ok(()) => {}
        // Backstop for a start racing in between the lookup and the insert.
        Err(StorageError::Constraint { .. }) => {
            return Err(ServiceError::GameAlreadyOpen { chat_id });
        }
        Err(err) => return Err(err.into()),
    }
    info!(chat_id, game_id = %game.id, "game started");

    notify_chat(
        state,
        chat_id,
        ChatNotification::GameStarted {
            currency: game.currency.clone(),
            amount: game.amount,
        },
    )
    .await;

    Ok(game)
}

/// Register `actor_id` in the chat's open game.
///
/// Idempotent per `(chat, user)`: a second join changes nothing and answers
/// with [`ServiceError::AlreadyJoined`].
pub async fn join_game(
    state: &SharedState,
    chat_id: i64,
    actor_id: i64,
    display_name: String,
) -> Result<(), ServiceError> {
    let result = join_game_inner(state, chat_id, actor_id, display_name).await;
    report_rejection(state, chat_id, &result).await;
    result
}

async fn join_game_inner(
    state: &SharedState,
    chat_id: i64,
    actor_id: i64,
    display_name: String,
) -> Result<(), ServiceError> {
    let gate = state.chat_gate(chat_id);
    let _guard = gate.lock().await;
    let store = state.require_store().await?;

    let Some(game) = store.find_game_by_chat(chat_id).await? else {
        return Err(ServiceError::GameNotFound);
    };
    // A closed game no longer accepts members.
    GamePhase::of(Some(&game))
        .apply(LifecycleEvent::JoinGame)
        .map_err(|_| ServiceError::GameNotFound)?;

    if store.is_user_in_game(game.id, actor_id).await? {
        return Err(ServiceError::AlreadyJoined { display_name });
    }

    let participant = ParticipantEntity::new(
        game.id,
        actor_id,
        display_name.clone(),
        state.admins().is_admin(actor_id),
    );
    match store.add_participant(participant).await {
        Ok(()) => {}
        Err(StorageError::Constraint { .. }) => {
            return Err(ServiceError::AlreadyJoined { display_name });
        }
        Err(err) => return Err(err.into()),
    }
    info!(chat_id, game_id = %game.id, user_id = actor_id, "participant joined");

    notify_chat(
        state,
        chat_id,
        ChatNotification::ParticipantJoined {
            display_name,
            currency: game.currency,
            amount: game.amount,
        },
    )
    .await;

    Ok(())
}

/// Close registration, draw the pairs and notify every assigned participant.
///
/// Admin only. The target game is the one named by `game_id` or, when
/// absent, the chat's open game. Assignment messages are only attempted once
/// the pairing writes have committed; a delivery failure to one member never
/// prevents notifying the others.
pub async fn stop_game(
    state: &SharedState,
    chat_id: i64,
    actor_id: i64,
    game_id: Option<Uuid>,
) -> Result<StopOutcome, ServiceError> {
    let result = stop_game_inner(state, chat_id, actor_id, game_id).await;
    report_rejection(state, chat_id, &result).await;
    result
}

async fn stop_game_inner(
    state: &SharedState,
    chat_id: i64,
    actor_id: i64,
    game_id: Option<Uuid>,
) -> Result<StopOutcome, ServiceError> {
    let gate = state.chat_gate(chat_id);
    let _guard = gate.lock().await;
    let store = state.require_store().await?;

    ensure_admin(state, actor_id)?;

    let game = resolve_game(&store, chat_id, game_id).await?;
    GamePhase::of(Some(&game))
        .apply(LifecycleEvent::StopGame)
        .map_err(|_| ServiceError::GameNotFound)?;

    let outcome = pairing::assign_pairs(&store, game.id).await?;

    let mut game = game;
    game.state = GameState::Closed;
    game.updated_at = SystemTime::now();
    store.save_game(game.clone()).await?;
    info!(
        chat_id = game.chat_id,
        game_id = %game.id,
        paired = outcome.paired.len(),
        odd = outcome.is_odd(),
        "registration closed"
    );

    // The odd-count warning does not abort the close; the chat hears about
    // the leftover member alongside the stop confirmation.
    if outcome.is_odd() {
        notify_chat(state, game.chat_id, ChatNotification::OddParticipantCount).await;
    }
    notify_chat(state, game.chat_id, ChatNotification::GameStopped).await;

    let notified = notify_assignments(state, &store, &game).await?;

    Ok(StopOutcome {
        paired: outcome.paired.len(),
        odd: outcome.is_odd(),
        notified,
        game,
    })
}

/// Wipe the chat's game and every trace of its participants.
///
/// Admin only. Works on open and closed games alike.
pub async fn reset_game(
    state: &SharedState,
    chat_id: i64,
    actor_id: i64,
    game_id: Option<Uuid>,
) -> Result<(), ServiceError> {
    let result = reset_game_inner(state, chat_id, actor_id, game_id).await;
    report_rejection(state, chat_id, &result).await;
    result
}

async fn reset_game_inner(
    state: &SharedState,
    chat_id: i64,
    actor_id: i64,
    game_id: Option<Uuid>,
) -> Result<(), ServiceError> {
    let gate = state.chat_gate(chat_id);
    let _guard = gate.lock().await;
    let store = state.require_store().await?;

    ensure_admin(state, actor_id)?;

    let game = resolve_game(&store, chat_id, game_id).await?;
    if !store.delete_game(game.id).await? {
        return Err(ServiceError::GameNotFound);
    }
    info!(chat_id = game.chat_id, game_id = %game.id, "game reset");

    notify_chat(state, game.chat_id, ChatNotification::GameReset).await;

    Ok(())
}

fn ensure_admin(state: &SharedState, user_id: i64) -> Result<(), ServiceError> {
    if state.admins().is_admin(user_id) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized { user_id })
    }
}

async fn resolve_game(
    store: &Arc<dyn SantaStore>,
    chat_id: i64,
    game_id: Option<Uuid>,
) -> Result<GameEntity, ServiceError> {
    let found = match game_id {
        Some(id) => store.find_game(id).await?,
        None => store.find_game_by_chat(chat_id).await?,
    };
    found.ok_or(ServiceError::GameNotFound)
}

/// Deliver the drawn assignment to every participant holding one.
///
/// Runs only after the pairing writes are durable. Deliveries proceed
/// concurrently and independently; each failure is logged and skipped.
async fn notify_assignments(
    state: &SharedState,
    store: &Arc<dyn SantaStore>,
    game: &GameEntity,
) -> Result<usize, ServiceError> {
    let participants = store.list_participants(game.id).await?;
    let names: HashMap<Uuid, String> = participants
        .iter()
        .map(|p| (p.id, p.display_name.clone()))
        .collect();

    let notifier = state.notifier();
    let deliveries = participants.iter().filter_map(|participant| {
        let target = participant.assigned_to_id?;
        let Some(recipient_name) = names.get(&target).cloned() else {
            warn!(
                participant_id = %participant.id,
                "assignment points outside the game; skipping notification"
            );
            return None;
        };
        let note = UserNotification::ParticipantAssigned {
            recipient_name,
            currency: game.currency.clone(),
            amount: game.amount,
        };
        let notifier = notifier.clone();
        let user_id = participant.user_id;
        Some(async move {
            match notifier.notify_user(user_id, note).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(user_id, error = %err, "failed to deliver an assignment");
                    false
                }
            }
        })
    });

    Ok(join_all(deliveries)
        .await
        .into_iter()
        .filter(|delivered| *delivered)
        .count())
}

/// Announce a rejected operation to the chat it came from.
///
/// Storage failures are deliberately not surfaced in-chat; the transport
/// layer reports those to the caller.
async fn report_rejection<T>(state: &SharedState, chat_id: i64, result: &Result<T, ServiceError>) {
    let Err(err) = result else { return };
    let note = match err {
        ServiceError::Unauthorized { .. } => Some(ChatNotification::Unauthorized),
        ServiceError::GameNotFound => Some(ChatNotification::GameNotFound),
        ServiceError::GameAlreadyOpen { .. } => Some(ChatNotification::GameAlreadyOpen),
        ServiceError::AlreadyJoined { display_name } => Some(ChatNotification::AlreadyJoined {
            display_name: display_name.clone(),
        }),
        ServiceError::NoParticipants => Some(ChatNotification::NoParticipants),
        ServiceError::InvalidCommand(_) => Some(ChatNotification::UnknownCommand),
        ServiceError::Unavailable(_) | ServiceError::Degraded => None,
    };

    if let Some(note) = note {
        notify_chat(state, chat_id, note).await;
    }
}

async fn notify_chat(state: &SharedState, chat_id: i64, note: ChatNotification) {
    if let Err(err) = state.notifier().notify_chat(chat_id, note).await {
        warn!(chat_id, error = %err, "failed to deliver a chat notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::{
        dao::santa_store::memory::MemoryStore,
        notifier::recording::RecordingNotifier,
        services::auth::AdminRoster,
        state::AppState,
    };

    const ADMIN: i64 = 904281253;
    const CHAT: i64 = 1;

    async fn test_state() -> (SharedState, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        let state = AppState::new(AdminRoster::new([ADMIN]), Arc::new(notifier.clone()));
        state.install_store(Arc::new(MemoryStore::new())).await;
        (state, notifier)
    }

    async fn participants_of(state: &SharedState, game_id: Uuid) -> Vec<ParticipantEntity> {
        state
            .require_store()
            .await
            .unwrap()
            .list_participants(game_id)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn start_creates_one_open_game_per_chat() {
        let (state, notifier) = test_state().await;

        let game = start_game(&state, CHAT, ADMIN, "USD".into(), 100)
            .await
            .unwrap();
        assert_eq!(game.state, GameState::Open);
        assert_eq!(game.currency, "USD");
        assert_eq!(game.amount, 100);

        let err = start_game(&state, CHAT, ADMIN, "EUR".into(), 50)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::GameAlreadyOpen { chat_id: CHAT }));

        // The original game is untouched by the rejected start.
        let store = state.require_store().await.unwrap();
        let persisted = store.find_game_by_chat(CHAT).await.unwrap().unwrap();
        assert_eq!(persisted.id, game.id);
        assert_eq!(persisted.currency, "USD");

        let notes = notifier.chat_notes();
        assert_eq!(
            notes[0],
            (
                CHAT,
                ChatNotification::GameStarted {
                    currency: "USD".into(),
                    amount: 100
                }
            )
        );
        assert!(notes.contains(&(CHAT, ChatNotification::GameAlreadyOpen)));
    }

    #[tokio::test]
    async fn start_requires_admin_rights() {
        let (state, notifier) = test_state().await;

        let err = start_game(&state, CHAT, 555, "USD".into(), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { user_id: 555 }));

        let store = state.require_store().await.unwrap();
        assert!(store.find_game_by_chat(CHAT).await.unwrap().is_none());
        assert_eq!(
            notifier.chat_notes(),
            vec![(CHAT, ChatNotification::Unauthorized)]
        );
    }

    #[tokio::test]
    async fn join_is_idempotent_per_user() {
        let (state, notifier) = test_state().await;
        let game = start_game(&state, CHAT, ADMIN, "USD".into(), 100)
            .await
            .unwrap();

        join_game(&state, CHAT, 42, "ann".into()).await.unwrap();
        let err = join_game(&state, CHAT, 42, "ann".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyJoined { .. }));

        assert_eq!(participants_of(&state, game.id).await.len(), 1);
        assert!(notifier.chat_notes().contains(&(
            CHAT,
            ChatNotification::AlreadyJoined {
                display_name: "ann".into()
            }
        )));
    }

    #[tokio::test]
    async fn join_without_open_game_is_rejected() {
        let (state, notifier) = test_state().await;

        let err = join_game(&state, CHAT, 42, "ann".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::GameNotFound));
        assert_eq!(
            notifier.chat_notes(),
            vec![(CHAT, ChatNotification::GameNotFound)]
        );
    }

    #[tokio::test]
    async fn stop_draws_mutual_pairs_and_notifies_everyone() {
        let (state, notifier) = test_state().await;
        let game = start_game(&state, CHAT, ADMIN, "USD".into(), 100)
            .await
            .unwrap();
        for (user_id, name) in [(10, "ann"), (11, "bob"), (12, "cat"), (13, "dan")] {
            join_game(&state, CHAT, user_id, name.into()).await.unwrap();
        }

        let outcome = stop_game(&state, CHAT, ADMIN, None).await.unwrap();
        assert_eq!(outcome.paired, 4);
        assert!(!outcome.odd);
        assert_eq!(outcome.notified, 4);
        assert_eq!(outcome.game.state, GameState::Closed);

        let participants = participants_of(&state, game.id).await;
        let by_id: HashMap<_, _> = participants.iter().map(|p| (p.id, p)).collect();
        let by_user: HashMap<_, _> = participants.iter().map(|p| (p.user_id, p)).collect();
        for participant in &participants {
            let target = participant.assigned_to_id.expect("everyone is paired");
            assert_ne!(target, participant.id);
            assert_eq!(by_id[&target].assigned_to_id, Some(participant.id));
        }

        // Each member privately learns the right recipient and the terms.
        let user_notes = notifier.user_notes();
        assert_eq!(user_notes.len(), 4);
        for (user_id, note) in &user_notes {
            let UserNotification::ParticipantAssigned {
                recipient_name,
                currency,
                amount,
            } = note;
            assert_eq!(currency, "USD");
            assert_eq!(*amount, 100);
            let giver = by_user[user_id];
            let recipient = by_id[&giver.assigned_to_id.unwrap()];
            assert_eq!(recipient_name, &recipient.display_name);
        }

        assert!(notifier.chat_notes().contains(&(CHAT, ChatNotification::GameStopped)));

        // Registration is over for this chat until a reset.
        let err = join_game(&state, CHAT, 99, "eve".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::GameNotFound));
    }

    #[tokio::test]
    async fn stop_with_odd_headcount_warns_and_still_closes() {
        let (state, notifier) = test_state().await;
        let game = start_game(&state, CHAT, ADMIN, "EUR".into(), 30)
            .await
            .unwrap();
        for (user_id, name) in [(10, "ann"), (11, "bob"), (12, "cat")] {
            join_game(&state, CHAT, user_id, name.into()).await.unwrap();
        }

        let outcome = stop_game(&state, CHAT, ADMIN, None).await.unwrap();
        assert_eq!(outcome.paired, 2);
        assert!(outcome.odd);
        assert_eq!(outcome.notified, 2);

        let participants = participants_of(&state, game.id).await;
        let unassigned = participants
            .iter()
            .filter(|p| p.assigned_to_id.is_none())
            .count();
        assert_eq!(unassigned, 1);

        let notes = notifier.chat_notes();
        assert!(notes.contains(&(CHAT, ChatNotification::OddParticipantCount)));
        assert!(notes.contains(&(CHAT, ChatNotification::GameStopped)));
    }

    #[tokio::test]
    async fn stop_by_non_admin_changes_nothing() {
        let (state, notifier) = test_state().await;
        let game = start_game(&state, CHAT, ADMIN, "USD".into(), 100)
            .await
            .unwrap();
        join_game(&state, CHAT, 10, "ann".into()).await.unwrap();
        join_game(&state, CHAT, 11, "bob".into()).await.unwrap();

        let err = stop_game(&state, CHAT, 10, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { user_id: 10 }));

        let store = state.require_store().await.unwrap();
        let persisted = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(persisted.state, GameState::Open);
        assert!(
            participants_of(&state, game.id)
                .await
                .iter()
                .all(|p| p.assigned_to_id.is_none())
        );
        assert!(notifier.chat_notes().contains(&(CHAT, ChatNotification::Unauthorized)));
    }

    #[tokio::test]
    async fn stop_on_empty_game_reports_and_stays_open() {
        let (state, notifier) = test_state().await;
        let game = start_game(&state, CHAT, ADMIN, "USD".into(), 100)
            .await
            .unwrap();

        let err = stop_game(&state, CHAT, ADMIN, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NoParticipants));

        let store = state.require_store().await.unwrap();
        let persisted = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(persisted.state, GameState::Open);
        assert!(notifier.chat_notes().contains(&(CHAT, ChatNotification::NoParticipants)));
    }

    #[tokio::test]
    async fn stop_without_game_reports_not_found() {
        let (state, notifier) = test_state().await;

        let err = stop_game(&state, CHAT, ADMIN, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::GameNotFound));
        assert_eq!(
            notifier.chat_notes(),
            vec![(CHAT, ChatNotification::GameNotFound)]
        );
    }

    #[tokio::test]
    async fn reset_wipes_the_game_and_its_participants() {
        let (state, notifier) = test_state().await;
        let game = start_game(&state, CHAT, ADMIN, "USD".into(), 100)
            .await
            .unwrap();
        join_game(&state, CHAT, 10, "ann".into()).await.unwrap();
        join_game(&state, CHAT, 11, "bob".into()).await.unwrap();
        stop_game(&state, CHAT, ADMIN, None).await.unwrap();

        reset_game(&state, CHAT, ADMIN, Some(game.id)).await.unwrap();

        let store = state.require_store().await.unwrap();
        assert!(store.find_game_by_chat(CHAT).await.unwrap().is_none());
        assert!(participants_of(&state, game.id).await.is_empty());
        assert!(notifier.chat_notes().contains(&(CHAT, ChatNotification::GameReset)));

        // The chat is back to square one and can host a fresh game.
        start_game(&state, CHAT, ADMIN, "EUR".into(), 20)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reset_unknown_game_reports_not_found() {
        let (state, _notifier) = test_state().await;

        let err = reset_game(&state, CHAT, ADMIN, Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::GameNotFound));
    }
}
