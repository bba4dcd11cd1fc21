use thiserror::Error;

use crate::dao::models::{GameEntity, GameState};

/// Lifecycle phase of a chat's game.
///
/// A reset destroys the game entirely, so `NoGame` doubles as the terminal
/// state and the starting point of the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// The chat has no game; only `/start` is meaningful.
    NoGame,
    /// Registration is open: members may join, admins may stop or reset.
    Open,
    /// Pairs are drawn; the game lingers until an admin resets it.
    Closed,
}

/// Lifecycle operations that drive the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Admin opens registration for a new game.
    StartGame,
    /// Member registers in the open game.
    JoinGame,
    /// Admin closes registration and triggers the pairing draw.
    StopGame,
    /// Admin wipes the game and its participants.
    ResetGame,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the chat was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: LifecycleEvent,
}

impl GamePhase {
    /// Derive the phase from the chat's persisted game, if any.
    pub fn of(game: Option<&GameEntity>) -> Self {
        match game {
            None => GamePhase::NoGame,
            Some(game) => match game.state {
                GameState::Open => GamePhase::Open,
                GameState::Closed => GamePhase::Closed,
            },
        }
    }

    /// Compute the phase after `event`, or reject the transition.
    pub fn apply(self, event: LifecycleEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self, event) {
            (GamePhase::NoGame, LifecycleEvent::StartGame) => GamePhase::Open,
            (GamePhase::Open, LifecycleEvent::JoinGame) => GamePhase::Open,
            (GamePhase::Open, LifecycleEvent::StopGame) => GamePhase::Closed,
            (GamePhase::Open | GamePhase::Closed, LifecycleEvent::ResetGame) => GamePhase::NoGame,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle_through_a_game() {
        let phase = GamePhase::NoGame;
        let phase = phase.apply(LifecycleEvent::StartGame).unwrap();
        assert_eq!(phase, GamePhase::Open);
        let phase = phase.apply(LifecycleEvent::JoinGame).unwrap();
        let phase = phase.apply(LifecycleEvent::JoinGame).unwrap();
        assert_eq!(phase, GamePhase::Open);
        let phase = phase.apply(LifecycleEvent::StopGame).unwrap();
        assert_eq!(phase, GamePhase::Closed);
        let phase = phase.apply(LifecycleEvent::ResetGame).unwrap();
        assert_eq!(phase, GamePhase::NoGame);
    }

    #[test]
    fn start_rejected_while_a_game_exists() {
        for from in [GamePhase::Open, GamePhase::Closed] {
            let err = from.apply(LifecycleEvent::StartGame).unwrap_err();
            assert_eq!(err.from, from);
            assert_eq!(err.event, LifecycleEvent::StartGame);
        }
    }

    #[test]
    fn closed_game_accepts_only_reset() {
        assert!(GamePhase::Closed.apply(LifecycleEvent::JoinGame).is_err());
        assert!(GamePhase::Closed.apply(LifecycleEvent::StopGame).is_err());
        assert!(GamePhase::Closed.apply(LifecycleEvent::ResetGame).is_ok());
    }

    #[test]
    fn nothing_but_start_without_a_game() {
        for event in [
            LifecycleEvent::JoinGame,
            LifecycleEvent::StopGame,
            LifecycleEvent::ResetGame,
        ] {
            assert!(GamePhase::NoGame.apply(event).is_err());
        }
    }

    #[test]
    fn phase_derives_from_persisted_state() {
        assert_eq!(GamePhase::of(None), GamePhase::NoGame);

        let mut game = GameEntity::new(1, "EUR".into(), 30);
        assert_eq!(GamePhase::of(Some(&game)), GamePhase::Open);
        game.state = GameState::Closed;
        assert_eq!(GamePhase::of(Some(&game)), GamePhase::Closed);
    }
}
