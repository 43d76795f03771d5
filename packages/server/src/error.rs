use crate::models::{game::GameId, player::PlayerId};

/// Everything the engine can refuse. Messages are safe to show to players
/// and never include hidden game state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("action not allowed: {0}")]
    IllegalAction(String),
    #[error("invalid game configuration: {0}")]
    Configuration(String),
    #[error("game {0} not found")]
    GameNotFound(GameId),
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),
    #[error("game is full")]
    GameFull,
    #[error("game already started")]
    GameAlreadyStarted,
    #[error("game finished")]
    GameFinished,
    #[error("invalid player token")]
    Unauthorized,
    #[error("storage unavailable: {0}")]
    Persistence(String),
}

impl GameError {
    pub fn illegal(message: impl Into<String>) -> Self {
        GameError::IllegalAction(message.into())
    }
}
