use crate::error::GameError;
use crate::models::{
    config::MAX_PLAYERS,
    game::{GameId, MAX_GAME_ID, MIN_GAME_ID},
    player::PlayerId,
};

pub const MAX_NAME_LEN: usize = 50;

pub fn validate_game_id(id: GameId) -> Result<GameId, GameError> {
    if (MIN_GAME_ID..=MAX_GAME_ID).contains(&id) {
        Ok(id)
    } else {
        Err(GameError::Validation(format!(
            "game id must be between {} and {}",
            MIN_GAME_ID, MAX_GAME_ID
        )))
    }
}

pub fn validate_player_id(id: PlayerId) -> Result<PlayerId, GameError> {
    if id >= 1 && id as usize <= MAX_PLAYERS {
        Ok(id)
    } else {
        Err(GameError::Validation(format!(
            "player id must be between 1 and {}",
            MAX_PLAYERS
        )))
    }
}

/// Trims the name and checks it is 1 to 50 letters, digits, spaces, `-` or `_`.
pub fn validate_player_name(name: &str) -> Result<String, GameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GameError::Validation("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(GameError::Validation(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    let allowed = |c: char| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_';
    if !name.chars().all(allowed) {
        return Err(GameError::Validation(
            "name may only contain letters, digits, spaces, '-' and '_'".to_string(),
        ));
    }
    Ok(name.to_string())
}
