use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::GameError;
use crate::models::game::{Game, GameId};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("game {0} is not stored")]
    Missing(GameId),
    #[error("game {0} is already stored")]
    Duplicate(GameId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<RepositoryError> for GameError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Missing(id) => GameError::GameNotFound(id),
            other => GameError::Persistence(other.to_string()),
        }
    }
}

/// Typed storage for whole games. The engine loads a snapshot, works on it
/// and writes it back; implementations never see partial updates.
pub trait GameRepository: Send + Sync {
    fn load_game(&self, id: GameId) -> Result<Option<Game>, RepositoryError>;
    fn insert_game(&self, game: Game) -> Result<(), RepositoryError>;
    fn save_game(&self, game: Game) -> Result<(), RepositoryError>;
    fn delete_game(&self, id: GameId) -> Result<(), RepositoryError>;
    fn game_ids(&self) -> Result<Vec<GameId>, RepositoryError>;

    fn exists(&self, id: GameId) -> Result<bool, RepositoryError> {
        Ok(self.load_game(id)?.is_some())
    }
}

#[derive(Default)]
pub struct InMemoryGameRepository {
    games: RwLock<HashMap<GameId, Game>>,
}

impl InMemoryGameRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Unavailable("lock poisoned".to_string())
}

impl GameRepository for InMemoryGameRepository {
    fn load_game(&self, id: GameId) -> Result<Option<Game>, RepositoryError> {
        let games = self.games.read().map_err(poisoned)?;
        Ok(games.get(&id).cloned())
    }

    fn insert_game(&self, game: Game) -> Result<(), RepositoryError> {
        let mut games = self.games.write().map_err(poisoned)?;
        if games.contains_key(&game.id) {
            return Err(RepositoryError::Duplicate(game.id));
        }
        games.insert(game.id, game);
        Ok(())
    }

    fn save_game(&self, game: Game) -> Result<(), RepositoryError> {
        let mut games = self.games.write().map_err(poisoned)?;
        match games.get_mut(&game.id) {
            Some(slot) => {
                *slot = game;
                Ok(())
            }
            None => Err(RepositoryError::Missing(game.id)),
        }
    }

    fn delete_game(&self, id: GameId) -> Result<(), RepositoryError> {
        let mut games = self.games.write().map_err(poisoned)?;
        games.remove(&id).map(|_| ()).ok_or(RepositoryError::Missing(id))
    }

    fn game_ids(&self) -> Result<Vec<GameId>, RepositoryError> {
        let games = self.games.read().map_err(poisoned)?;
        let mut ids: Vec<GameId> = games.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn exists(&self, id: GameId) -> Result<bool, RepositoryError> {
        let games = self.games.read().map_err(poisoned)?;
        Ok(games.contains_key(&id))
    }
}
