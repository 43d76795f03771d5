use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::GameError;
use crate::models::{
    config::GameConfig,
    game::{Game, GameAction, GameId, GamePhase, MAX_GAME_ID, MIN_GAME_ID},
    log::LogEntry,
    player::{Player, PlayerId},
    view::GameStateView,
};
use crate::services::{
    clock::Clock,
    phase,
    repository::{GameRepository, RepositoryError},
};
use crate::utils::validation::{validate_game_id, validate_player_id, validate_player_name};

const MAX_ID_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedPlayer {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub token: u64,
}

/// Entry point for every game operation. Each call on a game holds that
/// game's lock, works on a loaded copy and stores it only if the call
/// succeeded.
pub struct GameService {
    repository: Arc<dyn GameRepository>,
    clock: Arc<dyn Clock>,
    locks: Mutex<HashMap<GameId, Arc<Mutex<()>>>>,
}

impl GameService {
    pub fn new(repository: Arc<dyn GameRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn lock_for(&self, id: GameId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn transact<T, F>(&self, id: GameId, f: F) -> Result<T, GameError>
    where
        F: FnOnce(&mut Game, DateTime<Utc>) -> Result<T, GameError>,
    {
        let id = validate_game_id(id)?;
        if !self.repository.exists(id)? {
            return Err(GameError::GameNotFound(id));
        }
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        // reaped while we waited for the lock
        let Some(mut game) = self.repository.load_game(id)? else {
            self.locks.lock().await.remove(&id);
            return Err(GameError::GameNotFound(id));
        };
        let now = self.clock.now();
        let value = f(&mut game, now)?;
        self.repository.save_game(game)?;
        Ok(value)
    }

    fn load(&self, id: GameId) -> Result<Game, GameError> {
        let id = validate_game_id(id)?;
        self.repository
            .load_game(id)?
            .ok_or(GameError::GameNotFound(id))
    }

    pub async fn create_game(&self, config: GameConfig) -> Result<GameId, GameError> {
        config.validate().map_err(GameError::Configuration)?;
        let now = self.clock.now();

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = rand::thread_rng().gen_range(MIN_GAME_ID..=MAX_GAME_ID);
            if self.repository.exists(id)? {
                continue;
            }
            let mut game = Game::new(id, config.clone(), now);
            game.log_system("Game created.".to_string(), now);
            match self.repository.insert_game(game) {
                Ok(()) => {
                    tracing::info!("game {} created", id);
                    return Ok(id);
                }
                Err(RepositoryError::Duplicate(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        tracing::warn!("no free game id after {} attempts", MAX_ID_ATTEMPTS);
        Err(GameError::Persistence("no free game id".to_string()))
    }

    /// Replaces the ruleset. Host only, and only before the game starts.
    pub async fn configure_game(
        &self,
        id: GameId,
        host_id: PlayerId,
        config: GameConfig,
    ) -> Result<GameStateView, GameError> {
        let host_id = validate_player_id(host_id)?;
        config.validate().map_err(GameError::Configuration)?;
        self.transact(id, |game, now| {
            if game.phase != GamePhase::Setup {
                return Err(GameError::GameAlreadyStarted);
            }
            let host = game.player(host_id).ok_or(GameError::PlayerNotFound(host_id))?;
            if !host.is_host {
                return Err(GameError::illegal("only the host can change the rules"));
            }
            if game.players.len() > config.max_players {
                return Err(GameError::Configuration(format!(
                    "{} players have already joined",
                    game.players.len()
                )));
            }
            game.config = config;
            game.last_activity = now;
            game.log_system("Rules updated by the host.".to_string(), now);
            Ok(GameStateView::project(game, now))
        })
        .await
    }

    pub async fn join_game(&self, id: GameId, name: &str) -> Result<JoinedPlayer, GameError> {
        let name = validate_player_name(name)?;
        self.transact(id, |game, now| {
            match game.phase {
                GamePhase::Setup | GamePhase::GameSetup => {}
                GamePhase::Victory => return Err(GameError::GameFinished),
                _ => return Err(GameError::GameAlreadyStarted),
            }
            if game.players.len() >= game.config.max_players {
                return Err(GameError::GameFull);
            }
            if game.players.iter().any(|p| p.name.eq_ignore_ascii_case(&name)) {
                return Err(GameError::Validation("that name is taken".to_string()));
            }

            let player_id = game.players.len() as PlayerId + 1;
            let token = rand::thread_rng().gen::<u64>();
            let mut player = Player::new(player_id, name.clone(), token);
            player.is_host = game.players.is_empty();
            game.players.push(player);
            if game.phase == GamePhase::GameSetup {
                phase::seat_late_joiner(game, player_id, now);
            }
            game.last_activity = now;
            game.log_public(format!("{} joined the game.", name), now);
            tracing::info!("game {}: player {} joined", game.id, player_id);

            Ok(JoinedPlayer {
                game_id: game.id,
                player_id,
                token,
            })
        })
        .await
    }

    pub async fn submit_action(
        &self,
        id: GameId,
        player_id: PlayerId,
        action: GameAction,
    ) -> Result<GameStateView, GameError> {
        let player_id = validate_player_id(player_id)?;
        self.transact(id, |game, now| {
            let mut rng = rand::thread_rng();
            phase::apply_action(game, player_id, action, &mut rng, now)?;
            game.last_activity = now;
            Ok(GameStateView::project(game, now))
        })
        .await
    }

    pub async fn get_state(&self, id: GameId) -> Result<GameStateView, GameError> {
        let game = self.load(id)?;
        Ok(GameStateView::project(&game, self.clock.now()))
    }

    pub async fn get_private_log(
        &self,
        id: GameId,
        player_id: PlayerId,
    ) -> Result<Vec<LogEntry>, GameError> {
        let player_id = validate_player_id(player_id)?;
        let game = self.load(id)?;
        let player = game
            .player(player_id)
            .ok_or(GameError::PlayerNotFound(player_id))?;
        Ok(player.private_log.entries().to_vec())
    }

    pub async fn authenticate(
        &self,
        id: GameId,
        player_id: PlayerId,
        token: u64,
    ) -> Result<(), GameError> {
        let player_id = validate_player_id(player_id)?;
        let game = self.load(id)?;
        match game.player(player_id) {
            Some(player) if player.token == token => Ok(()),
            Some(_) => Err(GameError::Unauthorized),
            None => Err(GameError::PlayerNotFound(player_id)),
        }
    }

    /// Fires the game's phase timer if it is due. Returns whether it fired.
    pub async fn tick(&self, id: GameId) -> Result<bool, GameError> {
        self.transact(id, |game, now| {
            let mut rng = rand::thread_rng();
            phase::on_timeout(game, &mut rng, now)
        })
        .await
    }

    pub async fn tick_all(&self) -> usize {
        let ids = match self.repository.game_ids() {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("tick skipped: {}", e);
                return 0;
            }
        };
        let mut fired = 0;
        for id in ids {
            match self.tick(id).await {
                Ok(true) => fired += 1,
                Ok(false) | Err(GameError::GameNotFound(_)) => {}
                Err(e) => tracing::warn!("game {}: tick failed: {}", id, e),
            }
        }
        fired
    }

    /// Deletes every game nobody has touched for `max_idle`.
    pub async fn reap_idle_games(&self, max_idle: Duration) -> Result<Vec<GameId>, GameError> {
        let mut reaped = Vec::new();
        for id in self.repository.game_ids()? {
            let lock = self.lock_for(id).await;
            let _guard = lock.lock().await;
            let Some(game) = self.repository.load_game(id)? else {
                continue;
            };
            if self.clock.now() - game.last_activity < max_idle {
                continue;
            }
            self.repository.delete_game(id)?;
            self.locks.lock().await.remove(&id);
            reaped.push(id);
            tracing::info!("game {} reaped, idle since {}", id, game.last_activity);
        }
        Ok(reaped)
    }

    /// The complete stored game, secrets included. Never handed to players.
    pub async fn snapshot(&self, id: GameId) -> Result<Game, GameError> {
        self.load(id)
    }
}
