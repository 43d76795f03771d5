use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::config::GameConfig;
use super::game::{Game, GameId, GamePhase, GameResult};
use super::log::LogEntry;
use super::player::{Player, PlayerId};
use super::role::Role;

/// What anyone polling a game may see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateView {
    pub id: GameId,
    pub phase: GamePhase,
    pub night: u32,
    pub phase_started_at: DateTime<Utc>,
    pub seconds_remaining: Option<u64>,
    pub players: Vec<PlayerView>,
    pub settings: GameConfig,
    pub candidates: Vec<PlayerId>,
    pub accusations: BTreeMap<PlayerId, PlayerId>,
    pub votes_cast: usize,
    pub result: GameResult,
    pub log: Vec<LogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub alive: bool,
    pub ready: bool,
    pub host: bool,
    pub mayor: bool,
    /// Only present once the role is public knowledge.
    pub role: Option<Role>,
}

impl PlayerView {
    fn project(player: &Player, game: &Game) -> Self {
        let revealed = game.phase == GamePhase::Victory
            || (!player.is_alive && game.config.reveal_roles_on_death);
        PlayerView {
            id: player.id,
            name: player.name.clone(),
            alive: player.is_alive,
            ready: player.is_ready,
            host: player.is_host,
            mayor: player.is_mayor,
            role: if revealed { player.role } else { None },
        }
    }
}

impl GameStateView {
    pub fn project(game: &Game, now: DateTime<Utc>) -> Self {
        let seconds_remaining = game
            .deadline
            .map(|deadline| (deadline - now).num_seconds().max(0) as u64);
        GameStateView {
            id: game.id,
            phase: game.phase,
            night: game.night,
            phase_started_at: game.phase_started_at,
            seconds_remaining,
            players: game
                .players
                .iter()
                .map(|p| PlayerView::project(p, game))
                .collect(),
            settings: game.config.clone(),
            candidates: game.candidates.iter().copied().collect(),
            accusations: game.accusations.clone(),
            votes_cast: game.votes.len(),
            result: game.result.clone(),
            log: game.log.entries().to_vec(),
        }
    }
}
