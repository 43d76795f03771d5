use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::config::GameConfig;
use super::log::{GameLog, LogKind};
use super::player::{Player, PlayerId};
use super::role::{NightStage, Role};

pub type GameId = u32;

pub const MIN_GAME_ID: GameId = 10000;
pub const MAX_GAME_ID: GameId = 99999;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Game {
    pub id: GameId,
    pub phase: GamePhase,
    pub night: u32,
    pub config: GameConfig,
    pub players: Vec<Player>,
    pub night_actions: BTreeMap<PlayerId, NightAction>,
    pub votes: BTreeMap<PlayerId, Option<PlayerId>>, // voter -> target, None = abstain
    pub accusations: BTreeMap<PlayerId, PlayerId>,  // accuser -> accused
    pub candidates: BTreeSet<PlayerId>,
    pub advance_requests: BTreeSet<PlayerId>,
    pub mayor_election_due: bool,
    pub phase_tick: u64,
    pub phase_started_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub log: GameLog,
    pub result: GameResult,
}

impl std::fmt::Display for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Game {{ id: {}, phase: {:?}, night: {}, players: {}, alive: {}, result: {:?} }}",
            self.id,
            self.phase,
            self.night,
            self.players.len(),
            self.living().count(),
            self.result
        )
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Setup,
    GameSetup,
    NightBegin,
    Night(NightStage),
    NightEnd,
    AnnounceDead,
    MayorElection,
    MayorRunoff,
    Discussion,
    Accusations,
    Voting,
    Runoff,
    PostVoting,
    Victory,
}

impl GamePhase {
    /// Roles have been dealt and the first night is underway or past.
    pub fn is_past_game_setup(self) -> bool {
        !matches!(self, GamePhase::Setup | GamePhase::GameSetup)
    }

    pub fn is_vote(self) -> bool {
        matches!(
            self,
            GamePhase::MayorElection | GamePhase::MayorRunoff | GamePhase::Voting | GamePhase::Runoff
        )
    }

    pub fn is_mayor_vote(self) -> bool {
        matches!(self, GamePhase::MayorElection | GamePhase::MayorRunoff)
    }

    pub fn label(self) -> &'static str {
        match self {
            GamePhase::Setup => "setup",
            GamePhase::GameSetup => "game_setup",
            GamePhase::NightBegin => "night_begin",
            GamePhase::Night(_) => "night",
            GamePhase::NightEnd => "night_end",
            GamePhase::AnnounceDead => "announce_dead",
            GamePhase::MayorElection => "mayor_election",
            GamePhase::MayorRunoff => "mayor_runoff",
            GamePhase::Discussion => "discussion",
            GamePhase::Accusations => "accusations",
            GamePhase::Voting => "voting",
            GamePhase::Runoff => "runoff",
            GamePhase::PostVoting => "post_voting",
            GamePhase::Victory => "victory",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "winner")]
pub enum GameResult {
    InProgress,
    VillageWin,
    WerewolfWin,
    FoolWin { player: PlayerId },
    LoversWin { lovers: [PlayerId; 2] },
}

impl GameResult {
    pub fn is_decided(&self) -> bool {
        !matches!(self, GameResult::InProgress)
    }

    pub fn announcement(&self) -> &'static str {
        match self {
            GameResult::InProgress => "The game goes on.",
            GameResult::VillageWin => "The village has driven out every werewolf.",
            GameResult::WerewolfWin => "The werewolves have devoured the village.",
            GameResult::FoolWin { .. } => "The fool was lynched and wins alone.",
            GameResult::LoversWin { .. } => "The lovers are the last ones standing.",
        }
    }
}

/// A secret night choice. One per actor per night; resubmission replaces it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NightAction {
    pub actor: PlayerId,
    pub role: Role,
    pub kind: NightActionKind,
    pub submitted_tick: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum NightActionKind {
    Link { first: PlayerId, second: PlayerId },
    Protect { target: PlayerId },
    Inspect { target: PlayerId },
    Investigate { target: PlayerId },
    Spy { target: PlayerId, guess: Role },
    Kill { target: PlayerId, #[serde(default)] convert: bool },
    Brew { heal: Option<PlayerId>, poison: Option<PlayerId> },
    Skip,
}

impl NightActionKind {
    /// The role that may submit this kind of action.
    pub fn permits(&self, role: Role) -> bool {
        match self {
            NightActionKind::Link { .. } => role == Role::Cupid,
            NightActionKind::Protect { .. } => role == Role::Bodyguard,
            NightActionKind::Inspect { .. } => role == Role::Seer,
            NightActionKind::Investigate { .. } => role == Role::ParanormalInvestigator,
            NightActionKind::Spy { .. } => role == Role::Spy,
            NightActionKind::Kill { .. } => role.is_werewolf(),
            NightActionKind::Brew { .. } => role == Role::Witch,
            NightActionKind::Skip => true,
        }
    }
}

/// Everything a player can submit to a running game.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "payload")]
pub enum GameAction {
    Ready,
    NightAction(NightActionKind),
    Vote { target: Option<PlayerId> },
    Accuse { target: PlayerId },
    HunterRevengeShot { target: PlayerId },
    MayorHandoff { successor: PlayerId },
    PhaseAdvanceRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Werewolves,
    Poison,
    Lynched,
    Grief,
    HunterShot,
}

impl DeathCause {
    fn describe(self) -> &'static str {
        match self {
            DeathCause::Werewolves => "was killed by the werewolves",
            DeathCause::Poison => "was poisoned",
            DeathCause::Lynched => "was lynched by the village",
            DeathCause::Grief => "died of a broken heart",
            DeathCause::HunterShot => "was shot by the hunter",
        }
    }
}

impl Game {
    pub fn new(id: GameId, config: GameConfig, now: DateTime<Utc>) -> Self {
        Game {
            id,
            phase: GamePhase::Setup,
            night: 1,
            config,
            players: Vec::new(),
            night_actions: BTreeMap::new(),
            votes: BTreeMap::new(),
            accusations: BTreeMap::new(),
            candidates: BTreeSet::new(),
            advance_requests: BTreeSet::new(),
            mayor_election_due: false,
            phase_tick: 0,
            phase_started_at: now,
            deadline: None,
            created_at: now,
            last_activity: now,
            log: GameLog::new(),
            result: GameResult::InProgress,
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn living(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive)
    }

    pub fn living_ids(&self) -> Vec<PlayerId> {
        self.living().map(|p| p.id).collect()
    }

    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.player(id).map(|p| p.is_alive).unwrap_or(false)
    }

    pub fn name_of(&self, id: PlayerId) -> String {
        self.player(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Player {}", id))
    }

    pub fn mayor(&self) -> Option<&Player> {
        self.living().find(|p| p.is_mayor)
    }

    pub fn has_pending_windows(&self) -> bool {
        self.players.iter().any(Player::has_pending_window)
    }

    pub fn hunter_shot_pending(&self) -> bool {
        self.players.iter().any(|p| p.hunter_shot_pending)
    }

    pub fn log_public(&mut self, content: String, now: DateTime<Utc>) {
        self.log.append(self.night, LogKind::Public, content, now);
    }

    pub fn log_system(&mut self, content: String, now: DateTime<Utc>) {
        self.log.append(self.night, LogKind::System, content, now);
    }

    pub fn tell(&mut self, id: PlayerId, content: String, now: DateTime<Utc>) {
        let night = self.night;
        if let Some(player) = self.player_mut(id) {
            player.tell(night, content, now);
        }
    }

    /// Living players seated directly before and after `id`, wrapping around.
    pub fn living_neighbours(&self, id: PlayerId) -> Vec<PlayerId> {
        let seats = self.living_ids();
        let Some(pos) = seats.iter().position(|&p| p == id) else {
            return Vec::new();
        };
        if seats.len() < 2 {
            return Vec::new();
        }
        let left = seats[(pos + seats.len() - 1) % seats.len()];
        let right = seats[(pos + 1) % seats.len()];
        if left == right {
            vec![left]
        } else {
            vec![left, right]
        }
    }

    /// Applies a batch of deaths at once. Lovers follow their partner, dead
    /// hunters get their revenge shot, a dead mayor may name a successor.
    /// Returns everyone who actually died, in order.
    pub fn finalize_deaths(
        &mut self,
        deaths: Vec<(PlayerId, DeathCause)>,
        now: DateTime<Utc>,
    ) -> Vec<PlayerId> {
        let reveal = self.config.reveal_roles_on_death;
        let handoff = self.config.mayor_handoff;
        let mut queue: VecDeque<(PlayerId, DeathCause)> = deaths.into();
        let mut died = Vec::new();

        while let Some((id, cause)) = queue.pop_front() {
            let Some(player) = self.player_mut(id) else {
                continue;
            };
            if !player.is_alive {
                continue;
            }
            player.is_alive = false;
            if player.has_role(Role::Hunter) {
                player.hunter_shot_pending = true;
            }
            if player.is_mayor {
                if handoff {
                    player.mayor_handoff_pending = true;
                } else {
                    player.is_mayor = false;
                }
            }
            let lover = player.lover;
            let mut message = format!("{} {}.", player.name, cause.describe());
            if reveal {
                if let Some(role) = player.role {
                    message = format!("{} Role: {}.", message, role);
                }
            }
            died.push(id);
            tracing::debug!("game {}: player {} died ({:?})", self.id, id, cause);
            self.log_public(message, now);

            if let Some(lover) = lover {
                queue.push_back((lover, DeathCause::Grief));
            }
        }
        died
    }
}
