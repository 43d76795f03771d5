use serde::{Deserialize, Serialize};

use super::role::Role;

/// Hard upper bound on seats in one game; also the valid player id range.
pub const MAX_PLAYERS: usize = 50;
pub const MIN_PLAYERS: usize = 4;
/// No single timer setting may exceed one day.
pub const MAX_TIMER_SECS: u64 = 86_400;

/// How many of each special role to deal. Whatever is left over becomes a
/// villager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleCounts {
    pub werewolves: u32,
    pub alpha_wolves: u32,
    pub seers: u32,
    pub witches: u32,
    pub hunters: u32,
    pub cupids: u32,
    pub bodyguards: u32,
    pub paranormal_investigators: u32,
    pub lycans: u32,
    pub spies: u32,
    pub fools: u32,
    pub pacifists: u32,
    pub elders: u32,
}

impl Default for RoleCounts {
    fn default() -> Self {
        Self {
            werewolves: 2,
            alpha_wolves: 0,
            seers: 1,
            witches: 1,
            hunters: 1,
            cupids: 1,
            bodyguards: 1,
            paranormal_investigators: 0,
            lycans: 0,
            spies: 0,
            fools: 0,
            pacifists: 0,
            elders: 0,
        }
    }
}

impl RoleCounts {
    /// Only wolves, every other special set to zero.
    pub fn wolves_only(werewolves: u32) -> Self {
        Self {
            werewolves,
            alpha_wolves: 0,
            seers: 0,
            witches: 0,
            hunters: 0,
            cupids: 0,
            bodyguards: 0,
            paranormal_investigators: 0,
            lycans: 0,
            spies: 0,
            fools: 0,
            pacifists: 0,
            elders: 0,
        }
    }

    pub fn entries(&self) -> [(Role, u32); 13] {
        [
            (Role::Werewolf, self.werewolves),
            (Role::AlphaWolf, self.alpha_wolves),
            (Role::Seer, self.seers),
            (Role::Witch, self.witches),
            (Role::Hunter, self.hunters),
            (Role::Cupid, self.cupids),
            (Role::Bodyguard, self.bodyguards),
            (Role::ParanormalInvestigator, self.paranormal_investigators),
            (Role::Lycan, self.lycans),
            (Role::Spy, self.spies),
            (Role::Fool, self.fools),
            (Role::Pacifist, self.pacifists),
            (Role::Elder, self.elders),
        ]
    }

    pub fn total(&self) -> usize {
        self.entries().iter().map(|(_, n)| *n as usize).sum()
    }

    pub fn wolf_total(&self) -> usize {
        self.werewolves as usize + self.alpha_wolves as usize
    }
}

/// Phase durations in seconds. The `*_per_player` settings add that many
/// seconds for every living player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTimers {
    pub game_setup: u64,
    pub night_stage: u64,
    pub night_stage_per_player: u64,
    pub later_night_stage: u64,
    pub later_night_stage_per_player: u64,
    pub announce_dead: u64,
    pub mayor_election: u64,
    pub discussion: u64,
    pub discussion_per_player: u64,
    pub accusations: u64,
    pub voting: u64,
    pub runoff: u64,
    pub runoff_per_player: u64,
    pub post_voting: u64,
}

impl Default for PhaseTimers {
    fn default() -> Self {
        Self {
            game_setup: 120,
            night_stage: 60,
            night_stage_per_player: 4,
            later_night_stage: 50,
            later_night_stage_per_player: 3,
            announce_dead: 20,
            mayor_election: 300,
            discussion: 550,
            discussion_per_player: 10,
            accusations: 120,
            voting: 300,
            runoff: 200,
            runoff_per_player: 5,
            post_voting: 20,
        }
    }
}

impl PhaseTimers {
    fn entries(&self) -> [(&'static str, u64); 14] {
        [
            ("game_setup", self.game_setup),
            ("night_stage", self.night_stage),
            ("night_stage_per_player", self.night_stage_per_player),
            ("later_night_stage", self.later_night_stage),
            ("later_night_stage_per_player", self.later_night_stage_per_player),
            ("announce_dead", self.announce_dead),
            ("mayor_election", self.mayor_election),
            ("discussion", self.discussion),
            ("discussion_per_player", self.discussion_per_player),
            ("accusations", self.accusations),
            ("voting", self.voting),
            ("runoff", self.runoff),
            ("runoff_per_player", self.runoff_per_player),
            ("post_voting", self.post_voting),
        ]
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.entries().iter().find(|(_, secs)| *secs > MAX_TIMER_SECS) {
            Some((name, _)) => Err(format!("timer {} may not exceed {} seconds", name, MAX_TIMER_SECS)),
            None => Ok(()),
        }
    }
}

/// Per-game ruleset, chosen by the host while the game is in setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub max_players: usize,
    pub min_players: usize,
    pub roles: RoleCounts,
    pub timers: PhaseTimers,
    pub mayor_enabled: bool,
    pub mayor_handoff: bool,
    pub reveal_roles_on_death: bool,
    pub seer_sees_identity: bool,
    pub werewolves_unanimous: bool,
    pub witch_can_heal_self: bool,
    pub witch_heal_potions: u32,
    pub witch_poison_potions: u32,
    pub random_roles: bool,
    pub random_role_bonus: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: 10,
            min_players: MIN_PLAYERS,
            roles: RoleCounts::default(),
            timers: PhaseTimers::default(),
            mayor_enabled: true,
            mayor_handoff: true,
            reveal_roles_on_death: true,
            seer_sees_identity: true,
            werewolves_unanimous: true,
            witch_can_heal_self: true,
            witch_heal_potions: 1,
            witch_poison_potions: 1,
            random_roles: false,
            random_role_bonus: 2,
        }
    }
}

impl GameConfig {
    /// Checks the ruleset on its own, independent of who has joined.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_players > MAX_PLAYERS {
            return Err(format!("max_players may not exceed {}", MAX_PLAYERS));
        }
        if self.min_players < 2 || self.min_players > self.max_players {
            return Err("min_players must be between 2 and max_players".to_string());
        }
        if self.roles.wolf_total() == 0 {
            return Err("at least one werewolf is required".to_string());
        }
        if self.roles.total() > self.max_players {
            return Err(format!(
                "{} special roles configured but only {} seats",
                self.roles.total(),
                self.max_players
            ));
        }
        if self.random_roles
            && self.roles.wolf_total() + self.random_role_bonus as usize > self.max_players
        {
            return Err("random role bonus does not fit the seat count".to_string());
        }
        self.timers.validate()
    }
}
