use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::GameConfig;
use super::log::{GameLog, LogKind};
use super::role::{NightStage, Role};

pub type PlayerId = u32;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WitchState {
    pub heal_potions: u32,
    pub poison_potions: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub role: Option<Role>,
    pub is_alive: bool,
    pub is_ready: bool,
    pub is_host: bool,
    pub is_mayor: bool,
    pub token: u64,
    pub lover: Option<PlayerId>,
    pub witch: WitchState,
    pub last_protected: Option<PlayerId>,
    pub investigation_used: bool,
    pub conversions_left: u32,
    pub spare_life: bool,
    pub hunter_shot_pending: bool,
    pub mayor_handoff_pending: bool,
    pub private_log: GameLog,
}

impl Player {
    pub fn new(id: PlayerId, name: String, token: u64) -> Self {
        Self {
            id,
            name,
            role: None,
            is_alive: true,
            is_ready: false,
            is_host: false,
            is_mayor: false,
            token,
            lover: None,
            witch: WitchState::default(),
            last_protected: None,
            investigation_used: false,
            conversions_left: 0,
            spare_life: false,
            hunter_shot_pending: false,
            mayor_handoff_pending: false,
            private_log: GameLog::new(),
        }
    }

    /// Deals a role and resets the ability state that comes with it.
    pub fn assign_role(&mut self, role: Role, config: &GameConfig) {
        self.role = Some(role);
        self.witch = WitchState::default();
        self.investigation_used = false;
        self.conversions_left = 0;
        self.spare_life = false;
        match role {
            Role::Witch => {
                self.witch = WitchState {
                    heal_potions: config.witch_heal_potions,
                    poison_potions: config.witch_poison_potions,
                }
            }
            Role::AlphaWolf => self.conversions_left = 1,
            Role::Elder => self.spare_life = true,
            _ => {}
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    pub fn is_werewolf(&self) -> bool {
        self.role.map(Role::is_werewolf).unwrap_or(false)
    }

    pub fn has_pending_window(&self) -> bool {
        self.hunter_shot_pending || self.mayor_handoff_pending
    }

    /// Whether this player still owes an action in the given night stage.
    /// Spent one-shot abilities do not hold up the night.
    pub fn acts_in(&self, stage: NightStage, night: u32) -> bool {
        if !self.is_alive {
            return false;
        }
        let Some(role) = self.role else {
            return false;
        };
        if role.night_stage(night) != Some(stage) {
            return false;
        }
        match role {
            Role::ParanormalInvestigator => !self.investigation_used,
            Role::Witch => self.witch.heal_potions > 0 || self.witch.poison_potions > 0,
            _ => true,
        }
    }

    pub fn tell(&mut self, night: u32, content: String, now: DateTime<Utc>) {
        self.private_log.append(night, LogKind::Private, content, now);
    }
}
