use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Villager,
    Werewolf,
    Seer,
    Witch,
    Hunter,
    Cupid,
    Bodyguard,
    ParanormalInvestigator,
    Lycan,
    Spy,
    Fool,
    Pacifist,
    Elder,
    AlphaWolf,
}

/// Win-aligned grouping used by the victory check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Village,
    Werewolves,
    /// Killable, but counted for neither side.
    Neutral,
}

/// Sub-steps of a night. Roles act in this order so the witch can react to
/// the werewolves' choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NightStage {
    Scouts,
    Wolves,
    Witch,
}

impl NightStage {
    pub fn next(self) -> Option<NightStage> {
        match self {
            NightStage::Scouts => Some(NightStage::Wolves),
            NightStage::Wolves => Some(NightStage::Witch),
            NightStage::Witch => None,
        }
    }
}

impl Role {
    /// Non-wolf roles that random role selection may hand out.
    pub const RANDOM_SPECIALS: [Role; 11] = [
        Role::Seer,
        Role::Witch,
        Role::Hunter,
        Role::Cupid,
        Role::Bodyguard,
        Role::ParanormalInvestigator,
        Role::Lycan,
        Role::Spy,
        Role::Fool,
        Role::Pacifist,
        Role::Elder,
    ];

    pub fn faction(self) -> Faction {
        match self {
            Role::Werewolf | Role::AlphaWolf => Faction::Werewolves,
            Role::Fool | Role::Pacifist => Faction::Neutral,
            _ => Faction::Village,
        }
    }

    pub fn is_werewolf(self) -> bool {
        self.faction() == Faction::Werewolves
    }

    /// What the seer and the paranormal investigator perceive.
    pub fn apparent_role(self) -> Role {
        match self {
            Role::Lycan => Role::Werewolf,
            other => other,
        }
    }

    pub fn apparent_faction(self) -> Faction {
        self.apparent_role().faction()
    }

    /// The night stage in which this role acts, if it acts at all on the given
    /// night. Whether the holder still has something to spend (potions, a
    /// one-shot investigation) is player state and checked by the registry.
    pub fn night_stage(self, night: u32) -> Option<NightStage> {
        match self {
            Role::Cupid if night == 1 => Some(NightStage::Scouts),
            Role::Bodyguard | Role::Seer | Role::ParanormalInvestigator | Role::Spy => {
                Some(NightStage::Scouts)
            }
            Role::Werewolf | Role::AlphaWolf => Some(NightStage::Wolves),
            Role::Witch => Some(NightStage::Witch),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Villager => "villager",
            Role::Werewolf => "werewolf",
            Role::Seer => "seer",
            Role::Witch => "witch",
            Role::Hunter => "hunter",
            Role::Cupid => "cupid",
            Role::Bodyguard => "bodyguard",
            Role::ParanormalInvestigator => "paranormal investigator",
            Role::Lycan => "lycan",
            Role::Spy => "spy",
            Role::Fool => "fool",
            Role::Pacifist => "pacifist",
            Role::Elder => "elder",
            Role::AlphaWolf => "alpha wolf",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Faction::Village => f.write_str("village"),
            Faction::Werewolves => f.write_str("werewolves"),
            Faction::Neutral => f.write_str("neutral"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factions() {
        assert_eq!(Role::AlphaWolf.faction(), Faction::Werewolves);
        assert_eq!(Role::Lycan.faction(), Faction::Village);
        assert_eq!(Role::Fool.faction(), Faction::Neutral);
        assert_eq!(Role::Pacifist.faction(), Faction::Neutral);
        assert_eq!(Role::Elder.faction(), Faction::Village);
    }

    #[test]
    fn test_lycan_looks_like_a_wolf() {
        assert_eq!(Role::Lycan.apparent_role(), Role::Werewolf);
        assert_eq!(Role::Lycan.apparent_faction(), Faction::Werewolves);
        assert_eq!(Role::Seer.apparent_role(), Role::Seer);
    }

    #[test]
    fn test_cupid_only_acts_first_night() {
        assert_eq!(Role::Cupid.night_stage(1), Some(NightStage::Scouts));
        assert_eq!(Role::Cupid.night_stage(2), None);
        assert_eq!(Role::Witch.night_stage(5), Some(NightStage::Witch));
        assert_eq!(Role::Hunter.night_stage(1), None);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Role::ParanormalInvestigator).unwrap();
        assert_eq!(json, "\"paranormal_investigator\"");
        let role: Role = serde_json::from_str("\"alpha_wolf\"").unwrap();
        assert_eq!(role, Role::AlphaWolf);
    }
}
