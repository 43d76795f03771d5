use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::GameError;
use crate::models::{
    game::{DeathCause, Game, GamePhase, NightAction, NightActionKind},
    player::PlayerId,
    role::{Faction, NightStage, Role},
};

/// What a resolved night produced, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightOutcome {
    pub attacked: Option<PlayerId>,
    pub attack_prevented: bool,
    pub converted: Option<PlayerId>,
    pub deaths: Vec<PlayerId>,
}

fn require_living_target(game: &Game, target: PlayerId) -> Result<(), GameError> {
    match game.player(target) {
        None => Err(GameError::PlayerNotFound(target)),
        Some(p) if !p.is_alive => Err(GameError::illegal("target is already dead")),
        Some(_) => Ok(()),
    }
}

/// Validates and stores a night choice. A second submission by the same actor
/// replaces the first.
pub fn record_night_action(
    game: &mut Game,
    actor: PlayerId,
    kind: NightActionKind,
) -> Result<(), GameError> {
    let GamePhase::Night(stage) = game.phase else {
        return Err(GameError::illegal("it is not night"));
    };
    let player = game.player(actor).ok_or(GameError::PlayerNotFound(actor))?;
    if !player.is_alive {
        return Err(GameError::illegal("dead players cannot act"));
    }
    let role = player
        .role
        .ok_or_else(|| GameError::illegal("no role assigned"))?;
    if !player.acts_in(stage, game.night) {
        return Err(GameError::illegal("you have nothing to do right now"));
    }
    if !kind.permits(role) {
        return Err(GameError::illegal(format!("a {} cannot do that", role)));
    }

    match &kind {
        NightActionKind::Link { first, second } => {
            if first == second {
                return Err(GameError::illegal("cupid must link two different players"));
            }
            require_living_target(game, *first)?;
            require_living_target(game, *second)?;
        }
        NightActionKind::Protect { target } => {
            require_living_target(game, *target)?;
            if player.last_protected == Some(*target) {
                return Err(GameError::illegal(
                    "the same player cannot be protected two nights in a row",
                ));
            }
        }
        NightActionKind::Inspect { target } | NightActionKind::Spy { target, .. } => {
            if *target == actor {
                return Err(GameError::illegal("you already know yourself"));
            }
            require_living_target(game, *target)?;
        }
        NightActionKind::Investigate { target } => require_living_target(game, *target)?,
        NightActionKind::Kill { target, convert } => {
            require_living_target(game, *target)?;
            if game.player(*target).map(|p| p.is_werewolf()).unwrap_or(false) {
                return Err(GameError::illegal("werewolves do not hunt their own"));
            }
            if *convert && (role != Role::AlphaWolf || player.conversions_left == 0) {
                return Err(GameError::illegal("no conversion left"));
            }
        }
        NightActionKind::Brew { heal, poison } => {
            if let Some(target) = heal {
                if player.witch.heal_potions == 0 {
                    return Err(GameError::illegal("the heal potion is used up"));
                }
                if *target == actor && !game.config.witch_can_heal_self {
                    return Err(GameError::illegal("self-healing is disabled in this game"));
                }
                require_living_target(game, *target)?;
            }
            if let Some(target) = poison {
                if player.witch.poison_potions == 0 {
                    return Err(GameError::illegal("the poison potion is used up"));
                }
                require_living_target(game, *target)?;
            }
        }
        NightActionKind::Skip => {}
    }

    let action = NightAction {
        actor,
        role,
        kind,
        submitted_tick: game.phase_tick,
    };
    game.night_actions.insert(actor, action);
    Ok(())
}

/// Living players who still owe an action in this stage.
pub fn stage_actors(game: &Game, stage: NightStage) -> Vec<PlayerId> {
    game.living()
        .filter(|p| p.acts_in(stage, game.night))
        .map(|p| p.id)
        .collect()
}

pub fn stage_complete(game: &Game, stage: NightStage) -> bool {
    stage_actors(game, stage)
        .iter()
        .all(|id| game.night_actions.contains_key(id))
}

/// The werewolves' victim for tonight, if they agree on one. Without the
/// unanimity rule a plurality suffices and ties go to the lowest player id.
pub fn wolf_target(game: &Game) -> Option<PlayerId> {
    let mut counts: BTreeMap<PlayerId, u32> = BTreeMap::new();
    for action in game.night_actions.values() {
        let NightActionKind::Kill { target, .. } = action.kind else {
            continue;
        };
        let still_a_wolf = game
            .player(action.actor)
            .map(|p| p.is_alive && p.is_werewolf())
            .unwrap_or(false);
        if still_a_wolf && game.is_alive(target) {
            *counts.entry(target).or_insert(0) += 1;
        }
    }

    if game.config.werewolves_unanimous && counts.len() > 1 {
        return None;
    }
    let top = counts.values().max().copied()?;
    // BTreeMap iterates in ascending id order, so the first leader is the lowest id.
    counts
        .into_iter()
        .find(|(_, n)| *n == top)
        .map(|(id, _)| id)
}

/// An alpha wolf who asked to convert tonight's victim and still can.
fn converting_alpha(game: &Game) -> Option<PlayerId> {
    game.night_actions.values().find_map(|action| match action.kind {
        NightActionKind::Kill { convert: true, .. } => game
            .player(action.actor)
            .filter(|p| p.is_alive && p.has_role(Role::AlphaWolf) && p.conversions_left > 0)
            .map(|p| p.id),
        _ => None,
    })
}

/// Tells every witch who will act tonight whom the werewolves picked.
pub fn brief_witches(game: &mut Game, now: DateTime<Utc>) {
    let message = match wolf_target(game) {
        Some(victim) => format!("The werewolves have chosen {}.", game.name_of(victim)),
        None => "The werewolves found no victim tonight.".to_string(),
    };
    for witch in stage_actors(game, NightStage::Witch) {
        game.tell(witch, message.clone(), now);
    }
}

/// Resolves all of tonight's actions at once in fixed priority order:
/// cupid, bodyguard, inspections, werewolf attack, witch, then deaths.
pub fn resolve_night(game: &mut Game, now: DateTime<Utc>) -> NightOutcome {
    let night = game.night;
    let victim = wolf_target(game);
    let alpha = converting_alpha(game);
    let actions: Vec<NightAction> = std::mem::take(&mut game.night_actions)
        .into_values()
        .filter(|a| game.player(a.actor).map(|p| p.role == Some(a.role)).unwrap_or(false))
        .collect();
    let mut outcome = NightOutcome {
        attacked: victim,
        ..NightOutcome::default()
    };

    // 1. cupid
    if night == 1 {
        for action in &actions {
            if let NightActionKind::Link { first, second } = action.kind {
                link_lovers(game, first, second, now);
            }
        }
    }

    // 2. bodyguards
    let mut protected = BTreeSet::new();
    let bodyguards: Vec<PlayerId> = game
        .living()
        .filter(|p| p.has_role(Role::Bodyguard))
        .map(|p| p.id)
        .collect();
    for guard in bodyguards {
        let ward = actions.iter().find_map(|a| match a.kind {
            NightActionKind::Protect { target } if a.actor == guard => Some(target),
            _ => None,
        });
        if let Some(ward) = ward {
            protected.insert(ward);
        }
        if let Some(player) = game.player_mut(guard) {
            player.last_protected = ward;
        }
    }

    // 3. inspections
    for action in &actions {
        match action.kind {
            NightActionKind::Inspect { target } => inspect(game, action.actor, target, now),
            NightActionKind::Investigate { target } => investigate(game, action.actor, target, now),
            NightActionKind::Spy { target, guess } => spy(game, action.actor, target, guess, now),
            _ => {}
        }
    }

    // witch potions are spent whether or not they change anything
    let mut healed = BTreeSet::new();
    let mut poisoned = Vec::new();
    for action in &actions {
        if let NightActionKind::Brew { heal, poison } = action.kind {
            let Some(witch) = game.player_mut(action.actor) else {
                continue;
            };
            if let Some(target) = heal.filter(|_| witch.witch.heal_potions > 0) {
                witch.witch.heal_potions -= 1;
                healed.insert(target);
            }
            if let Some(target) = poison.filter(|_| witch.witch.poison_potions > 0) {
                witch.witch.poison_potions -= 1;
                poisoned.push(target);
            }
        }
    }

    // 4. werewolf attack
    let mut deaths = Vec::new();
    if let Some(victim) = victim {
        let spare_life = game.player(victim).map(|p| p.spare_life).unwrap_or(false);
        if protected.contains(&victim) || healed.contains(&victim) {
            outcome.attack_prevented = true;
        } else if spare_life {
            outcome.attack_prevented = true;
            if let Some(elder) = game.player_mut(victim) {
                elder.spare_life = false;
            }
            game.tell(victim, "The werewolves attacked you, but you survived.".to_string(), now);
        } else if let Some(alpha) = alpha {
            convert(game, alpha, victim, now);
            outcome.converted = Some(victim);
        } else {
            deaths.push((victim, DeathCause::Werewolves));
        }
    }

    // 5. poison
    for target in poisoned {
        deaths.push((target, DeathCause::Poison));
    }

    // 6. deaths
    outcome.deaths = game.finalize_deaths(deaths, now);
    if outcome.deaths.is_empty() {
        game.log_public("Nobody died tonight.".to_string(), now);
    }
    tracing::info!(
        "game {}: night {} resolved, attacked={:?} deaths={:?}",
        game.id,
        night,
        outcome.attacked,
        outcome.deaths
    );
    outcome
}

fn link_lovers(game: &mut Game, first: PlayerId, second: PlayerId, now: DateTime<Utc>) {
    let free = |id| game.player(id).map(|p| p.lover.is_none()).unwrap_or(false);
    if !free(first) || !free(second) {
        return;
    }
    let first_name = game.name_of(first);
    let second_name = game.name_of(second);
    if let Some(p) = game.player_mut(first) {
        p.lover = Some(second);
    }
    if let Some(p) = game.player_mut(second) {
        p.lover = Some(first);
    }
    game.tell(first, format!("Cupid's arrow struck: you love {}.", second_name), now);
    game.tell(second, format!("Cupid's arrow struck: you love {}.", first_name), now);
}

fn inspect(game: &mut Game, seer: PlayerId, target: PlayerId, now: DateTime<Utc>) {
    let Some(role) = game.player(target).and_then(|p| p.role) else {
        return;
    };
    let name = game.name_of(target);
    let message = if game.config.seer_sees_identity {
        format!("{} is the {}.", name, role.apparent_role())
    } else {
        format!("{} belongs to the {}.", name, role.apparent_faction())
    };
    game.tell(seer, message, now);
}

fn investigate(game: &mut Game, investigator: PlayerId, target: PlayerId, now: DateTime<Utc>) {
    let mut group = vec![target];
    group.extend(game.living_neighbours(target));
    let wolf_among = group.iter().any(|id| {
        game.player(*id)
            .and_then(|p| p.role)
            .map(|r| r.apparent_faction() == Faction::Werewolves)
            .unwrap_or(false)
    });
    let names = group
        .iter()
        .map(|id| game.name_of(*id))
        .collect::<Vec<_>>()
        .join(", ");
    if let Some(p) = game.player_mut(investigator) {
        p.investigation_used = true;
    }
    let message = if wolf_among {
        format!("There is a werewolf among {}.", names)
    } else {
        format!("There is no werewolf among {}.", names)
    };
    game.tell(investigator, message, now);
}

fn spy(game: &mut Game, spy: PlayerId, target: PlayerId, guess: Role, now: DateTime<Utc>) {
    let name = game.name_of(target);
    let hit = game.player(target).map(|p| p.has_role(guess)).unwrap_or(false);
    let message = if hit {
        format!("{} is indeed the {}.", name, guess)
    } else {
        format!("{} is not the {}.", name, guess)
    };
    game.tell(spy, message, now);
}

fn convert(game: &mut Game, alpha: PlayerId, victim: PlayerId, now: DateTime<Utc>) {
    let config = game.config.clone();
    if let Some(p) = game.player_mut(alpha) {
        p.conversions_left = p.conversions_left.saturating_sub(1);
    }
    if let Some(p) = game.player_mut(victim) {
        p.assign_role(Role::Werewolf, &config);
    }
    game.tell(
        victim,
        "The alpha wolf bit you. You are now a werewolf.".to_string(),
        now,
    );
    let name = game.name_of(victim);
    let pack: Vec<PlayerId> = game
        .living()
        .filter(|p| p.is_werewolf() && p.id != victim)
        .map(|p| p.id)
        .collect();
    for wolf in pack {
        game.tell(wolf, format!("{} has joined the pack.", name), now);
    }
}
