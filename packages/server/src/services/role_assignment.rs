use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::GameError;
use crate::models::{config::GameConfig, game::Game, role::Role};

/// Builds exactly `player_count` role tokens: the configured specials, topped
/// up with villagers, in random order.
pub fn build_role_bag<R: Rng + ?Sized>(
    config: &GameConfig,
    player_count: usize,
    rng: &mut R,
) -> Result<Vec<Role>, GameError> {
    if config.roles.wolf_total() == 0 {
        return Err(GameError::Configuration(
            "at least one werewolf is required".to_string(),
        ));
    }

    let mut bag = Vec::with_capacity(player_count);
    if config.random_roles {
        bag.extend(std::iter::repeat(Role::Werewolf).take(config.roles.werewolves as usize));
        bag.extend(std::iter::repeat(Role::AlphaWolf).take(config.roles.alpha_wolves as usize));
        let mut specials = Role::RANDOM_SPECIALS.to_vec();
        specials.shuffle(rng);
        bag.extend(specials.into_iter().take(config.random_role_bonus as usize));
    } else {
        for (role, count) in config.roles.entries() {
            bag.extend(std::iter::repeat(role).take(count as usize));
        }
    }

    if bag.len() > player_count {
        return Err(GameError::Configuration(format!(
            "{} roles configured for {} players",
            bag.len(),
            player_count
        )));
    }
    bag.resize(player_count, Role::Villager);
    bag.shuffle(rng);
    Ok(bag)
}

/// Deals one role to every player and tells each of them privately.
pub fn assign_roles<R: Rng + ?Sized>(
    game: &mut Game,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    let bag = build_role_bag(&game.config, game.players.len(), rng)?;

    let config = game.config.clone();
    let night = game.night;
    let mut seats: Vec<usize> = (0..game.players.len()).collect();
    seats.shuffle(rng);
    for (seat, role) in seats.into_iter().zip(bag) {
        let player = &mut game.players[seat];
        player.assign_role(role, &config);
        player.tell(night, format!("You are the {}.", role), now);
    }

    let pack: Vec<(u32, String)> = game
        .players
        .iter()
        .filter(|p| p.is_werewolf())
        .map(|p| (p.id, p.name.clone()))
        .collect();
    let names = pack
        .iter()
        .map(|(_, name)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    for (id, _) in &pack {
        game.tell(*id, format!("Your pack: {}.", names), now);
    }

    tracing::info!(
        "game {}: dealt {} roles ({} wolves)",
        game.id,
        game.players.len(),
        pack.len()
    );
    Ok(())
}
