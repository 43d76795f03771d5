use crate::models::{
    game::{Game, GameResult},
    player::PlayerId,
    role::{Faction, Role},
};

/// Decides whether the game is over. `lynched` is the player the village
/// just voted out, if any. Neutral roles count for neither side.
pub fn evaluate(game: &Game, lynched: Option<PlayerId>) -> GameResult {
    if let Some(id) = lynched {
        if game.player(id).map(|p| p.has_role(Role::Fool)).unwrap_or(false) {
            return GameResult::FoolWin { player: id };
        }
    }

    let living: Vec<_> = game.living().collect();
    if let [a, b] = living.as_slice() {
        if a.lover == Some(b.id) && b.lover == Some(a.id) {
            return GameResult::LoversWin {
                lovers: [a.id, b.id],
            };
        }
    }

    let count = |faction: Faction| {
        living
            .iter()
            .filter(|p| p.role.map(|r| r.faction()) == Some(faction))
            .count()
    };
    if count(Faction::Werewolves) == 0 {
        GameResult::VillageWin
    } else if count(Faction::Village) == 0 {
        GameResult::WerewolfWin
    } else {
        GameResult::InProgress
    }
}
