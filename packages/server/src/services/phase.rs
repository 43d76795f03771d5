use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::error::GameError;
use crate::models::{
    game::{DeathCause, Game, GameAction, GamePhase, GameResult},
    player::PlayerId,
    role::{NightStage, Role},
};
use crate::services::{night, role_assignment, victory, voting};

/// Upper bound on chained transitions in one settle pass.
const MAX_SETTLE_STEPS: usize = 32;

/// Seconds a phase may last, or None for phases without a timer. Night
/// stages, discussion and runoffs grow with the number of living players.
pub fn phase_duration(game: &Game, phase: GamePhase) -> Option<u64> {
    let timers = &game.config.timers;
    let living = game.living().count() as u64;
    let scaled = |base: u64, per_player: u64| base.saturating_add(per_player.saturating_mul(living));
    match phase {
        GamePhase::Setup | GamePhase::NightBegin | GamePhase::NightEnd | GamePhase::Victory => None,
        GamePhase::GameSetup => Some(timers.game_setup),
        GamePhase::Night(_) if game.night <= 1 => {
            Some(scaled(timers.night_stage, timers.night_stage_per_player))
        }
        GamePhase::Night(_) => Some(scaled(timers.later_night_stage, timers.later_night_stage_per_player)),
        GamePhase::AnnounceDead => Some(timers.announce_dead),
        GamePhase::MayorElection => Some(timers.mayor_election),
        GamePhase::MayorRunoff | GamePhase::Runoff => Some(scaled(timers.runoff, timers.runoff_per_player)),
        GamePhase::Discussion => Some(scaled(timers.discussion, timers.discussion_per_player)),
        GamePhase::Accusations => Some(timers.accusations),
        GamePhase::Voting => Some(timers.voting),
        GamePhase::PostVoting => Some(timers.post_voting),
    }
}

fn deadline_after(now: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    now.checked_add_signed(Duration::try_seconds(secs)?)
}

fn phase_name(phase: GamePhase) -> String {
    match phase {
        GamePhase::Night(stage) => format!("night ({:?})", stage).to_lowercase(),
        other => other.label().replace('_', " "),
    }
}

/// Switches to `phase`, resets the per-phase state and starts its timer.
pub fn enter(game: &mut Game, phase: GamePhase, now: DateTime<Utc>) {
    game.phase = phase;
    game.phase_tick += 1;
    game.phase_started_at = now;
    game.deadline = phase_duration(game, phase).and_then(|secs| deadline_after(now, secs));
    game.advance_requests.clear();

    match phase {
        GamePhase::NightBegin => {
            game.night_actions.clear();
            game.log_public(format!("Night {} falls over the village.", game.night), now);
        }
        GamePhase::Night(NightStage::Witch) => night::brief_witches(game, now),
        GamePhase::AnnounceDead => game.log_public("The village wakes up.".to_string(), now),
        GamePhase::MayorElection => voting::open_mayor_election(game),
        GamePhase::Accusations => game.accusations.clear(),
        GamePhase::Voting => voting::open_voting(game),
        GamePhase::PostVoting => {
            game.votes.clear();
            game.candidates.clear();
        }
        _ => {}
    }

    game.log_system(format!("Phase: {}.", phase_name(phase)), now);
    tracing::debug!("game {}: entered {:?} (tick {})", game.id, phase, game.phase_tick);
}

/// Deals the roles and opens game setup. On failure the game stays in setup.
pub fn start_game<R: Rng + ?Sized>(
    game: &mut Game,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    if game.phase != GamePhase::Setup {
        return Err(GameError::GameAlreadyStarted);
    }
    if game.players.len() < game.config.min_players {
        return Err(GameError::illegal(format!(
            "at least {} players are needed to start",
            game.config.min_players
        )));
    }
    role_assignment::assign_roles(game, rng, now)?;
    game.mayor_election_due = game.config.mayor_enabled;
    game.log_public("The game begins. Check your role.".to_string(), now);
    enter(game, GamePhase::GameSetup, now);
    tracing::info!("game {}: started with {} players", game.id, game.players.len());
    Ok(())
}

/// Ends the game if a side has won. A lynched fool wins at once; any other
/// result waits while a hunter may still shoot. An open mayor handoff is
/// dropped, since it cannot change the winner.
pub fn declare_victory(game: &mut Game, lynched: Option<PlayerId>, now: DateTime<Utc>) -> bool {
    if game.phase == GamePhase::Victory || !game.phase.is_past_game_setup() {
        return false;
    }
    let result = victory::evaluate(game, lynched);
    if !result.is_decided() {
        return false;
    }
    if game.hunter_shot_pending() && !matches!(result, GameResult::FoolWin { .. }) {
        return false;
    }
    for player in game.players.iter_mut() {
        player.mayor_handoff_pending = false;
    }
    game.log_public(result.announcement().to_string(), now);
    game.result = result;
    enter(game, GamePhase::Victory, now);
    tracing::info!("finished: {}", game);
    true
}

/// Leaves the current phase and moves to the next one, running whatever the
/// old phase's closing step is (night resolution, vote counting).
pub fn advance<R: Rng + ?Sized>(
    game: &mut Game,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    let mut lynched = None;
    let next = match game.phase {
        GamePhase::Setup => return start_game(game, rng, now),
        GamePhase::Victory => return Err(GameError::GameFinished),
        GamePhase::GameSetup => GamePhase::NightBegin,
        GamePhase::NightBegin => GamePhase::Night(NightStage::Scouts),
        GamePhase::Night(stage) => stage.next().map(GamePhase::Night).unwrap_or(GamePhase::NightEnd),
        GamePhase::NightEnd => {
            night::resolve_night(game, now);
            GamePhase::AnnounceDead
        }
        GamePhase::AnnounceDead => {
            if game.config.mayor_enabled && game.mayor_election_due {
                GamePhase::MayorElection
            } else {
                GamePhase::Discussion
            }
        }
        GamePhase::MayorElection | GamePhase::MayorRunoff => match voting::close_mayor_vote(game, now) {
            voting::VoteResolution::Runoff(tied) => {
                voting::open_runoff(game, tied, now);
                GamePhase::MayorRunoff
            }
            _ => GamePhase::Discussion,
        },
        GamePhase::Discussion => GamePhase::Accusations,
        GamePhase::Accusations => {
            let anyone_accused = game.accusations.values().any(|id| game.is_alive(*id));
            if anyone_accused {
                GamePhase::Voting
            } else {
                game.log_public("Nobody was accused today.".to_string(), now);
                GamePhase::PostVoting
            }
        }
        GamePhase::Voting | GamePhase::Runoff => match voting::close_elimination_vote(game, now) {
            voting::VoteResolution::Decided(id) => {
                lynched = Some(id);
                GamePhase::PostVoting
            }
            voting::VoteResolution::Runoff(tied) => {
                voting::open_runoff(game, tied, now);
                GamePhase::Runoff
            }
            voting::VoteResolution::NoDecision => GamePhase::PostVoting,
        },
        GamePhase::PostVoting => GamePhase::NightBegin,
    };

    if declare_victory(game, lynched, now) {
        return Ok(());
    }
    if game.phase == GamePhase::PostVoting {
        game.night += 1;
    }
    enter(game, next, now);
    Ok(())
}

/// Whether the current phase has everything it waits for.
pub fn phase_complete(game: &Game) -> bool {
    match game.phase {
        GamePhase::NightBegin | GamePhase::NightEnd => return true,
        GamePhase::Setup | GamePhase::Victory => return false,
        _ => {}
    }
    if game.has_pending_windows() {
        return false;
    }
    match game.phase {
        GamePhase::GameSetup => game.players.iter().all(|p| p.is_ready),
        GamePhase::Night(stage) => night::stage_complete(game, stage),
        phase if phase.is_vote() => voting::all_votes_in(game),
        _ => false,
    }
}

/// Advances as long as the current phase is complete. Transient phases and
/// night stages nobody acts in are passed straight through.
pub fn settle<R: Rng + ?Sized>(
    game: &mut Game,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    for _ in 0..MAX_SETTLE_STEPS {
        if !phase_complete(game) {
            return Ok(());
        }
        advance(game, rng, now)?;
    }
    tracing::warn!("game {}: settle did not converge in {:?}", game.id, game.phase);
    Ok(())
}

/// Closes every open hunter and mayor window without effect.
pub fn expire_windows(game: &mut Game, now: DateTime<Utc>) {
    let mut notes = Vec::new();
    let mayor_enabled = game.config.mayor_enabled;
    let mut election_due = false;
    for player in game.players.iter_mut() {
        if player.hunter_shot_pending {
            player.hunter_shot_pending = false;
            notes.push(format!("{} never fired the last shot.", player.name));
        }
        if player.mayor_handoff_pending {
            player.mayor_handoff_pending = false;
            player.is_mayor = false;
            election_due = mayor_enabled;
            notes.push(format!("{} named no successor as mayor.", player.name));
        }
    }
    if election_due {
        game.mayor_election_due = true;
    }
    for note in notes {
        game.log_public(note, now);
    }
}

/// Fires the phase timer if it has run out. Returns whether anything moved.
pub fn on_timeout<R: Rng + ?Sized>(
    game: &mut Game,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<bool, GameError> {
    let Some(deadline) = game.deadline else {
        return Ok(false);
    };
    if now < deadline {
        return Ok(false);
    }
    tracing::debug!("game {}: {:?} timed out", game.id, game.phase);
    expire_windows(game, now);
    if !declare_victory(game, None, now) {
        advance(game, rng, now)?;
    }
    settle(game, rng, now)?;
    Ok(true)
}

fn hunter_shot(
    game: &mut Game,
    hunter: PlayerId,
    target: PlayerId,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    let player = game.player(hunter).ok_or(GameError::PlayerNotFound(hunter))?;
    if !player.hunter_shot_pending {
        return Err(GameError::illegal("you have no shot to fire"));
    }
    if target == hunter || !game.is_alive(target) {
        return Err(GameError::illegal("pick a living player to shoot"));
    }
    let name = player.name.clone();
    if let Some(player) = game.player_mut(hunter) {
        player.hunter_shot_pending = false;
    }
    game.log_public(format!("{} fires one last shot.", name), now);
    game.finalize_deaths(vec![(target, DeathCause::HunterShot)], now);
    Ok(())
}

fn mayor_handoff(
    game: &mut Game,
    mayor: PlayerId,
    successor: PlayerId,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    let player = game.player(mayor).ok_or(GameError::PlayerNotFound(mayor))?;
    if !player.mayor_handoff_pending {
        return Err(GameError::illegal("you have no office to hand over"));
    }
    if successor == mayor || !game.is_alive(successor) {
        return Err(GameError::illegal("the successor must be a living player"));
    }
    let name = player.name.clone();
    if let Some(player) = game.player_mut(mayor) {
        player.mayor_handoff_pending = false;
        player.is_mayor = false;
    }
    if let Some(player) = game.player_mut(successor) {
        player.is_mayor = true;
    }
    let successor_name = game.name_of(successor);
    game.log_public(format!("{} names {} the new mayor.", name, successor_name), now);
    Ok(())
}

fn request_advance<R: Rng + ?Sized>(
    game: &mut Game,
    requester: PlayerId,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    let is_host = game.player(requester).map(|p| p.is_host).unwrap_or(false);
    if game.phase == GamePhase::Setup {
        if !is_host {
            return Err(GameError::illegal("only the host can start the game"));
        }
        return start_game(game, rng, now);
    }
    if !game.is_alive(requester) {
        return Err(GameError::illegal("dead players cannot hurry the game"));
    }
    game.advance_requests.insert(requester);

    let living = game.living().count();
    let requests = game
        .advance_requests
        .iter()
        .filter(|id| game.is_alive(**id))
        .count();
    let majority = requests * 2 > living;
    if (is_host || majority) && !game.has_pending_windows() {
        tracing::debug!("game {}: advance requested past {:?}", game.id, game.phase);
        advance(game, rng, now)?;
    }
    Ok(())
}

/// Applies one player submission and lets the game move on as far as it can.
/// Nothing is changed when an error is returned.
pub fn apply_action<R: Rng + ?Sized>(
    game: &mut Game,
    player_id: PlayerId,
    action: GameAction,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    if game.phase == GamePhase::Victory {
        return Err(GameError::GameFinished);
    }
    if game.player(player_id).is_none() {
        return Err(GameError::PlayerNotFound(player_id));
    }

    match action {
        GameAction::Ready => {
            if game.phase.is_past_game_setup() {
                return Err(GameError::illegal("the game is already running"));
            }
            if let Some(player) = game.player_mut(player_id) {
                player.is_ready = true;
            }
        }
        GameAction::NightAction(kind) => night::record_night_action(game, player_id, kind)?,
        GameAction::Vote { target } => voting::record_vote(game, player_id, target)?,
        GameAction::Accuse { target } => voting::record_accusation(game, player_id, target)?,
        GameAction::HunterRevengeShot { target } => {
            hunter_shot(game, player_id, target, now)?;
            declare_victory(game, None, now);
        }
        GameAction::MayorHandoff { successor } => {
            mayor_handoff(game, player_id, successor, now)?;
            declare_victory(game, None, now);
        }
        GameAction::PhaseAdvanceRequest => request_advance(game, player_id, rng, now)?,
    }

    settle(game, rng, now)
}

/// Late joiners during game setup are dealt a plain villager.
pub fn seat_late_joiner(game: &mut Game, player_id: PlayerId, now: DateTime<Utc>) {
    let config = game.config.clone();
    if let Some(player) = game.player_mut(player_id) {
        player.assign_role(Role::Villager, &config);
    }
    game.tell(player_id, format!("You are the {}.", Role::Villager), now);
}
