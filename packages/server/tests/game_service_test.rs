use chrono::{Duration, Utc};
use std::sync::Arc;

use werewolf_server::{
    error::GameError,
    models::{
        config::{GameConfig, RoleCounts},
        game::{Game, GameAction, GameId, GamePhase, GameResult, NightActionKind},
        player::PlayerId,
        role::{NightStage, Role},
    },
    services::{
        clock::ManualClock,
        game_service::GameService,
        night,
        repository::InMemoryGameRepository,
    },
    utils::test_setup::setup_test_env,
};

const HOST: PlayerId = 1;

fn service() -> (GameService, Arc<ManualClock>) {
    setup_test_env();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = GameService::new(Arc::new(InMemoryGameRepository::new()), clock.clone());
    (service, clock)
}

fn rules(roles: RoleCounts) -> GameConfig {
    GameConfig {
        roles,
        mayor_enabled: false,
        ..GameConfig::default()
    }
}

async fn lobby(service: &GameService, players: usize, config: GameConfig) -> GameId {
    let id = service.create_game(config).await.unwrap();
    for n in 1..=players {
        service.join_game(id, &format!("Player{}", n)).await.unwrap();
    }
    id
}

async fn act(
    service: &GameService,
    id: GameId,
    player: PlayerId,
    action: GameAction,
) -> Result<GamePhase, GameError> {
    service.submit_action(id, player, action).await.map(|view| view.phase)
}

/// Starts the game and readies everyone, which runs straight into the night.
async fn start(service: &GameService, id: GameId) -> Game {
    act(service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();
    let players = service.snapshot(id).await.unwrap().players.len() as PlayerId;
    for player in 1..=players {
        act(service, id, player, GameAction::Ready).await.unwrap();
    }
    service.snapshot(id).await.unwrap()
}

fn holders(game: &Game, role: Role) -> Vec<PlayerId> {
    game.players
        .iter()
        .filter(|p| p.has_role(role))
        .map(|p| p.id)
        .collect()
}

fn first_villager(game: &Game) -> PlayerId {
    holders(game, Role::Villager)[0]
}

/// Everyone with something to do tonight passes.
async fn quiet_night(service: &GameService, id: GameId) {
    loop {
        let game = service.snapshot(id).await.unwrap();
        let GamePhase::Night(stage) = game.phase else {
            return;
        };
        for actor in night::stage_actors(&game, stage) {
            let skip = GameAction::NightAction(NightActionKind::Skip);
            act(service, id, actor, skip).await.unwrap();
        }
    }
}

fn kill(target: PlayerId) -> GameAction {
    GameAction::NightAction(NightActionKind::Kill {
        target,
        convert: false,
    })
}

#[tokio::test]
async fn test_scenario_a_seer_result_survives_the_seer() {
    let (service, _) = service();
    let roles = RoleCounts {
        seers: 1,
        ..RoleCounts::wolves_only(1)
    };
    let id = lobby(&service, 6, rules(roles)).await;
    let game = start(&service, id).await;
    assert_eq!(game.phase, GamePhase::Night(NightStage::Scouts));

    let wolf = holders(&game, Role::Werewolf)[0];
    let seer = holders(&game, Role::Seer)[0];
    let inspect = GameAction::NightAction(NightActionKind::Inspect { target: wolf });
    let phase = act(&service, id, seer, inspect).await.unwrap();
    assert_eq!(phase, GamePhase::Night(NightStage::Wolves));

    let phase = act(&service, id, wolf, kill(seer)).await.unwrap();
    assert_eq!(phase, GamePhase::AnnounceDead);

    let game = service.snapshot(id).await.unwrap();
    assert!(!game.is_alive(seer));
    let log = service.get_private_log(id, seer).await.unwrap();
    assert!(log.iter().any(|e| e.content.contains("is the werewolf")));
}

#[tokio::test]
async fn test_scenario_b_split_pack_kills_nobody() {
    let (service, _) = service();
    let id = lobby(&service, 8, rules(RoleCounts::wolves_only(2))).await;
    let game = start(&service, id).await;
    assert_eq!(game.phase, GamePhase::Night(NightStage::Wolves));

    let wolves = holders(&game, Role::Werewolf);
    let villagers = holders(&game, Role::Villager);
    act(&service, id, wolves[0], kill(villagers[0])).await.unwrap();
    let phase = act(&service, id, wolves[1], kill(villagers[1])).await.unwrap();
    assert_eq!(phase, GamePhase::AnnounceDead);

    let state = service.get_state(id).await.unwrap();
    assert!(state.players.iter().all(|p| p.alive));
    assert!(state.log.iter().any(|e| e.content.contains("Nobody died tonight")));
}

#[tokio::test]
async fn test_scenario_c_heal_potion_is_spent() {
    let (service, _) = service();
    let roles = RoleCounts {
        witches: 1,
        ..RoleCounts::wolves_only(1)
    };
    let id = lobby(&service, 5, rules(roles)).await;
    let game = start(&service, id).await;
    let wolf = holders(&game, Role::Werewolf)[0];
    let witch = holders(&game, Role::Witch)[0];
    let victim = first_villager(&game);

    act(&service, id, wolf, kill(victim)).await.unwrap();
    let game = service.snapshot(id).await.unwrap();
    assert_eq!(game.phase, GamePhase::Night(NightStage::Witch));
    assert!(game.player(witch).unwrap().private_log.contains("The werewolves have chosen"));

    let heal = GameAction::NightAction(NightActionKind::Brew {
        heal: Some(victim),
        poison: None,
    });
    act(&service, id, witch, heal.clone()).await.unwrap();
    let game = service.snapshot(id).await.unwrap();
    assert!(game.is_alive(victim));
    assert_eq!(game.player(witch).unwrap().witch.heal_potions, 0);

    // through the day, nobody accused, into night 2
    for _ in 0..4 {
        act(&service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();
    }
    let game = service.snapshot(id).await.unwrap();
    assert_eq!(game.night, 2);
    assert_eq!(game.phase, GamePhase::Night(NightStage::Wolves));

    act(&service, id, wolf, kill(victim)).await.unwrap();
    let again = act(&service, id, witch, heal).await;
    assert!(matches!(again, Err(GameError::IllegalAction(_))));
    let game = service.snapshot(id).await.unwrap();
    assert_eq!(game.player(witch).unwrap().witch.heal_potions, 0);
}

/// A fresh 6-player game after a quiet first night, at its first accusations.
async fn six_player_day(service: &GameService) -> (GameId, Game) {
    let id = lobby(service, 6, rules(RoleCounts::wolves_only(1))).await;
    start(service, id).await;
    quiet_night(service, id).await;
    for _ in 0..2 {
        act(service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();
    }
    let game = service.snapshot(id).await.unwrap();
    assert_eq!(game.phase, GamePhase::Accusations);
    (id, game)
}

#[tokio::test]
async fn test_scenario_d_tie_goes_to_runoff() {
    let (service, _) = service();
    let (id, _) = six_player_day(&service).await;
    act(&service, id, 1, GameAction::Accuse { target: 2 }).await.unwrap();
    act(&service, id, 3, GameAction::Accuse { target: 4 }).await.unwrap();
    let phase = act(&service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();
    assert_eq!(phase, GamePhase::Voting);

    for (voter, target) in [(1, 2), (2, 4), (3, 2), (4, 2), (5, 4), (6, 4)] {
        act(&service, id, voter, GameAction::Vote { target: Some(target) }).await.unwrap();
    }

    let state = service.get_state(id).await.unwrap();
    assert_eq!(state.phase, GamePhase::Runoff);
    assert_eq!(state.candidates, vec![2, 4]);
    assert_eq!(state.votes_cast, 0);
    assert!(state.players.iter().all(|p| p.alive));
}

#[tokio::test]
async fn test_scenario_e_last_wolf_lynched_ends_the_game() {
    let (service, _) = service();
    let (id, game) = six_player_day(&service).await;
    let wolf = holders(&game, Role::Werewolf)[0];
    let accuser = if wolf == 1 { 2 } else { 1 };
    act(&service, id, accuser, GameAction::Accuse { target: wolf }).await.unwrap();
    act(&service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();

    for voter in 1..=6 {
        let target = if voter == wolf { None } else { Some(wolf) };
        act(&service, id, voter, GameAction::Vote { target }).await.unwrap();
    }

    let state = service.get_state(id).await.unwrap();
    assert_eq!(state.phase, GamePhase::Victory);
    assert_eq!(state.result, GameResult::VillageWin);
    assert_eq!(state.night, 1);
    // all roles are public now
    assert!(state.players.iter().all(|p| p.role.is_some()));
}

#[tokio::test]
async fn test_scenario_e_wolf_mayor_lynched_ends_the_game() {
    let (service, _) = service();
    let config = GameConfig {
        mayor_enabled: true,
        ..rules(RoleCounts::wolves_only(1))
    };
    let id = lobby(&service, 6, config).await;
    let game = start(&service, id).await;
    let wolf = holders(&game, Role::Werewolf)[0];
    quiet_night(&service, id).await;

    let phase = act(&service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();
    assert_eq!(phase, GamePhase::MayorElection);
    for voter in 1..=6 {
        act(&service, id, voter, GameAction::Vote { target: Some(wolf) }).await.unwrap();
    }
    let game = service.snapshot(id).await.unwrap();
    assert_eq!(game.mayor().map(|p| p.id), Some(wolf));

    let phase = act(&service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();
    assert_eq!(phase, GamePhase::Accusations);
    let accuser = if wolf == 1 { 2 } else { 1 };
    act(&service, id, accuser, GameAction::Accuse { target: wolf }).await.unwrap();
    act(&service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();
    for voter in 1..=6 {
        let target = if voter == wolf { None } else { Some(wolf) };
        act(&service, id, voter, GameAction::Vote { target }).await.unwrap();
    }

    let game = service.snapshot(id).await.unwrap();
    assert_eq!(game.phase, GamePhase::Victory);
    assert_eq!(game.result, GameResult::VillageWin);
    assert!(!game.is_alive(wolf));
    assert!(!game.has_pending_windows());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_wolf_votes_are_both_kept() {
    let (service, _) = service();
    let service = Arc::new(service);
    let id = lobby(&service, 8, rules(RoleCounts::wolves_only(3))).await;
    let game = start(&service, id).await;
    assert_eq!(game.phase, GamePhase::Night(NightStage::Wolves));
    let wolves = holders(&game, Role::Werewolf);
    let villagers = holders(&game, Role::Villager);

    let submit = |wolf: PlayerId, target: PlayerId| {
        let service = service.clone();
        tokio::spawn(async move { service.submit_action(id, wolf, kill(target)).await })
    };
    let (first, second) = tokio::join!(submit(wolves[0], villagers[0]), submit(wolves[1], villagers[1]));
    first.unwrap().unwrap();
    second.unwrap().unwrap();

    let game = service.snapshot(id).await.unwrap();
    assert_eq!(game.phase, GamePhase::Night(NightStage::Wolves));
    assert_eq!(game.night_actions.len(), 2);
    assert!(game.night_actions.contains_key(&wolves[0]));
    assert!(game.night_actions.contains_key(&wolves[1]));
}

#[tokio::test]
async fn test_victory_is_final() {
    let (service, clock) = service();
    let (id, game) = six_player_day(&service).await;
    let wolf = holders(&game, Role::Werewolf)[0];
    let accuser = if wolf == 1 { 2 } else { 1 };
    act(&service, id, accuser, GameAction::Accuse { target: wolf }).await.unwrap();
    act(&service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();
    for voter in 1..=6 {
        act(&service, id, voter, GameAction::Vote { target: Some(wolf) }).await.ok();
    }
    let before = service.snapshot(id).await.unwrap();
    assert_eq!(before.phase, GamePhase::Victory);

    let late = act(&service, id, accuser, GameAction::PhaseAdvanceRequest).await;
    assert_eq!(late, Err(GameError::GameFinished));
    clock.advance(Duration::hours(1));
    assert!(!service.tick(id).await.unwrap());

    let after = service.snapshot(id).await.unwrap();
    assert_eq!(after.phase, GamePhase::Victory);
    assert_eq!(after.result, before.result);
}

#[tokio::test]
async fn test_resubmitting_a_vote_changes_nothing() {
    let (service, _) = service();
    let (id, _) = six_player_day(&service).await;
    act(&service, id, 1, GameAction::Accuse { target: 2 }).await.unwrap();
    act(&service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();

    let vote = GameAction::Vote { target: Some(2) };
    let first = service.submit_action(id, 3, vote.clone()).await.unwrap();
    let second = service.submit_action(id, 3, vote).await.unwrap();
    assert_eq!(first.votes_cast, 1);
    assert_eq!(second.votes_cast, 1);
    assert_eq!(first.phase, second.phase);
}

#[tokio::test]
async fn test_rejected_action_leaves_game_untouched() {
    let (service, _) = service();
    let id = lobby(&service, 5, rules(RoleCounts::wolves_only(1))).await;
    let game = start(&service, id).await;
    let villager = first_villager(&game);

    let result = act(&service, id, villager, kill(HOST)).await;
    assert!(matches!(result, Err(GameError::IllegalAction(_))));
    assert_eq!(service.snapshot(id).await.unwrap(), game);
}

#[tokio::test]
async fn test_join_rejections() {
    let (service, _) = service();
    let config = GameConfig {
        max_players: 4,
        ..rules(RoleCounts::wolves_only(1))
    };
    let id = lobby(&service, 4, config).await;
    assert_eq!(service.join_game(id, "Late").await.unwrap_err(), GameError::GameFull);
    assert!(matches!(
        service.join_game(id, "").await,
        Err(GameError::Validation(_))
    ));
    assert!(matches!(
        service.join_game(12, "Anna").await,
        Err(GameError::Validation(_))
    ));

    let other = lobby(&service, 4, rules(RoleCounts::wolves_only(1))).await;
    assert!(matches!(
        service.join_game(other, "player1").await,
        Err(GameError::Validation(_))
    ));
    start(&service, other).await;
    assert_eq!(
        service.join_game(other, "Late").await.unwrap_err(),
        GameError::GameAlreadyStarted
    );
}

#[tokio::test]
async fn test_late_joiner_becomes_villager() {
    let (service, _) = service();
    let id = lobby(&service, 4, rules(RoleCounts::wolves_only(1))).await;
    act(&service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();
    let joined = service.join_game(id, "Latecomer").await.unwrap();
    let game = service.snapshot(id).await.unwrap();
    assert_eq!(game.phase, GamePhase::GameSetup);
    assert!(game.player(joined.player_id).unwrap().has_role(Role::Villager));
}

#[tokio::test]
async fn test_only_the_host_configures() {
    let (service, _) = service();
    let id = lobby(&service, 2, GameConfig::default()).await;
    let settings = rules(RoleCounts::wolves_only(1));
    assert!(service.configure_game(id, 2, settings.clone()).await.is_err());
    let view = service.configure_game(id, HOST, settings).await.unwrap();
    assert!(!view.settings.mayor_enabled);

    let broken = GameConfig {
        roles: RoleCounts::wolves_only(0),
        ..GameConfig::default()
    };
    assert!(matches!(
        service.configure_game(id, HOST, broken).await,
        Err(GameError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_authentication() {
    let (service, _) = service();
    let id = service.create_game(GameConfig::default()).await.unwrap();
    let joined = service.join_game(id, "Anna").await.unwrap();
    assert!(service.authenticate(id, joined.player_id, joined.token).await.is_ok());
    assert_eq!(
        service.authenticate(id, joined.player_id, joined.token.wrapping_add(1)).await,
        Err(GameError::Unauthorized)
    );
}

#[tokio::test]
async fn test_setup_timeout_starts_the_night() {
    let (service, clock) = service();
    let id = lobby(&service, 5, rules(RoleCounts::wolves_only(1))).await;
    act(&service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();
    assert!(!service.tick(id).await.unwrap());

    clock.advance(Duration::seconds(GameConfig::default().timers.game_setup as i64));
    assert_eq!(service.tick_all().await, 1);
    let state = service.get_state(id).await.unwrap();
    assert_eq!(state.phase, GamePhase::Night(NightStage::Wolves));
    let timers = GameConfig::default().timers;
    assert_eq!(
        state.seconds_remaining,
        Some(timers.night_stage + 5 * timers.night_stage_per_player)
    );
}

#[tokio::test]
async fn test_hunter_shot_and_its_expiry() {
    let (service, clock) = service();
    let roles = RoleCounts {
        hunters: 1,
        ..RoleCounts::wolves_only(1)
    };
    let id = lobby(&service, 6, rules(roles)).await;
    let game = start(&service, id).await;
    let wolf = holders(&game, Role::Werewolf)[0];
    let hunter = holders(&game, Role::Hunter)[0];

    act(&service, id, wolf, kill(hunter)).await.unwrap();
    let game = service.snapshot(id).await.unwrap();
    assert_eq!(game.phase, GamePhase::AnnounceDead);
    assert!(game.player(hunter).unwrap().hunter_shot_pending);

    // the window holds the day back until the timer runs out
    let requester = game.living_ids()[0];
    act(&service, id, requester, GameAction::PhaseAdvanceRequest).await.unwrap();
    assert_eq!(service.snapshot(id).await.unwrap().phase, GamePhase::AnnounceDead);

    clock.advance(Duration::seconds(GameConfig::default().timers.announce_dead as i64));
    assert!(service.tick(id).await.unwrap());
    let game = service.snapshot(id).await.unwrap();
    assert_eq!(game.phase, GamePhase::Discussion);
    assert!(!game.player(hunter).unwrap().hunter_shot_pending);
    assert!(game.log.contains("never fired the last shot"));

    let late = act(&service, id, hunter, GameAction::HunterRevengeShot { target: wolf }).await;
    assert!(matches!(late, Err(GameError::IllegalAction(_))));
}

#[tokio::test]
async fn test_hunter_takes_the_last_wolf() {
    let (service, _) = service();
    let roles = RoleCounts {
        hunters: 1,
        ..RoleCounts::wolves_only(1)
    };
    let id = lobby(&service, 5, rules(roles)).await;
    let game = start(&service, id).await;
    let wolf = holders(&game, Role::Werewolf)[0];
    let hunter = holders(&game, Role::Hunter)[0];

    act(&service, id, wolf, kill(hunter)).await.unwrap();
    let phase = act(&service, id, hunter, GameAction::HunterRevengeShot { target: wolf })
        .await
        .unwrap();

    assert_eq!(phase, GamePhase::Victory);
    let state = service.get_state(id).await.unwrap();
    assert_eq!(state.result, GameResult::VillageWin);
}

#[tokio::test]
async fn test_first_day_elects_a_mayor() {
    let (service, _) = service();
    let config = GameConfig {
        mayor_enabled: true,
        ..rules(RoleCounts::wolves_only(1))
    };
    let id = lobby(&service, 5, config).await;
    start(&service, id).await;
    quiet_night(&service, id).await;
    let phase = act(&service, id, HOST, GameAction::PhaseAdvanceRequest).await.unwrap();
    assert_eq!(phase, GamePhase::MayorElection);

    for voter in 1..=5 {
        act(&service, id, voter, GameAction::Vote { target: Some(3) }).await.unwrap();
    }
    let game = service.snapshot(id).await.unwrap();
    assert_eq!(game.phase, GamePhase::Discussion);
    assert_eq!(game.mayor().map(|p| p.id), Some(3));
    assert!(!game.mayor_election_due);
}

#[tokio::test]
async fn test_reaper_only_removes_idle_games() {
    let (service, clock) = service();
    let idle = service.create_game(GameConfig::default()).await.unwrap();
    let busy = service.create_game(GameConfig::default()).await.unwrap();

    clock.advance(Duration::hours(3));
    service.join_game(busy, "Anna").await.unwrap();

    let reaped = service.reap_idle_games(Duration::hours(2)).await.unwrap();
    assert_eq!(reaped, vec![idle]);
    assert_eq!(
        service.get_state(idle).await.unwrap_err(),
        GameError::GameNotFound(idle)
    );
    assert!(service.get_state(busy).await.is_ok());
}

#[tokio::test]
async fn test_state_never_leaks_secrets() {
    let (service, _) = service();
    let id = lobby(&service, 5, rules(RoleCounts::wolves_only(1))).await;
    start(&service, id).await;

    let state = service.get_state(id).await.unwrap();
    assert!(state.players.iter().all(|p| p.role.is_none()));
    let json = serde_json::to_string(&state).unwrap();
    assert!(!json.contains("token"));
    assert!(!json.contains("You are the"));
}
