use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::GameError;
use crate::models::{
    game::{DeathCause, Game, GamePhase},
    player::PlayerId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyOutcome {
    Elected(PlayerId),
    Tied(BTreeSet<PlayerId>),
    NoVotes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub counts: BTreeMap<PlayerId, u32>,
    pub outcome: TallyOutcome,
}

/// How a closed vote ended, from the phase machine's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteResolution {
    Decided(PlayerId),
    Runoff(BTreeSet<PlayerId>),
    NoDecision,
}

/// Counts the ballots of living voters for living candidates. With
/// `mayor_weight` the mayor's ballot counts twice.
pub fn tally(game: &Game, mayor_weight: bool) -> Tally {
    let mut counts: BTreeMap<PlayerId, u32> = BTreeMap::new();
    for (voter, target) in &game.votes {
        let Some(voter) = game.player(*voter).filter(|p| p.is_alive) else {
            continue;
        };
        let Some(target) = target else {
            continue;
        };
        if !game.candidates.contains(target) || !game.is_alive(*target) {
            continue;
        }
        let weight = if mayor_weight && voter.is_mayor { 2 } else { 1 };
        *counts.entry(*target).or_insert(0) += weight;
    }

    let outcome = match counts.values().max().copied() {
        None => TallyOutcome::NoVotes,
        Some(top) => {
            let leaders: Vec<PlayerId> = counts
                .iter()
                .filter(|(_, n)| **n == top)
                .map(|(id, _)| *id)
                .collect();
            if leaders.len() == 1 {
                TallyOutcome::Elected(leaders[0])
            } else {
                TallyOutcome::Tied(leaders.into_iter().collect())
            }
        }
    };
    Tally { counts, outcome }
}

pub fn record_vote(game: &mut Game, voter: PlayerId, target: Option<PlayerId>) -> Result<(), GameError> {
    if !game.phase.is_vote() {
        return Err(GameError::illegal("no vote is running"));
    }
    if !game.is_alive(voter) {
        return Err(GameError::illegal("dead players cannot vote"));
    }
    if let Some(target) = target {
        if !game.candidates.contains(&target) || !game.is_alive(target) {
            return Err(GameError::illegal("that player is not a candidate"));
        }
    }
    game.votes.insert(voter, target);
    Ok(())
}

pub fn record_accusation(game: &mut Game, accuser: PlayerId, target: PlayerId) -> Result<(), GameError> {
    if game.phase != GamePhase::Accusations {
        return Err(GameError::illegal("accusations are closed"));
    }
    if !game.is_alive(accuser) {
        return Err(GameError::illegal("dead players cannot accuse"));
    }
    if accuser == target {
        return Err(GameError::illegal("you cannot accuse yourself"));
    }
    if !game.is_alive(target) {
        return Err(GameError::illegal("only living players can be accused"));
    }
    game.accusations.insert(accuser, target);
    Ok(())
}

pub fn all_votes_in(game: &Game) -> bool {
    game.living().all(|p| game.votes.contains_key(&p.id))
}

pub fn open_mayor_election(game: &mut Game) {
    game.votes.clear();
    game.candidates = game.living_ids().into_iter().collect();
}

/// Everyone still alive who was accused today stands for election.
pub fn open_voting(game: &mut Game) {
    game.votes.clear();
    game.candidates = game
        .accusations
        .values()
        .copied()
        .filter(|id| game.is_alive(*id))
        .collect();
}

pub fn open_runoff(game: &mut Game, tied: BTreeSet<PlayerId>, now: DateTime<Utc>) {
    let names = tied
        .iter()
        .map(|id| game.name_of(*id))
        .collect::<Vec<_>>()
        .join(" and ");
    game.votes.clear();
    game.candidates = tied;
    game.log_public(format!("Tie between {}. A runoff decides.", names), now);
}

fn announce_counts(game: &mut Game, tally: &Tally, now: DateTime<Utc>) {
    if tally.counts.is_empty() {
        game.log_public("Nobody received a vote.".to_string(), now);
        return;
    }
    let summary = tally
        .counts
        .iter()
        .map(|(id, n)| format!("{}: {}", game.name_of(*id), n))
        .collect::<Vec<_>>()
        .join(", ");
    game.log_public(format!("Votes: {}.", summary), now);
}

/// Closes a mayor election or its runoff. A second tie leaves the village
/// without a mayor.
pub fn close_mayor_vote(game: &mut Game, now: DateTime<Utc>) -> VoteResolution {
    let tally = tally(game, false);
    announce_counts(game, &tally, now);
    match tally.outcome {
        TallyOutcome::Elected(id) => {
            for player in game.players.iter_mut() {
                player.is_mayor = player.id == id;
            }
            game.mayor_election_due = false;
            let name = game.name_of(id);
            game.log_public(format!("{} is the new mayor.", name), now);
            VoteResolution::Decided(id)
        }
        TallyOutcome::Tied(tied) if game.phase == GamePhase::MayorElection => {
            VoteResolution::Runoff(tied)
        }
        TallyOutcome::Tied(_) | TallyOutcome::NoVotes => {
            game.mayor_election_due = false;
            game.log_public("No mayor was elected.".to_string(), now);
            VoteResolution::NoDecision
        }
    }
}

/// Closes the elimination vote or its runoff and lynches a clear winner.
pub fn close_elimination_vote(game: &mut Game, now: DateTime<Utc>) -> VoteResolution {
    let tally = tally(game, true);
    announce_counts(game, &tally, now);
    match tally.outcome {
        TallyOutcome::Elected(id) => {
            game.finalize_deaths(vec![(id, DeathCause::Lynched)], now);
            VoteResolution::Decided(id)
        }
        TallyOutcome::Tied(tied) if game.phase == GamePhase::Voting => VoteResolution::Runoff(tied),
        TallyOutcome::Tied(_) | TallyOutcome::NoVotes => {
            game.log_public("Nobody is lynched today.".to_string(), now);
            VoteResolution::NoDecision
        }
    }
}
