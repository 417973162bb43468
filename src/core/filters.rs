use std::cmp::Ordering;

use crate::models::{CandidateMatch, Constraints, Game, OverlapDimension};

/// Check if a game passes every filter in the constraint set
///
/// A null stored value never satisfies a bound filter. The vote floor is
/// the exception: an unknown vote count does not disqualify a game.
#[inline]
pub fn matches_constraints(game: &Game, constraints: &Constraints) -> bool {
    if let Some(players) = constraints.players {
        if !at_most(game.minplayers, players) || !at_least(game.maxplayers, players) {
            return false;
        }
    }

    if let Some(minplayers) = constraints.minplayers {
        if !at_least(game.maxplayers, minplayers) {
            return false;
        }
    }

    if let Some(maxplayers) = constraints.maxplayers {
        if !at_most(game.minplayers, maxplayers) {
            return false;
        }
    }

    if let Some(maxplaytime) = constraints.maxplaytime {
        if !at_most(game.maxplaytime, maxplaytime) {
            return false;
        }
    }

    if let Some(minplaytime) = constraints.minplaytime {
        if !at_least(game.minplaytime, minplaytime) {
            return false;
        }
    }

    match game.numvotes {
        Some(votes) => votes >= constraints.min_votes,
        None => true,
    }
}

#[inline]
fn at_most(value: Option<i32>, bound: i32) -> bool {
    value.is_some_and(|v| v <= bound)
}

#[inline]
fn at_least(value: Option<i32>, bound: i32) -> bool {
    value.is_some_and(|v| v >= bound)
}

/// Candidate ranking: overlap desc, votes desc with unknown last, id asc
pub fn compare_candidates(
    dimension: OverlapDimension,
    a: &CandidateMatch,
    b: &CandidateMatch,
) -> Ordering {
    b.overlap(dimension)
        .cmp(&a.overlap(dimension))
        .then_with(|| match (a.numvotes, b.numvotes) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.g_id.cmp(&b.g_id))
}
