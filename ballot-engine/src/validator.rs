use anchor_lang::prelude::Pubkey;
use std::collections::{hash_map::Entry, HashMap};

use crate::{error::BallotError, instruction::VoteAllocation, state::Poll};

const PHI: f64 = 1.618;

/// The limits a ballot is checked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollRules {
    pub max_plus: u8,
    pub max_minus: u8,
    pub candidate_count: u64,
}

impl From<&Poll> for PollRules {
    fn from(poll: &Poll) -> Self {
        Self {
            max_plus: poll.plus_votes_allowed,
            max_minus: poll.minus_votes_allowed,
            candidate_count: poll.candidate_count,
        }
    }
}

/// D21 vote quotas for a poll awarding `seats` winners:
/// `plus = ⌊2W − (W − 2)·φ⌋`, `minus = ⌊plus / 3⌋`.
pub fn quota_for_seats(seats: u8) -> (u8, u8) {
    let w = seats as f64;
    // float to int casts saturate, so small or huge W stays in range
    let plus = (2.0 * w - (w - 2.0) * PHI).floor() as u8;
    (plus, plus / 3)
}

/// Current tallies of a candidate record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub plus: u64,
    pub minus: u64,
}

pub type TallyBook = HashMap<Pubkey, Tally>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedBallot {
    pub plus: Vec<VoteAllocation>,
    pub minus: Vec<VoteAllocation>,
    pub plus_total: u64,
    pub minus_total: u64,
    /// Unique candidates in first-seen order, positive list first.
    pub candidates: Vec<Pubkey>,
}

fn total(allocations: &[VoteAllocation]) -> Option<u64> {
    allocations
        .iter()
        .try_fold(0u64, |acc, a| acc.checked_add(a.votes as u64))
}

/// Checks a ballot against the D21 rules in the ledger program's order, so
/// the first violated rule reports the same code the ledger would.
pub fn validate(
    rules: &PollRules,
    voter_has_voted: bool,
    plus: &[VoteAllocation],
    minus: &[VoteAllocation],
) -> Result<ValidatedBallot, BallotError> {
    validate_with_tallies(rules, voter_has_voted, plus, minus, &TallyBook::new())
}

/// Like [`validate`], additionally refusing ballots that would push a known
/// tally past `u64::MAX`.
pub fn validate_with_tallies(
    rules: &PollRules,
    voter_has_voted: bool,
    plus: &[VoteAllocation],
    minus: &[VoteAllocation],
    tallies: &TallyBook,
) -> Result<ValidatedBallot, BallotError> {
    if voter_has_voted {
        return Err(BallotError::AlreadyVoted);
    }
    // Product rule with no ledger counterpart; checked early so an empty
    // positive list is reported as such whatever the negative list holds.
    if plus.is_empty() {
        return Err(BallotError::EmptyBallot);
    }

    let plus_total = total(plus).ok_or(BallotError::Overflow)?;
    let minus_total = total(minus).ok_or(BallotError::Overflow)?;

    if plus_total > rules.max_plus as u64 {
        return Err(BallotError::TooManyPlus {
            max: rules.max_plus,
        });
    }
    if minus_total > rules.max_minus as u64 {
        return Err(BallotError::TooManyMinus {
            max: rules.max_minus,
        });
    }
    let combined = plus_total
        .checked_add(minus_total)
        .ok_or(BallotError::Overflow)?;
    if combined >= rules.candidate_count {
        return Err(BallotError::InvalidTotal {
            candidate_count: rules.candidate_count,
        });
    }
    if minus_total > 0 && plus_total < 2 {
        return Err(BallotError::MinusRequiresTwoPlus);
    }

    let mut candidates = Vec::new();
    let mut added: HashMap<Pubkey, Tally> = HashMap::new();
    for (allocations, positive) in [(plus, true), (minus, false)] {
        for allocation in allocations {
            let entry = match added.entry(allocation.candidate) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    candidates.push(allocation.candidate);
                    e.insert(Tally::default())
                }
            };
            let slot = if positive {
                &mut entry.plus
            } else {
                &mut entry.minus
            };
            *slot = slot
                .checked_add(allocation.votes as u64)
                .ok_or(BallotError::Overflow)?;
        }
    }
    for (candidate, delta) in &added {
        let current = tallies.get(candidate).copied().unwrap_or_default();
        current
            .plus
            .checked_add(delta.plus)
            .zip(current.minus.checked_add(delta.minus))
            .ok_or(BallotError::Overflow)?;
    }

    Ok(ValidatedBallot {
        plus: plus.to_vec(),
        minus: minus.to_vec(),
        plus_total,
        minus_total,
        candidates,
    })
}
