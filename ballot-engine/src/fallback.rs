use anchor_lang::prelude::Pubkey;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::{
    address::AddressDeriver,
    error::BallotError,
    instruction::VoteAllocation,
    validator::{validate, PollRules, ValidatedBallot},
};

/// A poll definition used when the poll does not exist on the ledger yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackPoll {
    pub poll_id: u32,
    pub title: String,
    pub description: String,
    pub name: String,
    pub max_plus: u8,
    pub max_minus: u8,
    pub candidates: Vec<String>,
}

impl FallbackPoll {
    pub fn rules(&self) -> PollRules {
        PollRules {
            max_plus: self.max_plus,
            max_minus: self.max_minus,
            candidate_count: self.candidates.len() as u64,
        }
    }

    /// Candidate names with the addresses they would get once seeded.
    pub fn candidate_addresses(
        &self,
        deriver: &AddressDeriver,
    ) -> Result<Vec<(String, Pubkey)>, BallotError> {
        self.candidates
            .iter()
            .map(|name| Ok((name.clone(), deriver.candidate(self.poll_id, name)?)))
            .collect()
    }

    /// Runs the ballot rules in memory. Nothing is recorded anywhere.
    pub fn simulate(
        &self,
        deriver: &AddressDeriver,
        plus: &[VoteAllocation],
        minus: &[VoteAllocation],
    ) -> Result<ValidatedBallot, BallotError> {
        let ballot = validate(&self.rules(), false, plus, minus)?;
        let known = self.candidate_addresses(deriver)?;
        if let Some(unknown) = ballot
            .candidates
            .iter()
            .find(|c| !known.iter().any(|(_, address)| address == *c))
        {
            return Err(BallotError::InvalidCandidateAddress(unknown.to_string()));
        }
        debug!(
            "simulated ballot for fallback poll {}: {} plus, {} minus",
            self.poll_id, ballot.plus_total, ballot.minus_total
        );
        Ok(ballot)
    }
}

pub trait FallbackResolver {
    fn resolve(&self, poll_id: u32) -> Option<FallbackPoll>;
}

/// Fixed table of fallback polls keyed by poll id.
#[derive(Clone, Debug)]
pub struct StaticFallback {
    polls: BTreeMap<u32, FallbackPoll>,
}

impl StaticFallback {
    pub fn empty() -> Self {
        Self {
            polls: BTreeMap::new(),
        }
    }

    /// The demo polls shipped with the voting app.
    pub fn builtin() -> Self {
        let topics = ["Education", "Security", "Healthcare", "Defense", "Taxes"];
        let policy_candidates = ["Alice", "Bob"]
            .iter()
            .flat_map(|who| topics.iter().map(move |t| format!("{who} - {t}")))
            .collect();

        Self::empty()
            .with(FallbackPoll {
                poll_id: 1,
                title: "Alice vs Bob — Public Policy Preference Poll".into(),
                description: "D21 Voting System Demo - Cast up to 2 positive and 1 negative votes. \
                    Choose your preferred policies across 5 key areas: education, security, \
                    healthcare, defense, and taxes."
                    .into(),
                name: "Alice vs Bob — Public Policy Preferences".into(),
                max_plus: 2,
                max_minus: 1,
                candidates: policy_candidates,
            })
            .with(FallbackPoll {
                poll_id: 2,
                title: "Tech vs Environment Policy Debate".into(),
                description: "D21 Voting Demo - Cast up to 3 positive and 1 negative votes. \
                    This poll is not yet initialized on-chain."
                    .into(),
                name: "Tech vs Environment Policy Debate".into(),
                max_plus: 3,
                max_minus: 1,
                candidates: [
                    "Tech Innovation Focus",
                    "Environmental Protection",
                    "Balanced Approach",
                    "Economic Growth Priority",
                    "Renewable Energy Push",
                ]
                .map(String::from)
                .to_vec(),
            })
    }

    /// Adds or replaces the entry for `poll.poll_id`.
    pub fn with(mut self, poll: FallbackPoll) -> Self {
        self.polls.insert(poll.poll_id, poll);
        self
    }

    pub fn len(&self) -> usize {
        self.polls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }
}

impl FallbackResolver for StaticFallback {
    fn resolve(&self, poll_id: u32) -> Option<FallbackPoll> {
        self.polls.get(&poll_id).cloned()
    }
}
