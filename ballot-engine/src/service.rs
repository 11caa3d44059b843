use anchor_lang::prelude::Pubkey;
use core::{str::FromStr, time::Duration};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    address::AddressDeriver,
    builder::{encode_transaction, TransactionBuilder},
    error::BallotError,
    fallback::{FallbackPoll, FallbackResolver},
    gateway::{LedgerGateway, Simulation},
    instruction::VoteAllocation,
    state::{Candidate, Poll},
    validator::{validate_with_tallies, PollRules, Tally, TallyBook},
};

#[derive(Clone, Copy, Debug)]
pub struct ServiceConfig {
    /// Bound on the checkpoint read of every built transaction.
    pub checkpoint_timeout: Duration,
    /// Simulate built vote transactions before handing them out.
    pub preflight: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            checkpoint_timeout: Duration::from_secs(10),
            preflight: false,
        }
    }
}

/// A ballot as received from a client, addresses still in text form.
#[derive(Clone, Debug, Default)]
pub struct BallotRequest {
    pub poll_id: u32,
    pub voter: String,
    pub plus: Vec<String>,
    pub minus: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Ledger,
    Simulated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEntry {
    pub public_key: String,
    pub name: String,
}

/// Poll metadata and candidates as shown to voters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshot {
    pub poll_id: u32,
    pub mode: Mode,
    pub title: String,
    pub description: String,
    pub name: String,
    pub plus_votes_allowed: u8,
    pub minus_votes_allowed: u8,
    pub candidates: Vec<CandidateEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerBallot {
    /// Base64 unsigned transaction for the voter to sign.
    pub transaction: String,
    pub message: String,
    pub poll_id: u32,
    pub positive_votes: u64,
    pub negative_votes: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SimulatedVotes {
    pub plus: Vec<String>,
    pub minus: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedBallot {
    pub message: String,
    pub poll_id: u32,
    pub votes: SimulatedVotes,
    pub note: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BallotOutcome {
    Ledger(LedgerBallot),
    Simulated(SimulatedBallot),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CloseRecordPayload {
    pub transaction: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollConfigView {
    pub poll_description: String,
    pub poll_start: u64,
    pub poll_end: u64,
    pub candidate_count: u64,
    pub winners: u8,
    pub plus_votes_allowed: u8,
    pub minus_votes_allowed: u8,
}

impl From<&Poll> for PollConfigView {
    fn from(poll: &Poll) -> Self {
        Self {
            poll_description: poll.poll_description.clone(),
            poll_start: poll.poll_start,
            poll_end: poll.poll_end,
            candidate_count: poll.candidate_count,
            winners: poll.winners,
            plus_votes_allowed: poll.plus_votes_allowed,
            minus_votes_allowed: poll.minus_votes_allowed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTally {
    pub public_key: String,
    pub name: String,
    pub plus_votes: u64,
    pub minus_votes: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackCheck {
    pub name: String,
    pub expected_address: String,
    pub found: bool,
}

/// What the ledger currently holds for a poll id, next to what the
/// fallback table expects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDiagnostics {
    pub poll_id: u32,
    pub poll_address: String,
    pub poll_exists: bool,
    pub poll: Option<PollConfigView>,
    pub candidates: Vec<CandidateTally>,
    pub fallback_checks: Vec<FallbackCheck>,
    pub errors: Vec<String>,
}

/// Request entry point gluing address derivation, ledger reads, ballot
/// validation, fallback simulation and transaction building together.
/// Holds no per-request state.
pub struct BallotService<G, F> {
    gateway: G,
    fallback: F,
    deriver: AddressDeriver,
    config: ServiceConfig,
}

fn parse_key<E>(raw: &str, err: impl FnOnce(String) -> E) -> Result<Pubkey, E> {
    Pubkey::from_str(raw.trim()).map_err(|_| err(raw.to_string()))
}

fn parse_allocations(raw: &[String]) -> Result<Vec<VoteAllocation>, BallotError> {
    raw.iter()
        .map(|s| parse_key(s, BallotError::InvalidCandidateAddress).map(VoteAllocation::single))
        .collect()
}

fn entry(address: &Pubkey, candidate: &Candidate) -> CandidateEntry {
    CandidateEntry {
        public_key: address.to_string(),
        name: candidate.name_lossy(),
    }
}

impl<G: LedgerGateway, F: FallbackResolver> BallotService<G, F> {
    pub fn new(gateway: G, fallback: F, config: ServiceConfig) -> Self {
        Self {
            deriver: AddressDeriver::new(gateway.program_id()),
            gateway,
            fallback,
            config,
        }
    }

    fn builder(&self) -> TransactionBuilder<'_, G> {
        TransactionBuilder::new(&self.gateway, self.config.checkpoint_timeout)
    }

    /// Reads the poll from the ledger. `None` means it is absent or the
    /// ledger could not be reached; both send callers to the fallback table.
    async fn ledger_poll(&self, poll_id: u32) -> Option<Poll> {
        match self.gateway.fetch_poll(&self.deriver.poll(poll_id)).await {
            Ok(Some(poll)) => Some(poll),
            Ok(None) => {
                debug!("poll {poll_id} is not on the ledger");
                None
            }
            Err(err) => {
                warn!("poll {poll_id} read failed, using fallback: {err}");
                None
            }
        }
    }

    fn fallback_poll(&self, poll_id: u32) -> Result<FallbackPoll, BallotError> {
        self.fallback
            .resolve(poll_id)
            .ok_or(BallotError::PollNotFound(poll_id))
    }

    pub async fn describe_poll(&self, poll_id: u32) -> Result<PollSnapshot, BallotError> {
        let Some(poll) = self.ledger_poll(poll_id).await else {
            let fallback = self.fallback_poll(poll_id)?;
            let candidates = fallback
                .candidate_addresses(&self.deriver)?
                .into_iter()
                .map(|(name, address)| CandidateEntry {
                    public_key: address.to_string(),
                    name,
                })
                .collect();
            return Ok(PollSnapshot {
                poll_id,
                mode: Mode::Simulated,
                title: fallback.title,
                description: fallback.description,
                name: fallback.name,
                plus_votes_allowed: fallback.max_plus,
                minus_votes_allowed: fallback.max_minus,
                candidates,
            });
        };

        let candidates: Vec<_> = self
            .gateway
            .list_candidates(poll_id)
            .await?
            .iter()
            .map(|(address, candidate)| entry(address, candidate))
            .collect();
        Ok(PollSnapshot {
            poll_id,
            mode: Mode::Ledger,
            title: format!("Poll {poll_id}: {}", poll.poll_description),
            description: format!(
                "D21 Voting System - Cast up to {} positive and {} negative votes. \
                 This poll has {} candidates competing for {} seats.",
                poll.plus_votes_allowed,
                poll.minus_votes_allowed,
                candidates.len(),
                poll.winners
            ),
            name: poll.poll_description,
            plus_votes_allowed: poll.plus_votes_allowed,
            minus_votes_allowed: poll.minus_votes_allowed,
            candidates,
        })
    }

    pub async fn cast_ballot(&self, req: &BallotRequest) -> Result<BallotOutcome, BallotError> {
        let voter = parse_key(&req.voter, BallotError::InvalidVoterIdentity)?;
        let plus = parse_allocations(&req.plus)?;
        let minus = parse_allocations(&req.minus)?;
        // Rejected before any ledger read, so an empty ballot reports
        // EmptyBallot even for a voter who has already voted.
        if plus.is_empty() {
            return Err(BallotError::EmptyBallot);
        }

        let outcome = match self.ledger_poll(req.poll_id).await {
            Some(poll) => self.ledger_ballot(req.poll_id, &poll, voter, &plus, &minus).await?,
            None => {
                let fallback = self.fallback_poll(req.poll_id)?;
                let ballot = fallback.simulate(&self.deriver, &plus, &minus)?;
                let keys = |allocations: &[VoteAllocation]| -> Vec<String> {
                    allocations.iter().map(|a| a.candidate.to_string()).collect()
                };
                BallotOutcome::Simulated(SimulatedBallot {
                    message: format!(
                        "Demo vote recorded for poll {}! No blockchain transaction required.",
                        req.poll_id
                    ),
                    poll_id: req.poll_id,
                    votes: SimulatedVotes {
                        plus: keys(&ballot.plus[..]),
                        minus: keys(&ballot.minus[..]),
                    },
                    note: format!(
                        "Poll {} is not initialized on-chain. This is a simulation.",
                        req.poll_id
                    ),
                })
            }
        };
        debug!("ballot for poll {} by {voter} accepted", req.poll_id);
        Ok(outcome)
    }

    async fn ledger_ballot(
        &self,
        poll_id: u32,
        poll: &Poll,
        voter: Pubkey,
        plus: &[VoteAllocation],
        minus: &[VoteAllocation],
    ) -> Result<BallotOutcome, BallotError> {
        let record = self.deriver.voter_record(poll_id, &voter);
        let has_voted = match self.gateway.fetch_voter_record(&record).await {
            Ok(record) => record.is_some_and(|r| r.has_voted),
            Err(err) => {
                warn!("voter record {record} read failed, assuming not voted: {err}");
                false
            }
        };

        let listed = match self.gateway.list_candidates(poll_id).await {
            Ok(listed) => Some(listed),
            Err(err) => {
                warn!("candidates of poll {poll_id} unavailable, skipping membership check: {err}");
                None
            }
        };
        let tallies: TallyBook = listed
            .iter()
            .flatten()
            .map(|(address, c)| {
                let tally = Tally {
                    plus: c.plus_votes,
                    minus: c.minus_votes,
                };
                (*address, tally)
            })
            .collect();

        let ballot =
            validate_with_tallies(&PollRules::from(poll), has_voted, plus, minus, &tallies)?;
        if let Some(listed) = &listed {
            if let Some(unknown) = ballot
                .candidates
                .iter()
                .find(|c| !listed.iter().any(|(address, _)| address == *c))
            {
                return Err(BallotError::InvalidCandidateAddress(unknown.to_string()));
            }
        }

        let built = self.builder().build(poll_id, &voter, &ballot).await?;
        if self.config.preflight {
            self.preflight(&built.transaction).await?;
        }
        Ok(BallotOutcome::Ledger(LedgerBallot {
            transaction: built.encode()?,
            message: built.summary.message(),
            poll_id,
            positive_votes: built.summary.positive_votes,
            negative_votes: built.summary.negative_votes,
        }))
    }

    async fn preflight(
        &self,
        transaction: &solana_sdk::transaction::Transaction,
    ) -> Result<(), BallotError> {
        match self.gateway.simulate(transaction).await? {
            Simulation::Accepted => Ok(()),
            Simulation::Rejected { code, message } => {
                debug!("preflight rejected: {message}");
                Err(code
                    .and_then(BallotError::from_ledger_code)
                    .unwrap_or(BallotError::LedgerRejected(message)))
            }
        }
    }

    pub async fn close_voter_record(
        &self,
        poll_id: u32,
        voter: &str,
    ) -> Result<CloseRecordPayload, BallotError> {
        let voter = parse_key(voter, BallotError::InvalidVoterIdentity)?;
        let transaction = self.builder().build_close(poll_id, &voter).await?;
        Ok(CloseRecordPayload {
            transaction: encode_transaction(&transaction)?,
            message: format!("Closing voter record for poll {poll_id}"),
        })
    }

    /// Never fails on ledger errors; they are reported in the result.
    pub async fn diagnose(&self, poll_id: u32) -> PollDiagnostics {
        let address = self.deriver.poll(poll_id);
        let mut errors = Vec::new();

        let poll = self
            .gateway
            .fetch_poll(&address)
            .await
            .unwrap_or_else(|err| {
                errors.push(format!("poll: {err}"));
                None
            });

        let candidates = match self.gateway.list_candidates(poll_id).await {
            Ok(listed) => listed
                .iter()
                .map(|(address, c)| CandidateTally {
                    public_key: address.to_string(),
                    name: c.name_lossy(),
                    plus_votes: c.plus_votes,
                    minus_votes: c.minus_votes,
                })
                .collect(),
            Err(err) => {
                errors.push(format!("candidates: {err}"));
                Vec::new()
            }
        };

        let mut fallback_checks = Vec::new();
        if let Some(fallback) = self.fallback.resolve(poll_id) {
            for name in &fallback.candidates {
                let Ok(expected) = self.deriver.candidate(poll_id, name) else {
                    continue;
                };
                let found = match self.gateway.fetch_candidate(&expected).await {
                    Ok(found) => found.is_some(),
                    Err(err) => {
                        errors.push(format!("candidate {name}: {err}"));
                        false
                    }
                };
                fallback_checks.push(FallbackCheck {
                    name: name.clone(),
                    expected_address: expected.to_string(),
                    found,
                });
            }
        }

        PollDiagnostics {
            poll_id,
            poll_address: address.to_string(),
            poll_exists: poll.is_some(),
            poll: poll.as_ref().map(PollConfigView::from),
            candidates,
            fallback_checks,
            errors,
        }
    }
}
