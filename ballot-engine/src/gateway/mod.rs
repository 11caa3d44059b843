use anchor_lang::prelude::Pubkey;
use anchor_lang::solana_program::instruction::Instruction;
use solana_sdk::{hash::Hash, transaction::Transaction};
use thiserror::Error;

pub use self::mem::MemoryLedger;
#[cfg(feature = "rpc")]
pub use self::rpc::RpcLedger;
use crate::{
    error::BallotError,
    instruction::{self, Vote, VoteAccounts, VoteAllocation},
    state::{Candidate, Poll, VoterRecord},
};

mod mem;
#[cfg(feature = "rpc")]
mod rpc;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Ledger did not answer in time")]
    Timeout,
    #[error("Account {0} could not be decoded")]
    Decode(Pubkey),
}

impl From<GatewayError> for BallotError {
    fn from(err: GatewayError) -> Self {
        BallotError::LedgerUnavailable(err.to_string())
    }
}

/// Result of running a transaction against the ledger without committing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Simulation {
    Accepted,
    Rejected {
        /// Custom program error code, when the program raised one.
        code: Option<u32>,
        message: String,
    },
}

/// Read access to ledger state plus the program's instruction shape.
/// `Ok(None)` means the account does not exist.
#[allow(async_fn_in_trait)]
pub trait LedgerGateway {
    fn program_id(&self) -> Pubkey;

    async fn fetch_poll(&self, address: &Pubkey) -> Result<Option<Poll>, GatewayError>;

    async fn fetch_candidate(&self, address: &Pubkey) -> Result<Option<Candidate>, GatewayError>;

    async fn fetch_voter_record(
        &self,
        address: &Pubkey,
    ) -> Result<Option<VoterRecord>, GatewayError>;

    /// Candidates of one poll, sorted by name.
    async fn list_candidates(&self, poll_id: u32) -> Result<Vec<(Pubkey, Candidate)>, GatewayError>;

    /// Recent blockhash bounding the validity window of a new message.
    async fn latest_checkpoint(&self) -> Result<Hash, GatewayError>;

    async fn simulate(&self, transaction: &Transaction) -> Result<Simulation, GatewayError>;

    #[allow(clippy::too_many_arguments)]
    fn build_vote_instruction(
        &self,
        poll_id: u32,
        voter: Pubkey,
        poll: Pubkey,
        voter_record: Pubkey,
        plus: Vec<VoteAllocation>,
        minus: Vec<VoteAllocation>,
        candidates: Vec<Pubkey>,
    ) -> Instruction {
        instruction::vote(
            self.program_id(),
            VoteAccounts {
                signer: voter,
                poll,
                voter_record,
                candidates,
            },
            Vote {
                poll_id,
                plus_allocations: plus,
                minus_allocations: minus,
            },
        )
    }
}

/// Keeps the candidates whose address re-derives from their stored name, so
/// a scan over every candidate of the program yields only this poll's.
pub(crate) fn retain_poll_candidates(
    deriver: &crate::address::AddressDeriver,
    poll_id: u32,
    all: impl IntoIterator<Item = (Pubkey, Candidate)>,
) -> Vec<(Pubkey, Candidate)> {
    let mut out: Vec<_> = all
        .into_iter()
        .filter(|(address, candidate)| {
            let Ok(name) = core::str::from_utf8(candidate.name_bytes()) else {
                return false;
            };
            deriver
                .candidate(poll_id, name)
                .is_ok_and(|expected| expected == *address)
        })
        .collect();
    out.sort_by(|(_, a), (_, b)| a.name.cmp(&b.name));
    out
}
