use anchor_lang::prelude::Pubkey;
use core::time::Duration;
use solana_sdk::{hash::Hash, transaction::Transaction};
use std::collections::HashMap;

use super::{retain_poll_candidates, GatewayError, LedgerGateway, Simulation};
use crate::{
    address::AddressDeriver,
    state::{pad_name, Candidate, Poll, VoterRecord},
};

/// Ledger state held in memory. Serves demos and tests.
#[derive(Clone, Debug)]
pub struct MemoryLedger {
    deriver: AddressDeriver,
    polls: HashMap<Pubkey, Poll>,
    candidates: HashMap<Pubkey, Candidate>,
    voter_records: HashMap<Pubkey, VoterRecord>,
    checkpoint: Hash,
    checkpoint_delay: Option<Duration>,
    offline: bool,
    simulation: Option<Simulation>,
}

impl MemoryLedger {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            deriver: AddressDeriver::new(program_id),
            polls: HashMap::new(),
            candidates: HashMap::new(),
            voter_records: HashMap::new(),
            checkpoint: Hash::new_unique(),
            checkpoint_delay: None,
            offline: false,
            simulation: None,
        }
    }

    /// Stores the poll with `candidate_count` taken from `poll` as is.
    pub fn with_poll(mut self, poll: Poll) -> Self {
        self.polls.insert(self.deriver.poll(poll.poll_id), poll);
        self
    }

    /// Adds a candidate and bumps the poll's candidate count, as the
    /// program's `initialize_candidate` does. Names that do not fit the
    /// on-chain buffer are skipped.
    pub fn with_candidate(mut self, poll_id: u32, name: &str, plus: u64, minus: u64) -> Self {
        let Some(padded) = pad_name(name) else {
            return self;
        };
        let Ok(address) = self.deriver.candidate(poll_id, name) else {
            return self;
        };
        self.candidates.insert(
            address,
            Candidate {
                name: padded,
                plus_votes: plus,
                minus_votes: minus,
            },
        );
        if let Some(poll) = self.polls.get_mut(&self.deriver.poll(poll_id)) {
            poll.candidate_count += 1;
        }
        self
    }

    pub fn with_voter_record(mut self, poll_id: u32, voter: &Pubkey, record: VoterRecord) -> Self {
        self.voter_records
            .insert(self.deriver.voter_record(poll_id, voter), record);
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: Hash) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    /// Makes the checkpoint read hang for `delay` before answering.
    pub fn with_checkpoint_delay(mut self, delay: Duration) -> Self {
        self.checkpoint_delay = Some(delay);
        self
    }

    /// Every read fails as if the RPC endpoint were down.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Simulations return `outcome` instead of accepting.
    pub fn with_simulation(mut self, outcome: Simulation) -> Self {
        self.simulation = Some(outcome);
        self
    }

    fn ensure_online(&self) -> Result<(), GatewayError> {
        if self.offline {
            return Err(GatewayError::Rpc("connection refused".into()));
        }
        Ok(())
    }
}

impl LedgerGateway for MemoryLedger {
    fn program_id(&self) -> Pubkey {
        self.deriver.program_id()
    }

    async fn fetch_poll(&self, address: &Pubkey) -> Result<Option<Poll>, GatewayError> {
        self.ensure_online()?;
        Ok(self.polls.get(address).cloned())
    }

    async fn fetch_candidate(&self, address: &Pubkey) -> Result<Option<Candidate>, GatewayError> {
        self.ensure_online()?;
        Ok(self.candidates.get(address).cloned())
    }

    async fn fetch_voter_record(
        &self,
        address: &Pubkey,
    ) -> Result<Option<VoterRecord>, GatewayError> {
        self.ensure_online()?;
        Ok(self.voter_records.get(address).copied())
    }

    async fn list_candidates(&self, poll_id: u32) -> Result<Vec<(Pubkey, Candidate)>, GatewayError> {
        self.ensure_online()?;
        Ok(retain_poll_candidates(
            &self.deriver,
            poll_id,
            self.candidates.iter().map(|(k, v)| (*k, v.clone())),
        ))
    }

    async fn latest_checkpoint(&self) -> Result<Hash, GatewayError> {
        self.ensure_online()?;
        if let Some(delay) = self.checkpoint_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.checkpoint)
    }

    async fn simulate(&self, _transaction: &Transaction) -> Result<Simulation, GatewayError> {
        self.ensure_online()?;
        Ok(self.simulation.clone().unwrap_or(Simulation::Accepted))
    }
}
