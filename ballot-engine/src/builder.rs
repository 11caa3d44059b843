use anchor_lang::prelude::Pubkey;
use anchor_lang::solana_program::instruction::Instruction;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use core::time::Duration;
use serde::Serialize;
use solana_sdk::{hash::Hash, message::Message, transaction::Transaction};
use tracing::debug;

use crate::{
    address::AddressDeriver,
    error::BallotError,
    gateway::{GatewayError, LedgerGateway},
    instruction::{self, CloseVoterRecordAccounts},
    validator::ValidatedBallot,
};

/// What the client is shown next to the transaction it will sign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotSummary {
    pub poll_id: u32,
    pub positive_votes: u64,
    pub negative_votes: u64,
    pub candidates: usize,
}

impl BallotSummary {
    pub fn message(&self) -> String {
        format!(
            "Submitting {} positive and {} negative votes to poll {}",
            self.positive_votes, self.negative_votes, self.poll_id
        )
    }
}

/// Unsigned transaction, ready for the voter's wallet.
#[derive(Clone, Debug)]
pub struct UnsignedBallot {
    pub transaction: Transaction,
    pub summary: BallotSummary,
}

impl UnsignedBallot {
    /// Base64 of the wire-format transaction with empty signature slots.
    pub fn encode(&self) -> Result<String, BallotError> {
        encode_transaction(&self.transaction)
    }
}

pub fn encode_transaction(transaction: &Transaction) -> Result<String, BallotError> {
    bincode::serialize(transaction)
        .map(|bytes| BASE64.encode(bytes))
        .map_err(|err| BallotError::Internal(format!("transaction encoding: {err}")))
}

pub struct TransactionBuilder<'a, G> {
    gateway: &'a G,
    deriver: AddressDeriver,
    checkpoint_timeout: Duration,
}

impl<'a, G: LedgerGateway> TransactionBuilder<'a, G> {
    pub fn new(gateway: &'a G, checkpoint_timeout: Duration) -> Self {
        Self {
            deriver: AddressDeriver::new(gateway.program_id()),
            gateway,
            checkpoint_timeout,
        }
    }

    /// Builds the single vote instruction for a validated ballot. Never
    /// signs or submits; the only ledger read is the checkpoint.
    pub async fn build(
        &self,
        poll_id: u32,
        voter: &Pubkey,
        ballot: &ValidatedBallot,
    ) -> Result<UnsignedBallot, BallotError> {
        let poll = self.deriver.poll(poll_id);
        let voter_record = self.deriver.voter_record(poll_id, voter);
        let instruction = self.gateway.build_vote_instruction(
            poll_id,
            *voter,
            poll,
            voter_record,
            ballot.plus.clone(),
            ballot.minus.clone(),
            ballot.candidates.clone(),
        );
        let transaction = self.assemble(instruction, voter).await?;
        debug!(
            "built vote for poll {poll_id} by {voter}, {} candidate accounts",
            ballot.candidates.len()
        );

        Ok(UnsignedBallot {
            transaction,
            summary: BallotSummary {
                poll_id,
                positive_votes: ballot.plus_total,
                negative_votes: ballot.minus_total,
                candidates: ballot.candidates.len(),
            },
        })
    }

    /// Builds a transaction closing the voter's record and returning its rent.
    pub async fn build_close(&self, poll_id: u32, voter: &Pubkey) -> Result<Transaction, BallotError> {
        let instruction = instruction::close_voter_record(
            self.gateway.program_id(),
            CloseVoterRecordAccounts {
                voter_record: self.deriver.voter_record(poll_id, voter),
                signer: *voter,
            },
        );
        self.assemble(instruction, voter).await
    }

    async fn assemble(
        &self,
        instruction: Instruction,
        payer: &Pubkey,
    ) -> Result<Transaction, BallotError> {
        let checkpoint = self.checkpoint().await?;
        let message = Message::new_with_blockhash(&[instruction], Some(payer), &checkpoint);
        Ok(Transaction::new_unsigned(message))
    }

    async fn checkpoint(&self) -> Result<Hash, BallotError> {
        tokio::time::timeout(self.checkpoint_timeout, self.gateway.latest_checkpoint())
            .await
            .map_err(|_| GatewayError::Timeout)?
            .map_err(BallotError::from)
    }
}
