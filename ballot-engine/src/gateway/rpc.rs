use anchor_lang::{prelude::Pubkey, AnchorDeserialize, Discriminator};
use core::{fmt::Display, future::Future, time::Duration};
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcSimulateTransactionConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    instruction::InstructionError,
    transaction::{Transaction, TransactionError},
};
use tracing::{debug, warn};

use super::{retain_poll_candidates, GatewayError, LedgerGateway, Simulation};
use crate::{
    address::AddressDeriver,
    state::{decode_account, Candidate, Poll, VoterRecord},
};

/// Ledger gateway over Solana JSON-RPC. Every call is bounded by `timeout`.
pub struct RpcLedger {
    client: RpcClient,
    deriver: AddressDeriver,
    timeout: Duration,
}

impl RpcLedger {
    pub fn new(
        rpc_url: String,
        program_id: Pubkey,
        commitment: CommitmentConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            client: RpcClient::new_with_timeout_and_commitment(rpc_url, timeout, commitment),
            deriver: AddressDeriver::new(program_id),
            timeout,
        }
    }

    async fn bounded<T, E: Display>(
        &self,
        request: impl Future<Output = Result<T, E>>,
    ) -> Result<T, GatewayError> {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(GatewayError::Rpc(err.to_string())),
            Err(_) => Err(GatewayError::Timeout),
        }
    }

    async fn fetch_account<T: AnchorDeserialize + Discriminator>(
        &self,
        address: &Pubkey,
    ) -> Result<Option<T>, GatewayError> {
        let response = self
            .bounded(
                self.client
                    .get_account_with_commitment(address, self.client.commitment()),
            )
            .await?;
        let Some(account) = response.value else {
            return Ok(None);
        };
        if account.owner != self.deriver.program_id() {
            warn!("Account {address} is owned by {}", account.owner);
            return Err(GatewayError::Decode(*address));
        }
        decode_account(&account.data)
            .map(Some)
            .ok_or(GatewayError::Decode(*address))
    }
}

impl LedgerGateway for RpcLedger {
    fn program_id(&self) -> Pubkey {
        self.deriver.program_id()
    }

    async fn fetch_poll(&self, address: &Pubkey) -> Result<Option<Poll>, GatewayError> {
        self.fetch_account(address).await
    }

    async fn fetch_candidate(&self, address: &Pubkey) -> Result<Option<Candidate>, GatewayError> {
        self.fetch_account(address).await
    }

    async fn fetch_voter_record(
        &self,
        address: &Pubkey,
    ) -> Result<Option<VoterRecord>, GatewayError> {
        self.fetch_account(address).await
    }

    async fn list_candidates(&self, poll_id: u32) -> Result<Vec<(Pubkey, Candidate)>, GatewayError> {
        // the RPC has no per-poll index, so scan every candidate of the program
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                0,
                Candidate::DISCRIMINATOR,
            ))]),
            account_config: RpcAccountInfoConfig {
                commitment: Some(self.client.commitment()),
                ..Default::default()
            },
            ..Default::default()
        };
        let program_id = self.deriver.program_id();
        let accounts = self
            .bounded(
                self.client
                    .get_program_accounts_with_config(&program_id, config),
            )
            .await?;
        debug!("Scanned {} candidate accounts", accounts.len());

        let decoded = accounts.into_iter().filter_map(|(address, account)| {
            decode_account::<Candidate>(&account.data).map(|candidate| (address, candidate))
        });
        Ok(retain_poll_candidates(&self.deriver, poll_id, decoded))
    }

    async fn latest_checkpoint(&self) -> Result<Hash, GatewayError> {
        self.bounded(self.client.get_latest_blockhash()).await
    }

    async fn simulate(&self, transaction: &Transaction) -> Result<Simulation, GatewayError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            commitment: Some(self.client.commitment()),
            ..Default::default()
        };
        let response = self
            .bounded(
                self.client
                    .simulate_transaction_with_config(transaction, config),
            )
            .await?;
        Ok(match response.value.err {
            None => Simulation::Accepted,
            Some(err) => {
                let code = match &err {
                    TransactionError::InstructionError(_, InstructionError::Custom(code)) => {
                        Some(*code)
                    }
                    _ => None,
                };
                Simulation::Rejected {
                    code,
                    message: err.to_string(),
                }
            }
        })
    }
}
