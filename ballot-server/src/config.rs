use anchor_lang::prelude::Pubkey;
use ballot_engine::{
    address::MAX_NAME_LEN,
    fallback::{FallbackPoll, StaticFallback},
    validator::quota_for_seats,
};
use config::{Config, File};
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use solana_sdk::commitment_config::CommitmentLevel;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub(crate) struct BallotConfig {
    pub addrs: String,
    pub solana: SolanaConfig,
    pub ssl: Option<SslConfig>,
    #[serde(default)]
    pub preflight: bool,
    #[serde(default)]
    pub fallback_polls: Vec<FallbackPollConfig>,
}

impl BallotConfig {
    pub(super) fn from_path(config_path: PathBuf) -> Self {
        debug!("Reading config from path {:?}", config_path);
        let config = Config::builder()
            .add_source(File::from(config_path))
            .add_source(environment())
            .build()
            .expect("Failed to build envs");

        config
            .try_deserialize()
            .expect("Failed to deserialize config")
    }

    /// Built-in demo polls with the configured entries merged over them.
    pub fn fallback_table(&self) -> Result<StaticFallback, FallbackConfigError> {
        self.fallback_polls
            .iter()
            .try_fold(StaticFallback::builtin(), |table, entry| {
                entry.to_poll().map(|poll| table.with(poll))
            })
    }
}

/// `BALLOT_` prefixed variables, with `__` between nested keys so that
/// field names keep their underscores: `BALLOT_SOLANA__RPC_URL`.
fn environment() -> config::Environment {
    config::Environment::with_prefix("BALLOT")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(crate) struct SolanaConfig {
    pub rpc_url: String,
    #[serde_as(as = "DisplayFromStr")]
    pub program_id: Pubkey,
    #[serde(default = "default_commitment")]
    pub commitment: CommitmentLevel,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_commitment() -> CommitmentLevel {
    CommitmentLevel::Confirmed
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct SslConfig {
    pub key: PathBuf,
    pub cert: PathBuf,
}

/// A fallback poll given either explicit vote maxima or a seat count from
/// which the D21 quotas are computed. Explicit maxima take precedence.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct FallbackPollConfig {
    pub poll_id: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub name: Option<String>,
    pub max_plus: Option<u8>,
    pub max_minus: Option<u8>,
    pub seats: Option<u8>,
    pub candidates: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum FallbackConfigError {
    #[error("Fallback poll {0} needs either seats or max_plus")]
    MissingQuota(u32),
    #[error(
        "Fallback poll {poll_id}: candidate name {name:?} is longer than {} bytes",
        MAX_NAME_LEN
    )]
    NameTooLong { poll_id: u32, name: String },
}

impl FallbackPollConfig {
    fn to_poll(&self) -> Result<FallbackPoll, FallbackConfigError> {
        let quota = self.seats.map(quota_for_seats);
        let max_plus = self
            .max_plus
            .or(quota.map(|q| q.0))
            .ok_or(FallbackConfigError::MissingQuota(self.poll_id))?;
        let max_minus = self.max_minus.or(quota.map(|q| q.1)).unwrap_or(0);

        if let Some(name) = self.candidates.iter().find(|c| c.len() > MAX_NAME_LEN) {
            return Err(FallbackConfigError::NameTooLong {
                poll_id: self.poll_id,
                name: name.clone(),
            });
        }

        Ok(FallbackPoll {
            poll_id: self.poll_id,
            title: self.title.clone(),
            description: self.description.clone(),
            name: self.name.clone().unwrap_or_else(|| self.title.clone()),
            max_plus,
            max_minus,
            candidates: self.candidates.clone(),
        })
    }
}
