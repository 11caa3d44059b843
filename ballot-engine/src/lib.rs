//! Off-chain engine for D21 ballots against the voting program: address
//! derivation, ballot rules, unsigned transaction assembly and the demo
//! fallback used before a poll exists on the ledger.

pub mod address;
pub mod builder;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod instruction;
pub mod service;
pub mod state;
pub mod validator;

pub use error::BallotError;
