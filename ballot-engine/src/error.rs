use thiserror::Error;

/// Errors a ballot request can end in. Codes in the 6000 range are shared
/// with the ledger program, so a rejection looks the same whether it was
/// caught locally or returned by the ledger.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BallotError {
    /// 6000 0x1770
    #[error("Voter has already cast a ballot")]
    AlreadyVoted,
    /// 6001 0x1771
    #[error("Allocated more plus votes than allowed (max {max})")]
    TooManyPlus { max: u8 },
    /// 6002 0x1772
    #[error("Allocated more minus votes than allowed (max {max})")]
    TooManyMinus { max: u8 },
    /// 6003 0x1773
    #[error("Total votes must be less than candidate count {candidate_count}")]
    InvalidTotal { candidate_count: u64 },
    /// 6004 0x1774
    #[error("Minus vote requires at least two plus votes")]
    MinusRequiresTwoPlus,
    /// 6005 0x1775
    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Invalid poll id")]
    InvalidPollId,
    #[error("Poll {0} not found")]
    PollNotFound(u32),
    #[error("Candidate name is longer than {max} bytes")]
    NameTooLong { max: usize },
    #[error("At least one positive vote is required")]
    EmptyBallot,
    #[error("Invalid candidate address: {0}")]
    InvalidCandidateAddress(String),
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),
    #[error("Unknown seed kind: {0}")]
    InvalidSeedKind(String),
    #[error("Invalid voter identity: {0}")]
    InvalidVoterIdentity(String),
    /// A ledger rejection without a counterpart in the ballot rules.
    #[error("Ledger rejected the transaction: {0}")]
    LedgerRejected(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

const LEDGER_CODE_BASE: u32 = 6000;

impl BallotError {
    pub fn code(&self) -> u32 {
        match self {
            Self::AlreadyVoted => LEDGER_CODE_BASE,
            Self::TooManyPlus { .. } => LEDGER_CODE_BASE + 1,
            Self::TooManyMinus { .. } => LEDGER_CODE_BASE + 2,
            Self::InvalidTotal { .. } => LEDGER_CODE_BASE + 3,
            Self::MinusRequiresTwoPlus => LEDGER_CODE_BASE + 4,
            Self::Overflow => LEDGER_CODE_BASE + 5,
            Self::InvalidPollId => 7000,
            Self::PollNotFound(_) => 7001,
            Self::NameTooLong { .. } => 7002,
            Self::EmptyBallot => 7003,
            Self::InvalidCandidateAddress(_) => 7004,
            Self::LedgerUnavailable(_) => 7005,
            Self::InvalidSeedKind(_) => 7006,
            Self::InvalidVoterIdentity(_) => 7007,
            Self::LedgerRejected(_) => 7008,
            Self::Internal(_) => 7009,
            Self::MalformedRequest(_) => 7010,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AlreadyVoted => "AlreadyVoted",
            Self::TooManyPlus { .. } => "TooManyPlus",
            Self::TooManyMinus { .. } => "TooManyMinus",
            Self::InvalidTotal { .. } => "InvalidTotal",
            Self::MinusRequiresTwoPlus => "MinusRequiresTwoPlus",
            Self::Overflow => "Overflow",
            Self::InvalidPollId => "InvalidPollId",
            Self::PollNotFound(_) => "PollNotFound",
            Self::NameTooLong { .. } => "NameTooLong",
            Self::EmptyBallot => "EmptyBallot",
            Self::InvalidCandidateAddress(_) => "InvalidCandidateAddress",
            Self::LedgerUnavailable(_) => "LedgerUnavailable",
            Self::InvalidSeedKind(_) => "InvalidSeedKind",
            Self::InvalidVoterIdentity(_) => "InvalidVoterIdentity",
            Self::LedgerRejected(_) => "LedgerRejected",
            Self::Internal(_) => "Internal",
            Self::MalformedRequest(_) => "MalformedRequest",
        }
    }

    /// Translates a custom program error returned by the ledger. The ledger
    /// does not report the configured limits, so those fields are zeroed.
    pub fn from_ledger_code(code: u32) -> Option<Self> {
        Some(match code.checked_sub(LEDGER_CODE_BASE)? {
            0 => Self::AlreadyVoted,
            1 => Self::TooManyPlus { max: 0 },
            2 => Self::TooManyMinus { max: 0 },
            3 => Self::InvalidTotal { candidate_count: 0 },
            4 => Self::MinusRequiresTwoPlus,
            5 => Self::Overflow,
            _ => return None,
        })
    }

    /// Whether the failure is the caller's fault rather than the ledger's.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::LedgerUnavailable(_) | Self::PollNotFound(_) | Self::Internal(_)
        )
    }
}
