use anchor_lang::prelude::Pubkey;
use core::str::FromStr;

use crate::error::BallotError;

pub const POLL_SEED: &[u8] = b"poll";
pub const CANDIDATE_SEED: &[u8] = b"cand";
pub const VOTER_SEED: &[u8] = b"voter";

/// Size of the zero-padded name buffer of a candidate record.
pub const MAX_NAME_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedKind {
    Poll,
    Candidate,
    Voter,
}

impl FromStr for SeedKind {
    type Err = BallotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            POLL_SEED => Ok(Self::Poll),
            CANDIDATE_SEED => Ok(Self::Candidate),
            VOTER_SEED => Ok(Self::Voter),
            _ => Err(BallotError::InvalidSeedKind(s.to_owned())),
        }
    }
}

/// Derives record addresses with the same seeds the ledger program uses, so
/// every party agrees on identities without a lookup table.
#[derive(Clone, Copy, Debug)]
pub struct AddressDeriver {
    program_id: Pubkey,
}

impl AddressDeriver {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// `extra` is the candidate name for [`SeedKind::Candidate`] and the voter
    /// key bytes for [`SeedKind::Voter`]; it is ignored for polls.
    pub fn derive(
        &self,
        kind: SeedKind,
        poll_id: u32,
        extra: Option<&[u8]>,
    ) -> Result<Pubkey, BallotError> {
        let id = poll_id.to_le_bytes();
        let extra = extra.unwrap_or_default();
        if kind == SeedKind::Candidate && extra.len() > MAX_NAME_LEN {
            return Err(BallotError::NameTooLong { max: MAX_NAME_LEN });
        }
        let seeds: &[&[u8]] = match kind {
            SeedKind::Poll => &[POLL_SEED, &id],
            SeedKind::Candidate => &[CANDIDATE_SEED, &id, extra],
            SeedKind::Voter => &[VOTER_SEED, extra, &id],
        };
        Ok(Pubkey::find_program_address(seeds, &self.program_id).0)
    }

    pub fn derive_named(
        &self,
        kind: &str,
        poll_id: u32,
        extra: Option<&[u8]>,
    ) -> Result<Pubkey, BallotError> {
        self.derive(kind.parse()?, poll_id, extra)
    }

    pub fn poll(&self, poll_id: u32) -> Pubkey {
        Pubkey::find_program_address(&[POLL_SEED, &poll_id.to_le_bytes()], &self.program_id).0
    }

    pub fn candidate(&self, poll_id: u32, name: &str) -> Result<Pubkey, BallotError> {
        self.derive(SeedKind::Candidate, poll_id, Some(name.as_bytes()))
    }

    pub fn voter_record(&self, poll_id: u32, voter: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[VOTER_SEED, voter.as_ref(), &poll_id.to_le_bytes()],
            &self.program_id,
        )
        .0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::prelude::pubkey;

    const PROGRAM_ID: Pubkey = pubkey!("HaV1HXC62zmRYUGDo8XT4kbPY7EMfwFkMZcwjKCF7gxx");

    #[test]
    fn test_derivation_is_deterministic() {
        let a = AddressDeriver::new(PROGRAM_ID);
        let b = AddressDeriver::new(PROGRAM_ID);
        assert_eq!(a.poll(7), b.poll(7));
        assert_eq!(
            a.candidate(7, "Alice - Taxes").unwrap(),
            b.candidate(7, "Alice - Taxes").unwrap()
        );
        let voter = Pubkey::new_unique();
        assert_eq!(a.voter_record(7, &voter), b.voter_record(7, &voter));
    }

    #[test]
    fn test_candidate_address_depends_on_both_inputs() {
        let d = AddressDeriver::new(PROGRAM_ID);
        let base = d.candidate(1, "Alice").unwrap();
        assert_ne!(base, d.candidate(2, "Alice").unwrap());
        assert_ne!(base, d.candidate(1, "Alicf").unwrap());
        assert_ne!(base, d.candidate(1, "Alice ").unwrap());
    }

    #[test]
    fn test_seed_kinds_do_not_collide() {
        let d = AddressDeriver::new(PROGRAM_ID);
        let voter = Pubkey::new_unique();
        let poll = d.poll(3);
        assert_ne!(poll, d.candidate(3, "").unwrap());
        assert_ne!(poll, d.voter_record(3, &voter));
    }

    #[test]
    fn test_shortcuts_match_generic_derivation() {
        let d = AddressDeriver::new(PROGRAM_ID);
        let voter = Pubkey::new_unique();
        assert_eq!(d.derive_named("poll", 9, None).unwrap(), d.poll(9));
        assert_eq!(
            d.derive_named("voter", 9, Some(voter.as_ref())).unwrap(),
            d.voter_record(9, &voter)
        );
        assert_eq!(
            d.derive_named("cand", 9, Some(b"Bob")).unwrap(),
            d.candidate(9, "Bob").unwrap()
        );
    }

    #[test]
    fn test_poll_seed_layout() {
        let d = AddressDeriver::new(PROGRAM_ID);
        let expected =
            Pubkey::find_program_address(&[b"poll", &[1, 0, 0, 0]], &PROGRAM_ID).0;
        assert_eq!(d.poll(1), expected);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let d = AddressDeriver::new(PROGRAM_ID);
        assert_eq!(
            d.derive_named("ballot", 1, None),
            Err(BallotError::InvalidSeedKind("ballot".into()))
        );
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(
            d.candidate(1, &long),
            Err(BallotError::NameTooLong { max: MAX_NAME_LEN })
        );
        assert!(d.candidate(1, &"x".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_poll_ignores_extra_bytes() {
        let d = AddressDeriver::new(PROGRAM_ID);
        let long = [7u8; MAX_NAME_LEN + 8];
        assert_eq!(d.derive(SeedKind::Poll, 4, Some(&long)), Ok(d.poll(4)));
    }
}
