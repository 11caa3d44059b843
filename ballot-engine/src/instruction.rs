use anchor_lang::prelude::*;
use anchor_lang::solana_program::instruction::Instruction;
use anchor_lang::{system_program, Discriminator, InstructionData, ToAccountMetas};

/// One unit (or more) of weight for a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct VoteAllocation {
    pub candidate: Pubkey,
    pub votes: u8,
}

impl VoteAllocation {
    pub fn single(candidate: Pubkey) -> Self {
        Self { candidate, votes: 1 }
    }
}

/// Arguments of the ledger program's `vote` instruction.
#[derive(Clone, Debug, AnchorSerialize)]
pub struct Vote {
    pub poll_id: u32,
    pub plus_allocations: Vec<VoteAllocation>,
    pub minus_allocations: Vec<VoteAllocation>,
}

impl Discriminator for Vote {
    const DISCRIMINATOR: &'static [u8] = &[227, 110, 155, 23, 136, 126, 172, 25];
}

impl InstructionData for Vote {}

pub struct VoteAccounts {
    pub signer: Pubkey,
    pub poll: Pubkey,
    pub voter_record: Pubkey,
    /// Every candidate the ballot touches; the program increments them in place.
    pub candidates: Vec<Pubkey>,
}

impl ToAccountMetas for VoteAccounts {
    fn to_account_metas(&self, _is_signer: Option<bool>) -> Vec<AccountMeta> {
        let mut metas = vec![
            AccountMeta::new(self.signer, true),
            AccountMeta::new_readonly(self.poll, false),
            AccountMeta::new(self.voter_record, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ];
        metas.extend(
            self.candidates
                .iter()
                .map(|candidate| AccountMeta::new(*candidate, false)),
        );
        metas
    }
}

#[derive(Clone, Debug, AnchorSerialize)]
pub struct CloseVoterRecord {}

impl Discriminator for CloseVoterRecord {
    const DISCRIMINATOR: &'static [u8] = &[7, 242, 20, 136, 143, 35, 242, 97];
}

impl InstructionData for CloseVoterRecord {}

pub struct CloseVoterRecordAccounts {
    pub voter_record: Pubkey,
    pub signer: Pubkey,
}

impl ToAccountMetas for CloseVoterRecordAccounts {
    fn to_account_metas(&self, _is_signer: Option<bool>) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.voter_record, false),
            AccountMeta::new(self.signer, true),
        ]
    }
}

pub fn vote(program_id: Pubkey, accounts: VoteAccounts, args: Vote) -> Instruction {
    Instruction::new_with_bytes(program_id, &args.data(), accounts.to_account_metas(None))
}

pub fn close_voter_record(program_id: Pubkey, accounts: CloseVoterRecordAccounts) -> Instruction {
    Instruction::new_with_bytes(
        program_id,
        &CloseVoterRecord {}.data(),
        accounts.to_account_metas(None),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_data_layout() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let data = Vote {
            poll_id: 0x0102_0304,
            plus_allocations: vec![
                VoteAllocation::single(a),
                VoteAllocation { candidate: b, votes: 2 },
            ],
            minus_allocations: vec![],
        }
        .data();

        assert_eq!(&data[..8], Vote::DISCRIMINATOR);
        assert_eq!(&data[8..12], &[4, 3, 2, 1]);
        assert_eq!(&data[12..16], &2u32.to_le_bytes());
        assert_eq!(&data[16..48], a.as_ref());
        assert_eq!(data[48], 1);
        assert_eq!(&data[49..81], b.as_ref());
        assert_eq!(data[81], 2);
        assert_eq!(&data[82..], &0u32.to_le_bytes());
    }

    #[test]
    fn test_vote_account_order() {
        let accounts = VoteAccounts {
            signer: Pubkey::new_unique(),
            poll: Pubkey::new_unique(),
            voter_record: Pubkey::new_unique(),
            candidates: vec![Pubkey::new_unique(), Pubkey::new_unique()],
        };
        let metas = accounts.to_account_metas(None);
        assert_eq!(metas.len(), 6);
        assert!(metas[0].is_signer && metas[0].is_writable);
        assert_eq!(metas[0].pubkey, accounts.signer);
        assert!(!metas[1].is_writable);
        assert!(metas[2].is_writable && !metas[2].is_signer);
        assert_eq!(metas[3].pubkey, system_program::ID);
        for (meta, candidate) in metas[4..].iter().zip(&accounts.candidates) {
            assert_eq!(meta.pubkey, *candidate);
            assert!(meta.is_writable && !meta.is_signer);
        }
    }

    #[test]
    fn test_close_voter_record() {
        let program_id = Pubkey::new_unique();
        let signer = Pubkey::new_unique();
        let voter_record = Pubkey::new_unique();
        let ix = close_voter_record(
            program_id,
            CloseVoterRecordAccounts {
                voter_record,
                signer,
            },
        );
        assert_eq!(ix.program_id, program_id);
        assert_eq!(ix.data, CloseVoterRecord::DISCRIMINATOR);
        assert_eq!(ix.accounts[1].pubkey, signer);
        assert!(ix.accounts[1].is_signer);
    }
}
