use anchor_lang::prelude::*;
use anchor_lang::Discriminator;

use crate::address::MAX_NAME_LEN;

/// Poll configuration as stored by the ledger program.
#[derive(Clone, Debug, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Poll {
    pub poll_id: u32,
    pub poll_description: String,
    pub poll_start: u64,
    pub poll_end: u64,
    pub candidate_count: u64,
    pub winners: u8,
    pub plus_votes_allowed: u8,
    pub minus_votes_allowed: u8,
}

impl Discriminator for Poll {
    const DISCRIMINATOR: &'static [u8] = &[110, 234, 167, 188, 231, 136, 153, 111];
}

#[derive(Clone, Debug, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Candidate {
    pub name: [u8; MAX_NAME_LEN],
    pub plus_votes: u64,
    pub minus_votes: u64,
}

impl Discriminator for Candidate {
    const DISCRIMINATOR: &'static [u8] = &[86, 69, 250, 96, 193, 10, 222, 123];
}

impl Candidate {
    /// Name with the zero padding stripped.
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_LEN);
        &self.name[..len]
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct VoterRecord {
    pub has_voted: bool,
    pub plus_used: u8,
    pub minus_used: u8,
}

impl Discriminator for VoterRecord {
    const DISCRIMINATOR: &'static [u8] = &[178, 96, 138, 116, 143, 202, 115, 33];
}

/// Pads a candidate name into the fixed on-chain buffer.
pub fn pad_name(name: &str) -> Option<[u8; MAX_NAME_LEN]> {
    let bytes = name.as_bytes();
    if bytes.len() > MAX_NAME_LEN {
        return None;
    }
    let mut out = [0u8; MAX_NAME_LEN];
    out[..bytes.len()].copy_from_slice(bytes);
    Some(out)
}

/// Decodes an account written by the ledger program. Accounts are allocated
/// with room for the longest description, so trailing bytes are ignored.
pub fn decode_account<T: AnchorDeserialize + Discriminator>(data: &[u8]) -> Option<T> {
    let body = data.strip_prefix(T::DISCRIMINATOR)?;
    AnchorDeserialize::deserialize(&mut &body[..]).ok()
}

#[cfg(test)]
pub(crate) fn encode_account<T: AnchorSerialize + Discriminator>(value: &T) -> Vec<u8> {
    let mut data = T::DISCRIMINATOR.to_vec();
    value.serialize(&mut data).unwrap();
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_poll() -> Poll {
        Poll {
            poll_id: 2,
            poll_description: "Tech vs Environment Policy Debate".into(),
            poll_start: 1_700_000_000,
            poll_end: 1_700_604_800,
            candidate_count: 5,
            winners: 3,
            plus_votes_allowed: 3,
            minus_votes_allowed: 1,
        }
    }

    #[test]
    fn test_poll_layout() {
        let data = encode_account(&sample_poll());
        assert_eq!(&data[..8], Poll::DISCRIMINATOR);
        assert_eq!(&data[8..12], &2u32.to_le_bytes());
        // borsh string: u32 length prefix then bytes
        assert_eq!(&data[12..16], &33u32.to_le_bytes());
        let tail = &data[16 + 33..];
        assert_eq!(tail.len(), 8 + 8 + 8 + 3);
        assert_eq!(&tail[16..24], &5u64.to_le_bytes());
        assert_eq!(&tail[24..], &[3, 3, 1]);
    }

    #[test]
    fn test_decode_ignores_padding() {
        let mut data = encode_account(&sample_poll());
        data.extend_from_slice(&[0; 64]);
        assert_eq!(decode_account::<Poll>(&data), Some(sample_poll()));
    }

    #[test]
    fn test_decode_rejects_wrong_discriminator() {
        let record = VoterRecord {
            has_voted: true,
            plus_used: 2,
            minus_used: 1,
        };
        let data = encode_account(&record);
        assert_eq!(data.len(), 8 + 3);
        assert_eq!(decode_account::<VoterRecord>(&data), Some(record));
        assert_eq!(decode_account::<Poll>(&data), None);
        assert_eq!(decode_account::<VoterRecord>(&data[..5]), None);
    }

    #[test]
    fn test_candidate_name_padding() {
        let candidate = Candidate {
            name: pad_name("Balanced Approach").unwrap(),
            plus_votes: 4,
            minus_votes: 1,
        };
        assert_eq!(candidate.name_lossy(), "Balanced Approach");
        let data = encode_account(&candidate);
        assert_eq!(data.len(), 8 + 32 + 16);
        assert_eq!(decode_account::<Candidate>(&data), Some(candidate));

        let full = pad_name(&"z".repeat(MAX_NAME_LEN)).unwrap();
        assert_eq!(full, [b'z'; MAX_NAME_LEN]);
        assert!(pad_name(&"z".repeat(MAX_NAME_LEN + 1)).is_none());
    }
}
