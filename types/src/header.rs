use std::cell::RefCell;

use ethereum_types::{H256, H64, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

use crate::{empty_uncle_hash, mix_digest_sentinel, Address, ExtraData, Height};

/// Semantic boolean for whether the seal is included when hashing/encoding.
/// Mirrors the teacher's `consensus::header::Seal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealInclusion {
    With,
    Without,
}

/// A block header.
///
/// The core only interprets `parent_hash`, `number`, `extra_data` (for the
/// validator list and seal), and the memoized content hash. Every other
/// field is carried opaquely for chain-layer consumers (spec §1, §3).
#[derive(Debug, Clone)]
pub struct Header {
    parent_hash: H256,
    number: Height,
    state_root: H256,
    transactions_root: H256,
    timestamp: u64,
    gas_limit: u64,
    gas_used: u64,
    difficulty: U256,
    nonce: H64,
    mix_digest: H256,
    uncles_hash: H256,
    extra_data: ExtraData,

    hash: RefCell<Option<H256>>,
    bare_hash: RefCell<Option<H256>>,
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.parent_hash == other.parent_hash
            && self.number == other.number
            && self.state_root == other.state_root
            && self.transactions_root == other.transactions_root
            && self.timestamp == other.timestamp
            && self.extra_data == other.extra_data
    }
}
impl Eq for Header {}

impl Header {
    pub fn new(
        parent_hash: H256,
        number: Height,
        state_root: H256,
        transactions_root: H256,
        timestamp: u64,
        extra_data: ExtraData,
    ) -> Self {
        Header {
            parent_hash,
            number,
            state_root,
            transactions_root,
            timestamp,
            gas_limit: 0,
            gas_used: 0,
            difficulty: U256::one(),
            nonce: H64::zero(),
            mix_digest: mix_digest_sentinel(),
            uncles_hash: empty_uncle_hash(),
            extra_data,
            hash: RefCell::new(None),
            bare_hash: RefCell::new(None),
        }
    }

    pub fn parent_hash(&self) -> H256 {
        self.parent_hash
    }
    pub fn number(&self) -> Height {
        self.number
    }
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
    pub fn extra_data(&self) -> &ExtraData {
        &self.extra_data
    }
    pub fn difficulty(&self) -> U256 {
        self.difficulty
    }
    pub fn nonce(&self) -> H64 {
        self.nonce
    }
    pub fn mix_digest(&self) -> H256 {
        self.mix_digest
    }
    pub fn uncles_hash(&self) -> H256 {
        self.uncles_hash
    }

    /// Header-level checks that do not require chain access (spec §4.1
    /// `verify_header`, the static subset): zero mix-digest sentinel, empty
    /// uncle hash, unit difficulty, zero nonce.
    pub fn verify_static(&self) -> bool {
        self.mix_digest == mix_digest_sentinel()
            && self.uncles_hash == empty_uncle_hash()
            && self.difficulty == U256::one()
            && self.nonce == H64::zero()
    }

    pub fn set_extra_data(&mut self, extra_data: ExtraData) {
        self.extra_data = extra_data;
        self.note_dirty();
    }

    fn note_dirty(&self) {
        *self.hash.borrow_mut() = None;
        *self.bare_hash.borrow_mut() = None;
    }

    /// The header's content hash, including the seal. This is the block's
    /// identity: parent linkage, queue keys, and vote/certificate payloads
    /// all refer to blocks by this hash (spec §3 "32-byte content hash").
    pub fn hash(&self) -> H256 {
        if let Some(h) = *self.hash.borrow() {
            return h;
        }
        let h = self.rlp_hash(SealInclusion::With);
        *self.hash.borrow_mut() = Some(h);
        h
    }

    /// The hash of the header with the seal blanked — the preimage that
    /// gets signed (spec §4.2 `sig_hash`, §6 "seal ... over the header with
    /// the seal field blanked").
    pub fn bare_hash(&self) -> H256 {
        if let Some(h) = *self.bare_hash.borrow() {
            return h;
        }
        let h = self.rlp_hash(SealInclusion::Without);
        *self.bare_hash.borrow_mut() = Some(h);
        h
    }

    fn stream_rlp(&self, s: &mut RlpStream, seal: SealInclusion) {
        s.begin_list(11);
        s.append(&self.parent_hash);
        s.append(&self.uncles_hash);
        s.append(&self.state_root);
        s.append(&self.transactions_root);
        s.append(&self.number);
        s.append(&self.timestamp);
        s.append(&self.gas_limit);
        s.append(&self.gas_used);
        s.append(&self.difficulty);
        s.append(&self.nonce);
        match seal {
            SealInclusion::With => s.append(&self.extra_data.to_bytes()),
            SealInclusion::Without => s.append(&self.extra_data.blanked().to_bytes()),
        };
    }

    fn rlp_hash(&self, seal: SealInclusion) -> H256 {
        let mut s = RlpStream::new();
        self.stream_rlp(&mut s, seal);
        keccak_hash::keccak(s.out())
    }

    /// Recovers the address that produced this header's seal. Cached by the
    /// caller (spec §4.1 `recover_signer`); this function is pure.
    pub fn recover_signer(&self, recover: impl Fn(&crate::Signature, H256) -> Option<Address>) -> Option<Address> {
        recover(&self.extra_data.seal, self.bare_hash())
    }
}

impl Encodable for Header {
    fn rlp_append(&self, s: &mut RlpStream) {
        self.stream_rlp(s, SealInclusion::With);
    }
}

impl Decodable for Header {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 11 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let extra_bytes: Vec<u8> = rlp.val_at(10)?;
        Ok(Header {
            parent_hash: rlp.val_at(0)?,
            uncles_hash: rlp.val_at(1)?,
            state_root: rlp.val_at(2)?,
            transactions_root: rlp.val_at(3)?,
            number: rlp.val_at(4)?,
            timestamp: rlp.val_at(5)?,
            gas_limit: rlp.val_at(6)?,
            gas_used: rlp.val_at(7)?,
            difficulty: rlp.val_at(8)?,
            nonce: rlp.val_at(9)?,
            mix_digest: mix_digest_sentinel(),
            extra_data: ExtraData::from_bytes(&extra_bytes)?,
            hash: RefCell::new(None),
            bare_hash: RefCell::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExtraData;
    use ethereum_types::H160;

    fn sample_header(number: Height) -> Header {
        let extra = ExtraData::new(vec![H160::from_low_u64_be(1)]);
        Header::new(H256::zero(), number, H256::zero(), H256::zero(), number, extra)
    }

    #[test]
    fn bare_hash_ignores_seal_content_hash_does_not() {
        let mut h1 = sample_header(1);
        let mut h2 = sample_header(1);
        h1.set_extra_data(h1.extra_data().with_seal([1u8; 65]));
        h2.set_extra_data(h2.extra_data().with_seal([2u8; 65]));
        assert_eq!(h1.bare_hash(), h2.bare_hash());
        assert_ne!(h1.hash(), h2.hash());
    }

    #[test]
    fn hash_is_memoized_until_mutated() {
        let header = sample_header(5);
        let h1 = header.hash();
        let h2 = header.hash();
        assert_eq!(h1, h2);
    }

    #[test]
    fn rlp_round_trip() {
        let header = sample_header(42);
        let encoded = rlp::encode(&header);
        let decoded: Header = rlp::decode(&encoded).unwrap();
        assert_eq!(header.number(), decoded.number());
        assert_eq!(header.bare_hash(), decoded.bare_hash());
    }

    #[test]
    fn static_verification_rejects_nonzero_nonce() {
        let mut header = sample_header(1);
        header.nonce = H64::from_low_u64_be(1);
        assert!(!header.verify_static());
    }
}
