use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

use crate::{Address, Signature};

/// Length in bytes of the zero-padded vanity prefix (spec §6).
pub const VANITY_LENGTH: usize = 32;

/// Length in bytes of a recoverable ECDSA seal.
pub const SEAL_LENGTH: usize = 65;

/// The contents of a header's `extra_data` field: 32 bytes of vanity,
/// followed by an RLP-encoded `(validators, seal)` pair.
///
/// `seal` is all-zero until the proposer signs the header; `sig_hash`
/// (spec §4.2, §6) is computed over the header with `seal` blanked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraData {
    pub vanity: [u8; VANITY_LENGTH],
    pub validators: Vec<Address>,
    pub seal: Signature,
}

impl ExtraData {
    pub fn new(validators: Vec<Address>) -> Self {
        ExtraData {
            vanity: [0u8; VANITY_LENGTH],
            validators,
            seal: [0u8; SEAL_LENGTH],
        }
    }

    pub fn with_seal(&self, seal: Signature) -> Self {
        ExtraData {
            vanity: self.vanity,
            validators: self.validators.clone(),
            seal,
        }
    }

    /// `extra_data` with the seal blanked, used to build `sig_hash`.
    pub fn blanked(&self) -> Self {
        ExtraData {
            vanity: self.vanity,
            validators: self.validators.clone(),
            seal: [0u8; SEAL_LENGTH],
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(VANITY_LENGTH + 128);
        out.extend_from_slice(&self.vanity);
        let mut s = RlpStream::new_list(2);
        s.append_list(&self.validators);
        s.append(&self.seal.as_ref());
        out.extend_from_slice(&s.out());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecoderError> {
        if bytes.len() < VANITY_LENGTH {
            return Err(DecoderError::Custom("extra_data shorter than vanity prefix"));
        }
        let mut vanity = [0u8; VANITY_LENGTH];
        vanity.copy_from_slice(&bytes[..VANITY_LENGTH]);
        let rlp = Rlp::new(&bytes[VANITY_LENGTH..]);
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let validators: Vec<Address> = rlp.list_at(0)?;
        let seal_bytes: Vec<u8> = rlp.val_at(1)?;
        if seal_bytes.len() != SEAL_LENGTH {
            return Err(DecoderError::Custom("seal must be 65 bytes"));
        }
        let mut seal = [0u8; SEAL_LENGTH];
        seal.copy_from_slice(&seal_bytes);
        Ok(ExtraData {
            vanity,
            validators,
            seal,
        })
    }
}

impl Encodable for ExtraData {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.append(&self.to_bytes());
    }
}

impl Decodable for ExtraData {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let bytes: Vec<u8> = rlp.as_val()?;
        ExtraData::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::H160;

    #[test]
    fn round_trips_through_bytes() {
        let validators = vec![H160::from_low_u64_be(1), H160::from_low_u64_be(2)];
        let mut extra = ExtraData::new(validators);
        extra.seal = [7u8; SEAL_LENGTH];
        let bytes = extra.to_bytes();
        let decoded = ExtraData::from_bytes(&bytes).unwrap();
        assert_eq!(extra, decoded);
    }

    #[test]
    fn blanked_zeroes_only_the_seal() {
        let validators = vec![H160::from_low_u64_be(9)];
        let mut extra = ExtraData::new(validators);
        extra.seal = [3u8; SEAL_LENGTH];
        let blanked = extra.blanked();
        assert_eq!(blanked.seal, [0u8; SEAL_LENGTH]);
        assert_eq!(blanked.validators, extra.validators);
    }
}
