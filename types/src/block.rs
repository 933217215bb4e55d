use ethereum_types::H256;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

use crate::{Bytes, Header, Height};

/// A block, opaque to the core except for the fields documented on
/// [`Header`] (spec §3). `body` carries whatever the chain layer encodes
/// transactions as; the core never decodes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub body: Bytes,
}

impl Block {
    pub fn new(header: Header, body: Bytes) -> Self {
        Block {
            header,
            body,
        }
    }

    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    pub fn number(&self) -> Height {
        self.header.number()
    }

    pub fn parent_hash(&self) -> H256 {
        self.header.parent_hash()
    }

    /// Orders blocks by `(parent, height)` as spec §3 requires: a block is
    /// only ever compared against its expected predecessor, never globally
    /// ranked, so this returns whether `self` is the immediate child of
    /// `parent`.
    pub fn is_child_of(&self, parent: &Block) -> bool {
        self.parent_hash() == parent.hash() && self.number() == parent.number() + 1
    }
}

impl Encodable for Block {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.header);
        s.append(&self.body);
    }
}

impl Decodable for Block {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Block {
            header: rlp.val_at(0)?,
            body: rlp.val_at(1)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExtraData;
    use ethereum_types::H160;

    fn block_at(number: Height, parent_hash: H256) -> Block {
        let extra = ExtraData::new(vec![H160::from_low_u64_be(1)]);
        let header = Header::new(parent_hash, number, H256::zero(), H256::zero(), number, extra);
        Block::new(header, vec![])
    }

    #[test]
    fn child_linkage() {
        let genesis = block_at(0, H256::zero());
        let child = block_at(1, genesis.hash());
        assert!(child.is_child_of(&genesis));
        let not_child = block_at(2, genesis.hash());
        assert!(!not_child.is_child_of(&genesis));
    }

    #[test]
    fn rlp_round_trip() {
        let block = block_at(3, H256::repeat_byte(9));
        let encoded = rlp::encode(&block);
        let decoded: Block = rlp::decode(&encoded).unwrap();
        assert_eq!(block, decoded);
    }
}
