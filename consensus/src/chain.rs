//! The narrow interfaces the core consumes from the blockchain data model
//! and local database — both explicitly out of scope per spec §1, modeled
//! here as traits an external collaborator implements.

use ethereum_types::H256;

use e2c_types::{Address, Block, Height};

/// Read access to already-committed chain state (spec §4.1 `verify_header`
/// falling through to the chain when the queue doesn't have the parent).
pub trait ChainReader: Send + Sync {
    fn block_by_hash(&self, hash: &H256) -> Option<Block>;
    fn block_by_number(&self, number: Height) -> Option<Block>;
    fn committed_height(&self) -> Height;
    fn signer_of(&self, hash: &H256) -> Option<Address>;
}

/// The local database's write surface (spec §1 "local database used to
/// persist committed blocks", §5 "the collaborator's responsibility to
/// make its own writes durable before acknowledging").
pub trait ChainWriter: Send + Sync {
    /// Durably appends `block` as the new committed tip. Must not return
    /// until the write is durable.
    fn commit(&self, block: &Block) -> Result<(), String>;
}
