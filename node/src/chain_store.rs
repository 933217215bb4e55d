//! A minimal in-memory stand-in for the local database and blockchain data
//! model — both explicitly out of scope (spec §1 Non-goals) and, in a real
//! deployment, owned by a collaborator this crate never sees. Grounded on
//! the teacher's single-validator `consensus::solo` engine: same idea of a
//! trivial backing store just complete enough to let the engine run
//! end-to-end in this binary.

use std::sync::Mutex;

use ethereum_types::H256;

use e2c_consensus::chain::{ChainReader, ChainWriter};
use e2c_consensus::snapshot::{Snapshot, SnapshotStore};
use e2c_types::{Address, Block, Height};

#[derive(Default)]
pub struct InMemoryChain {
    blocks: Mutex<Vec<Block>>,
    snapshots: Mutex<Vec<Snapshot>>,
}

impl InMemoryChain {
    pub fn new(genesis: Block) -> Self {
        InMemoryChain {
            blocks: Mutex::new(vec![genesis]),
            snapshots: Mutex::new(Vec::new()),
        }
    }
}

impl ChainReader for InMemoryChain {
    fn block_by_hash(&self, hash: &H256) -> Option<Block> {
        self.blocks.lock().unwrap().iter().find(|b| b.hash() == *hash).cloned()
    }

    fn block_by_number(&self, number: Height) -> Option<Block> {
        self.blocks.lock().unwrap().iter().find(|b| b.number() == number).cloned()
    }

    fn committed_height(&self) -> Height {
        self.blocks.lock().unwrap().last().map(|b| b.number()).unwrap_or(0)
    }

    fn signer_of(&self, hash: &H256) -> Option<Address> {
        let blocks = self.blocks.lock().unwrap();
        let block = blocks.iter().find(|b| b.hash() == *hash)?;
        block.header.recover_signer(|sig, digest| e2c_crypto::recover(sig, digest).ok())
    }
}

impl ChainWriter for InMemoryChain {
    fn commit(&self, block: &Block) -> Result<(), String> {
        let mut blocks = self.blocks.lock().unwrap();
        if blocks.last().map(|b| b.hash()) == Some(block.hash()) {
            return Ok(()); // already committed, e.g. by the certified-block path
        }
        blocks.push(block.clone());
        Ok(())
    }
}

impl SnapshotStore for InMemoryChain {
    fn snapshot_at(&self, hash: &H256) -> Option<Snapshot> {
        self.snapshots.lock().unwrap().iter().find(|s| s.hash == *hash).cloned()
    }

    fn put_snapshot(&self, snapshot: &Snapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}
