//! Admin-only snapshot record (spec §6, §9 "Bootstrap"): captures the
//! replica's view and leader at a given committed block, keyed by
//! `"e2c-snapshot" ‖ block_hash` in the local database. Consulted only when
//! a node starts up with an empty in-memory view/status pair; never
//! written or read mid-protocol (spec §9 Open Question: admin-only,
//! resolved against exposing it as a consensus input).

use ethereum_types::H256;

use e2c_types::{Address, Height};

pub const SNAPSHOT_KEY_PREFIX: &[u8] = b"e2c-snapshot";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub height: Height,
    pub hash: H256,
    pub view: u64,
    pub leader: Address,
}

impl Snapshot {
    pub fn key_for(hash: &H256) -> Vec<u8> {
        let mut key = SNAPSHOT_KEY_PREFIX.to_vec();
        key.extend_from_slice(hash.as_bytes());
        key
    }
}

/// The local database's snapshot surface, separate from [`crate::chain::ChainWriter`]
/// so a read-only RPC layer can be handed just this narrower trait.
pub trait SnapshotStore: Send + Sync {
    fn snapshot_at(&self, hash: &H256) -> Option<Snapshot>;
    fn put_snapshot(&self, snapshot: &Snapshot);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_includes_the_hash() {
        let hash = H256::repeat_byte(7);
        let key = Snapshot::key_for(&hash);
        assert!(key.starts_with(SNAPSHOT_KEY_PREFIX));
        assert!(key.ends_with(hash.as_bytes()));
    }
}
