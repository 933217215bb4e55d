//! The read-only admin surface (spec §4.8): current view/leader, the
//! validator set, committed signers over a height range, validator
//! membership, and the bootstrap snapshot. No consensus-affecting methods
//! are exposed (spec §1 Non-goals: "full RPC/admin surface" beyond this is
//! out of scope; spec §9 Open Question: snapshot access is admin-only).

use std::sync::Arc;

use ethereum_types::H256;
use jsonrpc_core::{Error as RpcError, ErrorCode, Result as RpcResult};
use jsonrpc_derive::rpc;
use serde::{Deserialize, Serialize};

use e2c_consensus::chain::ChainReader;
use e2c_consensus::snapshot::SnapshotStore;
use e2c_consensus::state::SharedViewStatus;
use e2c_consensus::validator_set::ValidatorList;
use e2c_types::{Address, Height};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDto {
    pub height: Height,
    pub hash: H256,
    pub view: u64,
    pub leader: Address,
}

#[rpc(server)]
pub trait E2cRpc {
    #[rpc(name = "e2c_currentView")]
    fn current_view(&self) -> RpcResult<u64>;

    #[rpc(name = "e2c_currentLeader")]
    fn current_leader(&self) -> RpcResult<Address>;

    #[rpc(name = "e2c_getValidators")]
    fn get_validators(&self) -> RpcResult<Vec<Address>>;

    #[rpc(name = "e2c_isValidator")]
    fn is_validator(&self, address: Address) -> RpcResult<bool>;

    #[rpc(name = "e2c_getSigners")]
    fn get_signers(&self, from: Height, to: Height) -> RpcResult<Vec<(Height, Address)>>;

    #[rpc(name = "e2c_getSnapshot")]
    fn get_snapshot(&self, hash: H256) -> RpcResult<Option<SnapshotDto>>;
}

pub struct E2cRpcImpl {
    validators: ValidatorList,
    shared: SharedViewStatus,
    reader: Arc<dyn ChainReader>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl E2cRpcImpl {
    pub fn new(
        validators: ValidatorList,
        shared: SharedViewStatus,
        reader: Arc<dyn ChainReader>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        E2cRpcImpl {
            validators,
            shared,
            reader,
            snapshots,
        }
    }
}

fn range_too_large(from: Height, to: Height) -> RpcError {
    RpcError {
        code: ErrorCode::InvalidParams,
        message: format!("range {}..={} exceeds the maximum query window", from, to),
        data: None,
    }
}

/// The widest `[from, to]` window a single `e2c_getSigners` call serves, to
/// keep an admin query from forcing a full chain scan (spec §4.8).
const MAX_SIGNER_RANGE: u64 = 10_000;

impl E2cRpc for E2cRpcImpl {
    fn current_view(&self) -> RpcResult<u64> {
        Ok(self.shared.view())
    }

    fn current_leader(&self) -> RpcResult<Address> {
        Ok(self.validators.leader(self.shared.view()))
    }

    fn get_validators(&self) -> RpcResult<Vec<Address>> {
        Ok(self.validators.as_slice().to_vec())
    }

    fn is_validator(&self, address: Address) -> RpcResult<bool> {
        Ok(self.validators.contains(&address))
    }

    fn get_signers(&self, from: Height, to: Height) -> RpcResult<Vec<(Height, Address)>> {
        if to < from || to - from > MAX_SIGNER_RANGE {
            return Err(range_too_large(from, to));
        }
        let mut out = Vec::new();
        for height in from..=to {
            let Some(block) = self.reader.block_by_number(height) else {
                continue;
            };
            if let Some(signer) = self.reader.signer_of(&block.hash()) {
                out.push((height, signer));
            }
        }
        Ok(out)
    }

    fn get_snapshot(&self, hash: H256) -> RpcResult<Option<SnapshotDto>> {
        Ok(self.snapshots.snapshot_at(&hash).map(|s| SnapshotDto {
            height: s.height,
            hash: s.hash,
            view: s.view,
            leader: s.leader,
        }))
    }
}
