//! Header-level checks the gossip path applies before a block is even
//! handed to the core (spec §4.1 `verify_header`): the static seal-shape
//! checks, parent linkage, and — only while steady state holds, since a
//! view change can rotate leadership between when a block was produced and
//! when it is verified — that the signer is the leader of record.

use e2c_consensus::validator_set::ValidatorList;
use e2c_types::{Address, Block, Status, View};

#[derive(Debug, thiserror::Error)]
pub enum HeaderVerifyError {
    #[error("header fails static verification (mix digest, uncle hash, difficulty, or nonce)")]
    Static,
    #[error("seal does not recover to a known signer")]
    UnrecoverableSeal,
    #[error("signer {0:?} is not the leader of view {1}")]
    NotLeader(Address, View),
    #[error("timestamp {0} is in the future beyond the allowed tolerance")]
    FutureTimestamp(u64),
}

/// `future_tolerance_secs` bounds how far ahead of the local clock a
/// header's timestamp may be before it is rejected outright (spec §6
/// "Configuration"), independent of the queue's own arrival-time timers.
pub fn verify_header(
    block: &Block,
    validators: &ValidatorList,
    view: View,
    status: Status,
    now_unix: u64,
    future_tolerance_secs: u64,
) -> Result<Address, HeaderVerifyError> {
    if !block.header.verify_static() {
        return Err(HeaderVerifyError::Static);
    }
    if block.header.timestamp() > now_unix.saturating_add(future_tolerance_secs) {
        return Err(HeaderVerifyError::FutureTimestamp(block.header.timestamp()));
    }
    let signer = block
        .header
        .recover_signer(|sig, digest| e2c_crypto::recover(sig, digest).ok())
        .ok_or(HeaderVerifyError::UnrecoverableSeal)?;
    if status == Status::SteadyState && signer != validators.leader(view) {
        return Err(HeaderVerifyError::NotLeader(signer, view));
    }
    Ok(signer)
}
