use ethereum_types::H256;

/// Errors the core can raise while handling a message, block, or timer fire.
///
/// Per spec §7, most of these are not fatal: the dispatcher (§4.2) logs and
/// drops the offending message rather than propagating the error further.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed wire frame: {0}")]
    Decode(#[from] rlp::DecoderError),

    #[error("signature does not recover to the declared sender")]
    InvalidSignature,

    #[error("message view {msg_view} does not match current view {current_view}")]
    WrongView {
        msg_view: u64,
        current_view: u64,
    },

    #[error("sender {0:?} is not a member of the current validator set")]
    UnknownSender(e2c_types::Address),

    #[error("parent {0:?} is not in the chain or the block queue")]
    UnknownAncestor(H256),

    #[error("block {0:?} is already in the queue")]
    DuplicateBlock(H256),

    #[error("equivocation detected: leader signed two blocks at height {0}")]
    Equivocation(u64),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("certificate has only {got} signatures, needs more than {f}")]
    NotEnoughSignatures {
        got: usize,
        f: usize,
    },

    #[error("certificate signature invalid or duplicate signer")]
    InvalidCertificateSignature,

    #[error("status {0:?} does not permit this operation")]
    WrongStatus(e2c_types::Status),

    #[error("sender {0:?} is not the current leader")]
    NotLeader(e2c_types::Address),

    #[error("crypto error: {0}")]
    Crypto(#[from] e2c_crypto::Error),

    #[error("the local chain writer rejected the block: {0}")]
    ChainWriter(String),

    #[error("snapshot corrupted or unreadable: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, Error>;
