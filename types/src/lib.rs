//! Block, header, and address primitives consumed by the E2C consensus core.
//!
//! The core treats a block as opaque except for the handful of fields this
//! crate exposes: height, parent hash, content hash, signer, and the
//! `(parent, height)` ordering relation (see spec §3).

pub use ethereum_types::{H160, H256, H64, U256};

mod extra_data;
mod header;
mod block;

pub use extra_data::ExtraData;
pub use header::Header;
pub use block::Block;

/// Validator identity: a 20-byte address derived from a secp256k1 public key.
pub type Address = H160;

/// Opaque byte payload (transactions, RPC bodies, wire message bodies).
pub type Bytes = Vec<u8>;

/// View number. Monotonic, starts at 0.
pub type View = u64;

/// Block height.
pub type Height = u64;

/// A 65-byte recoverable ECDSA signature, as produced by `e2c-crypto`.
pub type Signature = [u8; 65];

/// Keccak256 of the empty RLP list, `Keccak256(RLP([]))` — the fixed value
/// used for a block's uncle hash, since E2C blocks never have uncles.
pub fn empty_uncle_hash() -> H256 {
    keccak_hash::keccak(rlp::EMPTY_LIST_RLP)
}

/// The fixed mix-digest sentinel every E2C header must carry (spec §6).
pub fn mix_digest_sentinel() -> H256 {
    keccak_hash::keccak(b"E2C practical byzantine fault tolerance")
}

/// Replica status, gating which handlers run (spec §3). Stored by callers as
/// an `AtomicU8`; this enum is the typed view over that byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    SteadyState = 0,
    Wait = 1,
    FirstProposal = 2,
    SecondProposal = 3,
}

impl Status {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Status::SteadyState,
            1 => Status::Wait,
            2 => Status::FirstProposal,
            3 => Status::SecondProposal,
            _ => panic!("invalid status byte: {}", v),
        }
    }
}

/// `F = floor((n - 1) / 2)`, the maximum tolerated Byzantine validator count.
pub fn max_faulty(validator_count: usize) -> usize {
    (validator_count.saturating_sub(1)) / 2
}

/// `leader(view) = V[view mod N]`.
pub fn leader_of<'a>(validators: &'a [Address], view: View) -> &'a Address {
    assert!(!validators.is_empty(), "validator set must not be empty");
    &validators[(view as usize) % validators.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_faulty_matches_spec_examples() {
        assert_eq!(max_faulty(4), 1);
        assert_eq!(max_faulty(1), 0);
        assert_eq!(max_faulty(7), 3);
    }

    #[test]
    fn leader_wraps_around_validator_list() {
        let a: Address = H160::from_low_u64_be(1);
        let b: Address = H160::from_low_u64_be(2);
        let validators = vec![a, b];
        assert_eq!(leader_of(&validators, 0), &a);
        assert_eq!(leader_of(&validators, 1), &b);
        assert_eq!(leader_of(&validators, 2), &a);
    }
}
