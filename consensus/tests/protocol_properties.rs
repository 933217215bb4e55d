//! Property-based tests for the invariants listed in spec §8: out-of-order
//! closure and certificate soundness. Colocated in `tests/` (not a
//! `#[cfg(test)]` module) because they exercise the crate's public API the
//! way an external caller would, per the teacher's own split between
//! in-module unit tests and crate-level `tests/` integration checks.

use std::collections::HashSet;

use ethereum_types::H160;

use e2c_consensus::message::{self, Body, Message, SignatureEntry};
use e2c_consensus::queue::BlockQueue;
use e2c_consensus::validator_set::ValidatorList;
use e2c_crypto::KeyPair;
use e2c_types::{Address, Block, ExtraData, Header, H256};
use quickcheck_macros::quickcheck;

fn chain_of(len: usize) -> Vec<Block> {
    let extra = ExtraData::new(vec![H160::from_low_u64_be(1)]);
    let mut blocks = Vec::with_capacity(len);
    let mut parent = H256::zero();
    for number in 1..=len as u64 {
        let header = Header::new(parent, number, H256::zero(), H256::zero(), number, extra.clone());
        let block = Block::new(header, Vec::new());
        parent = block.hash();
        blocks.push(block);
    }
    blocks
}

/// A tiny xorshift PRNG seeded deterministically, used only to produce a
/// reproducible permutation of arrival order — not a source of entropy for
/// anything cryptographic.
struct Xorshift(u64);

impl Xorshift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

fn shuffled(mut items: Vec<Block>, seed: u64) -> Vec<Block> {
    let mut rng = Xorshift(seed.wrapping_mul(2654435761).wrapping_add(1));
    // Fisher-Yates.
    for i in (1..items.len()).rev() {
        let j = (rng.next() as usize) % (i + 1);
        items.swap(i, j);
    }
    items
}

/// Feeds `block` through the same accept-or-stash decision the core's
/// `accept_block`/`handle_new_block_message` pair makes (spec §4.3 step 3,
/// §4.6 `get_child`), recursing into any children this arrival unblocks.
fn process(queue: &mut BlockQueue, genesis_hash: H256, block: Block) {
    let parent = block.parent_hash();
    if parent == genesis_hash || queue.contains(&parent) {
        let hash = block.hash();
        queue.insert_handled(block);
        for child in queue.drain_children(hash) {
            process(queue, genesis_hash, child);
        }
    } else {
        queue.stash_unhandled(block);
    }
}

/// Spec §8 "Out-of-order closure": for any permutation of arrivals of a
/// valid chain B0..Bk, the final accepted set equals {B0..Bk}, regardless of
/// delivery order.
#[quickcheck]
fn out_of_order_closure(seed: u64, chain_len: u8) -> bool {
    let len = (chain_len % 12) as usize + 1;
    let genesis_hash = H256::zero();
    let chain = chain_of(len);
    let expected: HashSet<H256> = chain.iter().map(|b| b.hash()).collect();

    let mut queue = BlockQueue::new();
    for block in shuffled(chain, seed) {
        process(&mut queue, genesis_hash, block);
    }

    expected.iter().all(|hash| queue.contains(hash)) && queue.len() == expected.len()
}

/// Spec §8 "Dedup idempotence" restated over the block queue: delivering
/// every block in a chain twice (in two independent, differently shuffled
/// passes) yields the same accepted set as delivering it once.
#[quickcheck]
fn redelivery_is_idempotent(seed: u64, chain_len: u8) -> bool {
    let len = (chain_len % 8) as usize + 1;
    let genesis_hash = H256::zero();
    let chain = chain_of(len);

    let mut queue = BlockQueue::new();
    for block in shuffled(chain.clone(), seed) {
        process(&mut queue, genesis_hash, block);
    }
    let once = queue.len();
    for block in shuffled(chain, seed.wrapping_add(1)) {
        process(&mut queue, genesis_hash, block);
    }
    queue.len() == once
}

fn blame_entry(keypair: &KeyPair, view: u64) -> SignatureEntry {
    let message = Message::new(Body::Blame, view, keypair.address());
    let digest = message.sig_hash();
    (keypair.address(), keypair.sign(digest).unwrap())
}

/// Spec §8 "Certificate soundness": no accepted `BlameCertificate` has fewer
/// than F+1 distinct valid signatures at the certificate's view.
#[quickcheck]
fn blame_certificate_soundness(validator_count: u8, subset_size: u8, view: u64) -> bool {
    let n = (validator_count % 6) as usize + 1;
    let keypairs: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
    let addresses: Vec<Address> = keypairs.iter().map(|k| k.address()).collect();
    let validators = ValidatorList::new(addresses);
    let quorum = validators.quorum();

    let s = (subset_size as usize % n) + 1;
    let entries: Vec<SignatureEntry> = keypairs.iter().take(s).map(|k| blame_entry(k, view)).collect();

    let result = message::verify_blame_certificate(&entries, view, &validators);
    if s >= quorum {
        result.is_ok()
    } else {
        result.is_err()
    }
}

/// A certificate with a duplicate signer must never verify, even if it
/// otherwise meets the quorum count (spec §4.4 "every signature ... from a
/// distinct validator").
#[quickcheck]
fn blame_certificate_rejects_duplicate_signer(validator_count: u8, view: u64) -> bool {
    let n = (validator_count % 6) as usize + 3; // guarantee quorum >= 2
    let keypairs: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
    let addresses: Vec<Address> = keypairs.iter().map(|k| k.address()).collect();
    let validators = ValidatorList::new(addresses);
    let quorum = validators.quorum();

    let mut entries: Vec<SignatureEntry> = keypairs.iter().take(quorum).map(|k| blame_entry(k, view)).collect();
    // Duplicate the first signer's entry in place of a distinct one.
    let duplicate = entries[0];
    let last = entries.len() - 1;
    entries[last] = duplicate;

    message::verify_blame_certificate(&entries, view, &validators).is_err()
}

/// Leader rotation is a pure function of the view modulo the validator
/// count, for any view and any non-empty validator set (spec §3).
#[quickcheck]
fn leader_rotation_matches_modulo(validator_count: u8, view: u64) -> bool {
    let n = (validator_count % 9) as usize + 1;
    let addresses: Vec<Address> = (0..n as u64).map(H160::from_low_u64_be).collect();
    let validators = ValidatorList::new(addresses.clone());
    validators.leader(view) == addresses[(view as usize) % n]
}
