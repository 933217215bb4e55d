//! Timed, out-of-order block queue (spec §4.6): a hybrid structure with
//! four maps plus an outstanding-request set.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use ethereum_types::H256;

use e2c_types::{Block, Height};

/// An accepted, pending-commit queue entry.
#[derive(Debug, Clone)]
pub struct Entry {
    pub block: Block,
    pub arrival_time: Instant,
}

/// The block queue owned exclusively by the core (spec §3 ownership rule).
/// Exposes a read-only "does this hash exist?" query for the backend's
/// header verifier (`contains`).
#[derive(Default)]
pub struct BlockQueue {
    queue: HashMap<H256, Entry>,
    by_number: HashMap<Height, H256>,
    unhandled: HashMap<H256, Block>,
    parent_index: HashMap<H256, HashSet<H256>>,
    request_set: HashSet<H256>,
    /// Arrival order, oldest first — the chain this replica has accepted
    /// since the last committed block (spec §3 invariant (i)).
    order: Vec<H256>,
}

impl BlockQueue {
    pub fn new() -> Self {
        BlockQueue::default()
    }

    pub fn contains(&self, hash: &H256) -> bool {
        self.queue.contains_key(hash)
    }

    pub fn get(&self, hash: &H256) -> Option<&Entry> {
        self.queue.get(hash)
    }

    /// Detects equivocation (spec §4.3 step 2): a different, already
    /// accepted block at the same height.
    pub fn conflicting_at_height(&self, number: Height, hash: &H256) -> Option<H256> {
        self.by_number.get(&number).filter(|h| *h != hash).copied()
    }

    /// `insert_handled(B)`: sets arrival time to now, advances the
    /// arrival-order chain (spec §4.6).
    pub fn insert_handled(&mut self, block: Block) {
        self.insert_handled_at(block, Instant::now())
    }

    /// Test/simulation seam: insert with an explicit arrival time so commit
    /// timing can be driven by a virtual clock.
    pub fn insert_handled_at(&mut self, block: Block, arrival_time: Instant) {
        let hash = block.hash();
        if self.queue.contains_key(&hash) {
            return;
        }
        self.by_number.insert(block.number(), hash);
        self.order.push(hash);
        self.queue.insert(
            hash,
            Entry {
                block,
                arrival_time,
            },
        );
    }

    /// The head of the arrival-order chain: the next block due to commit.
    pub fn head(&self) -> Option<&Entry> {
        self.order.first().and_then(|h| self.queue.get(h))
    }

    /// Removes and returns the head entry (spec §4.6 `pop_next`). Callers
    /// rearm the commit timer from the new head's arrival time.
    pub fn pop_next(&mut self) -> Option<Entry> {
        if self.order.is_empty() {
            return None;
        }
        let hash = self.order.remove(0);
        self.by_number.remove(&self.queue.get(&hash)?.block.number());
        self.queue.remove(&hash)
    }

    /// Removes a specific entry, e.g. on view-change supersession (spec §3
    /// invariant (iii): "removed exactly once").
    pub fn remove(&mut self, hash: &H256) -> Option<Entry> {
        if let Some(pos) = self.order.iter().position(|h| h == hash) {
            self.order.remove(pos);
        }
        let entry = self.queue.remove(hash)?;
        self.by_number.remove(&entry.block.number());
        Some(entry)
    }

    /// Stashes a block whose parent has not yet been accepted (spec §4.3
    /// step 3).
    pub fn stash_unhandled(&mut self, block: Block) {
        let parent = block.parent_hash();
        let hash = block.hash();
        self.parent_index.entry(parent).or_default().insert(hash);
        self.unhandled.insert(hash, block);
    }

    /// Drains descendants of `parent_hash` recursively (spec §4.6
    /// `get_child`), returning them in an order safe to feed back through
    /// `handle_block` (parents before children).
    pub fn drain_children(&mut self, parent_hash: H256) -> Vec<Block> {
        let mut out = Vec::new();
        let mut frontier = vec![parent_hash];
        while let Some(parent) = frontier.pop() {
            if let Some(children) = self.parent_index.remove(&parent) {
                for child_hash in children {
                    if let Some(block) = self.unhandled.remove(&child_hash) {
                        frontier.push(child_hash);
                        out.push(block);
                    }
                }
            }
        }
        out
    }

    pub fn is_requested(&self, hash: &H256) -> bool {
        self.request_set.contains(hash)
    }

    pub fn mark_requested(&mut self, hash: H256) {
        self.request_set.insert(hash);
    }

    pub fn clear_requested(&mut self, hash: &H256) {
        self.request_set.remove(hash);
    }

    /// Drains the whole queue on view change (spec §4.6 `clear`). The
    /// caller is responsible for re-seeding the queue with `B_new` per
    /// spec §4.5 stage 6.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.by_number.clear();
        self.unhandled.clear();
        self.parent_index.clear();
        self.request_set.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use e2c_types::ExtraData;
    use e2c_types::Header;
    use ethereum_types::H160;

    fn block_at(number: Height, parent_hash: H256) -> Block {
        let extra = ExtraData::new(vec![H160::from_low_u64_be(1)]);
        let header = Header::new(parent_hash, number, H256::zero(), H256::zero(), number, extra);
        Block::new(header, vec![])
    }

    #[test]
    fn pop_next_returns_entries_in_arrival_order() {
        let mut queue = BlockQueue::new();
        let b1 = block_at(1, H256::zero());
        let b2 = block_at(2, b1.hash());
        queue.insert_handled(b1.clone());
        queue.insert_handled(b2.clone());
        assert_eq!(queue.pop_next().unwrap().block.hash(), b1.hash());
        assert_eq!(queue.pop_next().unwrap().block.hash(), b2.hash());
        assert!(queue.pop_next().is_none());
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut queue = BlockQueue::new();
        let b1 = block_at(1, H256::zero());
        queue.insert_handled(b1.clone());
        queue.insert_handled(b1.clone());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn out_of_order_closure_drains_descendants_in_arrival_order() {
        let mut queue = BlockQueue::new();
        let b1 = block_at(1, H256::zero());
        let b2 = block_at(2, b1.hash());
        let b3 = block_at(3, b2.hash());
        queue.stash_unhandled(b2.clone());
        queue.stash_unhandled(b3.clone());
        queue.insert_handled(b1.clone());
        let mut drained = queue.drain_children(b1.hash());
        drained.sort_by_key(|b| b.number());
        assert_eq!(drained.iter().map(|b| b.number()).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn equivocation_is_detected_at_same_height() {
        let mut queue = BlockQueue::new();
        let b1 = block_at(5, H256::zero());
        queue.insert_handled(b1.clone());
        let mut b2 = block_at(5, H256::zero());
        b2.header.set_extra_data(b2.header.extra_data().with_seal([9u8; 65]));
        assert_eq!(queue.conflicting_at_height(5, &b2.hash()), Some(b1.hash()));
        assert_eq!(queue.conflicting_at_height(5, &b1.hash()), None);
    }
}
