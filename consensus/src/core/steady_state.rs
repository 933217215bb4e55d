//! Steady-state pipeline (spec §4.3): leader proposal, follower acceptance,
//! relay, the commit timer, and the progress (leader-liveness) timer.

use ethereum_types::H256;
use log::{debug, trace, warn};

use e2c_types::{Block, ExtraData, Status};

use super::Engine;
use crate::error::{Error, Result};
use crate::message::{Body, Message};

impl Engine {
    /// Leader path: seal a block the local miner produced atop the current
    /// tip and broadcast it (spec §4.3 "Leader path").
    pub(super) fn propose_block(&mut self, block: Block) -> Result<()> {
        let parent = self.lock.clone().expect("genesis seeds `lock`");
        if !block.is_child_of(&parent) {
            return Err(Error::InvalidBlock(format!(
                "miner block {} does not extend the current tip {}",
                block.number(),
                parent.number()
            )));
        }
        let sealed = self.seal_block(block);
        self.accept_block(sealed.clone())?;
        self.broadcast(Body::NewBlock(sealed));
        Ok(())
    }

    /// Signs `block`'s bare hash and installs the validator list and seal in
    /// its `extra_data` (spec §6 "seal").
    pub(super) fn seal_block(&self, mut block: Block) -> Block {
        let extra = ExtraData::new(self.validators.as_slice().to_vec());
        block.header.set_extra_data(extra);
        let bare_hash = block.header.bare_hash();
        let seal = self.sign(bare_hash);
        block.header.set_extra_data(block.header.extra_data().with_seal(seal));
        block
    }

    /// Follower path (spec §4.3 "Follower path"): verify the sender is the
    /// current leader, detect equivocation, close over out-of-order
    /// children, relay.
    pub(super) fn handle_new_block_message(&mut self, message: Message) -> Result<()> {
        if self.status != Status::SteadyState {
            return Err(Error::WrongStatus(self.status));
        }
        if message.sender != self.leader() {
            return Err(Error::NotLeader(message.sender));
        }
        let block = match message.body {
            Body::NewBlock(ref b) => b.clone(),
            _ => unreachable!("dispatch routes by code"),
        };

        if let Some(conflict) = self.queue.conflicting_at_height(block.number(), &block.hash()) {
            self.report_equivocation(conflict, block.clone());
            return Err(Error::Equivocation(block.number()));
        }

        if !self.has_accepted(&block.parent_hash()) {
            self.queue.stash_unhandled(block.clone());
            self.request_missing_block(block.parent_hash());
            return Ok(());
        }

        self.accept_block(block)?;
        // Relay the original signed message so it propagates across
        // partial network partitions (spec §4.3 "Relay").
        self.backend.broadcast(message);
        Ok(())
    }

    /// Accepts `block` into the arrival-order queue, advances the tip, arms
    /// the progress and (if it is now the queue head) commit timers, and
    /// recursively closes over any stashed children (spec §4.6).
    pub(super) fn accept_block(&mut self, block: Block) -> Result<()> {
        let was_empty = self.queue.is_empty();
        let hash = block.hash();
        self.queue.insert_handled(block.clone());
        self.queue.clear_requested(&hash);
        self.lock = Some(block);
        self.progress_timer.arm(self.params.delta * 4);
        if was_empty {
            self.commit_timer.arm(self.params.delta * 2);
        }

        for child in self.queue.drain_children(hash) {
            if let Err(err) = self.accept_block(child) {
                trace!("dropping stashed child: {}", err);
            }
        }
        Ok(())
    }

    pub(super) fn has_accepted(&self, hash: &H256) -> bool {
        self.queue.contains(hash) || self.committed.as_ref().map(|b| b.hash() == *hash).unwrap_or(false)
    }

    /// Broadcasts proof of a double-signed leader and raises this replica's
    /// own blame vote; other replicas independently verify the proof and
    /// raise their own (spec §4.3 step 2, §4.4).
    fn report_equivocation(&mut self, existing: H256, new_block: Block) {
        let Some(existing_block) = self.queue.get(&existing).map(|entry| entry.block.clone()) else {
            return;
        };
        warn!("equivocating leader detected at height {}", existing_block.number());
        self.broadcast(Body::EquivBlame {
            block1: existing_block,
            block2: new_block,
        });
        self.raise_blame();
    }

    /// Commit timer fire (spec §4.6): the queue head has sat for 2Δ,
    /// durably commit it and rearm from the new head.
    pub(super) fn handle_commit_tick(&mut self) {
        let Some(entry) = self.queue.pop_next() else {
            return;
        };
        match self.writer.commit(&entry.block) {
            Ok(()) => {
                debug!("committed block {}", entry.block.number());
                self.committed = Some(entry.block);
            }
            Err(err) => warn!("chain writer rejected commit: {}", err),
        }
        self.maybe_arm_commit_timer();
    }

    /// Arms the commit timer from the current queue head's arrival time, or
    /// disarms it if the queue is now empty.
    pub(super) fn maybe_arm_commit_timer(&mut self) {
        match self.queue.head() {
            Some(entry) => {
                let deadline = self.params.delta * 2;
                let elapsed = self.now().saturating_duration_since(entry.arrival_time);
                self.commit_timer.arm(deadline.saturating_sub(elapsed));
            }
            None => self.commit_timer.disarm(),
        }
    }

    /// Progress timer fire (spec §4.3 "Progress timer"): 4Δ since the last
    /// accepted proposal with no new one arriving. Only non-leaders blame;
    /// the leader's own timer is only meaningful for its own liveness after
    /// a view change, not self-accusation.
    pub(super) fn handle_progress_tick(&mut self) {
        if self.is_leader() {
            return;
        }
        debug!("progress timer fired for view {}, raising blame", self.view);
        self.raise_blame();
    }

    pub(super) fn request_missing_block(&mut self, hash: H256) {
        if self.queue.is_requested(&hash) {
            return;
        }
        self.queue.mark_requested(hash);
        let to = self.leader();
        let message = self.sign_message(Body::RequestBlock(hash));
        self.backend.send(message, to);
    }
}
