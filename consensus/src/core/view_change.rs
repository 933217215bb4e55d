//! View-change protocol (spec §4.5): vote collection, block-certificate
//! construction, the two-phase FirstProposal/SecondProposal handshake that
//! hands leadership to the new leader.

use log::{debug, warn};

use e2c_types::{Block, Status};

use super::Engine;
use crate::error::{Error, Result};
use crate::message::{self, BlockCertificate, Body, Message};

impl Engine {
    /// Stage 1-2 (spec §4.5): reset view-change state, widen the liveness
    /// window, and vote for the block this replica wants carried forward.
    pub(super) fn enter_view_change(&mut self) {
        self.blame.clear();
        self.validates.clear();
        self.votes.clear();
        self.vote_blocks.clear();
        self.highest_certificate = None;
        self.pending_certificate = None;
        self.set_status(Status::Wait);

        self.commit_timer.disarm();
        self.progress_timer.arm(self.params.delta * 8);

        let candidate = self.lock.clone().expect("genesis seeds `lock`");
        let candidate_hash = candidate.hash();
        self.vote_blocks.insert(candidate_hash, candidate.clone());
        let message = self.sign_message(Body::Vote(candidate));
        self.votes.entry(candidate_hash).or_default().insert(self.self_address, message.signature);
        self.backend.broadcast(message);

        if self.is_leader() {
            debug!("entering view {} as leader, arming validate-certificate timer", self.view);
            self.validate_timer.arm(self.params.delta * 4);
        }
    }

    /// Stage 3-4: tally `Vote`s by the block they name; once a quorum backs
    /// one block, assemble a `BlockCertificate` and keep the
    /// highest-numbered one seen so far.
    pub(super) fn handle_vote(&mut self, message: Message) -> Result<()> {
        if self.status != Status::Wait {
            return Ok(());
        }
        let block = match message.body {
            Body::Vote(ref b) => b.clone(),
            _ => unreachable!("dispatch routes by code"),
        };
        let committed_height = self.committed.as_ref().map(|b| b.number()).unwrap_or(0);
        let lock_height = self.lock.as_ref().map(|b| b.number()).unwrap_or(0);
        if block.number() < committed_height || block.number() > lock_height {
            return Ok(());
        }
        let hash = block.hash();
        self.vote_blocks.entry(hash).or_insert(block);
        self.votes.entry(hash).or_default().insert(message.sender, message.signature);

        let Some(signers) = self.votes.get(&hash) else {
            return Ok(());
        };
        if signers.len() < self.validators.quorum() {
            return Ok(());
        }
        let votes: Vec<_> = signers.iter().map(|(addr, sig)| (*addr, *sig)).collect();
        let candidate = self.vote_blocks.get(&hash).expect("just inserted").clone();
        let certificate = BlockCertificate {
            block: candidate,
            votes,
        };
        certificate.verify(self.view, &self.validators)?;

        let supersedes = match &self.highest_certificate {
            Some(current) => certificate.block.number() > current.block.number(),
            None => true,
        };
        if supersedes {
            debug!("new highest certificate at height {}", certificate.block.number());
            // Gossip the certificate on: a replica that only saw a minority
            // of the votes (e.g. a lagging rejoiner) can adopt it without
            // collecting its own quorum (spec §4.5 stage 4).
            self.broadcast(Body::BlockCertificate(certificate.clone()));
            self.highest_certificate = Some(certificate);
        }
        Ok(())
    }

    /// A `BlockCertificate` gossiped directly by a peer that assembled it
    /// first (spec §4.5 stage 4 "Gossip").
    pub(super) fn handle_block_certificate(&mut self, message: Message) -> Result<()> {
        if self.status != Status::Wait {
            return Ok(());
        }
        let certificate = match message.body {
            Body::BlockCertificate(ref cert) => cert.clone(),
            _ => unreachable!("dispatch routes by code"),
        };
        certificate.verify(self.view, &self.validators)?;
        let supersedes = match &self.highest_certificate {
            Some(current) => certificate.block.number() > current.block.number(),
            None => true,
        };
        if supersedes {
            self.vote_blocks.insert(certificate.block.hash(), certificate.block.clone());
            self.highest_certificate = Some(certificate);
        }
        Ok(())
    }

    /// Stage 5: the new-leader 4Δ timer fires. Commit up to the highest
    /// certificate seen and signal the miner for `B_new` by flipping to
    /// `FirstProposal`.
    pub(super) fn handle_validate_certificate_tick(&mut self) {
        if !self.is_leader() || self.status != Status::Wait {
            return;
        }
        let Some(certificate) = self.highest_certificate.clone() else {
            warn!("no certificate reached quorum before the new-leader timer, view {} stalls", self.view);
            return;
        };
        if let Err(err) = self.writer.commit(&certificate.block) {
            warn!("chain writer rejected certified block: {}", err);
        } else {
            self.committed = Some(certificate.block.clone());
        }
        self.lock = Some(certificate.block.clone());
        self.pending_certificate = Some(certificate);
        self.set_status(Status::FirstProposal);
    }

    /// Stage 5 continuation: the miner yields `B_new`. Broadcast it with
    /// the certificate attached and self-record our own `Validate`.
    pub(super) fn send_first_proposal(&mut self, block: Block) -> Result<()> {
        let certificate = self.pending_certificate.take().ok_or(Error::WrongStatus(self.status))?;
        if !block.is_child_of(&certificate.block) {
            self.pending_certificate = Some(certificate);
            return Err(Error::InvalidBlock("B_new does not extend the certified block".into()));
        }
        let sealed = self.seal_block(block);
        self.queue.insert_handled(sealed.clone());
        self.lock = Some(sealed.clone());

        self.broadcast(Body::FirstProposal {
            certificate,
            block: sealed,
        });

        let own_validate = self.sign_message(Body::Validate);
        self.validates.insert(self.self_address, own_validate.signature);
        self.check_validate_quorum();
        Ok(())
    }

    /// Stage 6 (follower): accept the new leader's `FirstProposal`, rebuild
    /// the queue from the certified block forward, and reply `Validate`.
    pub(super) fn handle_first_proposal(&mut self, message: Message) -> Result<()> {
        if self.status != Status::Wait {
            return Ok(());
        }
        if message.sender != self.leader() {
            return Err(Error::NotLeader(message.sender));
        }
        let (certificate, block) = match message.body {
            Body::FirstProposal {
                ref certificate,
                ref block,
            } => (certificate.clone(), block.clone()),
            _ => unreachable!("dispatch routes by code"),
        };
        certificate.verify(self.view, &self.validators)?;
        if let Some(current) = &self.highest_certificate {
            if certificate.block.number() < current.block.number() {
                self.raise_blame();
                return Err(Error::InvalidBlock("certificate is lower than the locally held one".into()));
            }
        }
        if !block.is_child_of(&certificate.block) {
            self.raise_blame();
            return Err(Error::InvalidBlock("B_new does not extend the certified block".into()));
        }

        self.queue.clear();
        self.queue.insert_handled(certificate.block.clone());
        self.queue.insert_handled(block.clone());
        if let Err(err) = self.writer.commit(&certificate.block) {
            warn!("chain writer rejected certified block: {}", err);
        } else {
            self.committed = Some(certificate.block);
        }
        self.lock = Some(block);
        self.progress_timer.arm(self.params.delta * 8);

        self.broadcast(Body::Validate);
        Ok(())
    }

    /// Stage 7 (leader): tally `Validate` responses; once a quorum is in,
    /// flip to `SecondProposal` to signal the miner for `B_next`.
    pub(super) fn handle_validate(&mut self, message: Message) -> Result<()> {
        if !self.is_leader() || self.status != Status::FirstProposal {
            return Ok(());
        }
        self.validates.insert(message.sender, message.signature);
        self.check_validate_quorum();
        Ok(())
    }

    fn check_validate_quorum(&mut self) {
        if self.status == Status::FirstProposal && self.validates.len() >= self.validators.quorum() {
            debug!("validate quorum reached for view {}, signalling miner for B_next", self.view);
            self.set_status(Status::SecondProposal);
        }
    }

    /// Stage 8 (leader): the miner yields `B_next`. Broadcast it with the
    /// collected `Validate`s attached and return to steady state.
    pub(super) fn send_second_proposal(&mut self, block: Block) -> Result<()> {
        let tip = self.lock.clone().expect("stage 5/6 sets `lock` to B_new");
        if !block.is_child_of(&tip) {
            return Err(Error::InvalidBlock("B_next does not extend B_new".into()));
        }
        let sealed = self.seal_block(block);
        let validates: Vec<_> = self.validates.iter().map(|(addr, sig)| (*addr, *sig)).collect();
        self.broadcast(Body::SecondProposal {
            validates,
            block: sealed.clone(),
        });
        self.accept_second_proposal(sealed)
    }

    /// Stage 9 (follower): accept `SecondProposal` and return to steady
    /// state.
    pub(super) fn handle_second_proposal(&mut self, message: Message) -> Result<()> {
        if self.status != Status::Wait {
            return Ok(());
        }
        if message.sender != self.leader() {
            return Err(Error::NotLeader(message.sender));
        }
        let (validates, block) = match message.body {
            Body::SecondProposal {
                ref validates,
                ref block,
            } => (validates.clone(), block.clone()),
            _ => unreachable!("dispatch routes by code"),
        };
        message::verify_validate_entries(&validates, self.view, &self.validators)?;
        let tip = self.lock.clone().expect("stage 6 sets `lock` to B_new");
        if !block.is_child_of(&tip) {
            self.raise_blame();
            return Err(Error::InvalidBlock("B_next does not extend B_new".into()));
        }
        self.accept_second_proposal(block)
    }

    /// Shared tail of stage 8/9: append `block`, arm the usual steady-state
    /// timers, and clear all view-change bookkeeping.
    fn accept_second_proposal(&mut self, block: Block) -> Result<()> {
        let was_empty = self.queue.is_empty();
        self.queue.insert_handled(block.clone());
        self.lock = Some(block);
        self.progress_timer.arm(self.params.delta * 4);
        if was_empty {
            self.maybe_arm_commit_timer();
        }

        self.blame.clear();
        self.validates.clear();
        self.votes.clear();
        self.vote_blocks.clear();
        self.highest_certificate = None;
        self.pending_certificate = None;
        self.set_status(Status::SteadyState);
        Ok(())
    }
}
