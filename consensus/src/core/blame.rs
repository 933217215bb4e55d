//! Blame aggregation and the trigger into a view change (spec §4.4).

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::message::{self, Body, Message};

use super::Engine;

impl Engine {
    /// Broadcasts a `Blame` vote for the current view and records it in the
    /// local tally (spec §4.4: "a replica that blames the leader also
    /// counts its own vote").
    pub(super) fn raise_blame(&mut self) {
        if self.blame.contains_key(&self.self_address) {
            return;
        }
        let message = self.sign_message(Body::Blame);
        self.blame.insert(self.self_address, message.signature);
        self.backend.broadcast(message);
        self.check_blame_quorum();
    }

    pub(super) fn handle_blame(&mut self, message: Message) -> Result<()> {
        if self.status != e2c_types::Status::SteadyState {
            return Ok(());
        }
        self.blame.insert(message.sender, message.signature);
        self.check_blame_quorum();
        Ok(())
    }

    /// Once F+1 blame votes (including possibly our own) are collected,
    /// assemble and broadcast the certificate and begin the view change
    /// (spec §9 Open Question: blame threshold fixed at F+1).
    fn check_blame_quorum(&mut self) {
        // Fire exactly once: at any later call the tally has already passed
        // quorum, and re-entering here would re-broadcast a certificate and
        // bump `view` a second time for the same view change.
        if self.blame.len() != self.validators.quorum() {
            return;
        }
        let entries: Vec<_> = self.blame.iter().map(|(addr, sig)| (*addr, *sig)).collect();
        debug!("blame quorum reached for view {}, advancing", self.view);
        self.broadcast(Body::BlameCertificate(entries));
        let next_view = self.view + 1;
        self.set_view(next_view);
        // Spec §4.4/§5: wait Δ for the rest of the network to observe the
        // certificate before actually entering the view-change stages.
        self.view_change_entry_timer.arm(self.params.delta);
    }

    /// A `BlameCertificate` received from another replica: if it verifies,
    /// adopt the view change even without collecting F+1 `Blame` votes
    /// locally (spec §4.4 "Blame-certificate verification").
    pub(super) fn handle_blame_certificate(&mut self, message: Message) -> Result<()> {
        let entries = match message.body {
            Body::BlameCertificate(ref entries) => entries.clone(),
            _ => unreachable!("dispatch routes by code"),
        };
        message::verify_blame_certificate(&entries, message.view, &self.validators)?;
        if message.view < self.view {
            return Err(Error::WrongView {
                msg_view: message.view,
                current_view: self.view,
            });
        }
        let next_view = message.view + 1;
        self.set_view(next_view);
        // Same Δ wait as the locally-triggered path above (spec §4.4
        // "after receiving one").
        self.view_change_entry_timer.arm(self.params.delta);
        Ok(())
    }

    /// Verifies leader-equivocation proof and, if genuine, raises blame
    /// without waiting for the progress timer (spec §4.3 step 2).
    pub(super) fn handle_equiv_blame(&mut self, message: Message) -> Result<()> {
        let (block1, block2) = match message.body {
            Body::EquivBlame {
                ref block1,
                ref block2,
            } => (block1.clone(), block2.clone()),
            _ => unreachable!("dispatch routes by code"),
        };
        if block1.number() != block2.number() || block1.hash() == block2.hash() {
            return Err(Error::InvalidBlock("equivocation proof blocks do not conflict".into()));
        }
        let leader = self.leader();
        for block in [&block1, &block2] {
            let signer = block.header.recover_signer(|sig, digest| e2c_crypto::recover(sig, digest).ok());
            if signer != Some(leader) {
                warn!("equivocation proof signer mismatch, ignoring");
                return Err(Error::InvalidSignature);
            }
        }
        self.raise_blame();
        Ok(())
    }
}
