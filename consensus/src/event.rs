//! The core's single typed inbound channel (spec §5, §9 "Event dispatch"):
//! `Event = Message | MinerBlock | Tick(kind)`. No backlog or replay buffer
//! is required since every event is self-contained.

use e2c_types::Block;

use crate::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    /// The block queue's head-timer: the head entry has sat for 2Δ.
    Commit,
    /// The leader-liveness timer: 4Δ since the last accepted proposal.
    Progress,
    /// The new leader's 4Δ timer armed on entering `Wait` (spec §4.5
    /// stage 5).
    ValidateCertificate,
    /// The Δ wait after broadcasting or receiving a `BlameCertificate`,
    /// before the replica actually enters the view-change stages (spec
    /// §4.4 "wait exactly Δ for all honest replicas to observe the
    /// certificate", §5 "two explicit sleep(Δ) points").
    ViewChangeEntry,
}

#[derive(Debug, Clone)]
pub enum Event {
    Message(Message),
    MinerBlock(Block),
    Tick(TickKind),
}
