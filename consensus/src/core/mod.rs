//! The core event loop: dispatches by message code into steady-state or
//! view-change handlers (spec §2 "Data flow", §5 "Scheduling model").

mod blame;
mod requests;
mod steady_state;
mod view_change;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ethereum_types::H256;
use log::{debug, trace};
use tokio::sync::mpsc;

use e2c_types::{Address, Block, Height, Signature, Status, View};

use crate::backend::{Backend, EventSink};
use crate::chain::{ChainReader, ChainWriter};
use crate::error::{Error, Result};
use crate::event::{Event, TickKind};
use crate::message::{BlockCertificate, Body, Message};
use crate::queue::BlockQueue;
use crate::state::SharedViewStatus;
use crate::timer::DeadlineTimer;
use crate::validator_set::ValidatorList;

/// Tuning parameters (spec §6 "Configuration").
#[derive(Clone, Copy, Debug)]
pub struct Params {
    /// Δ: the assumed upper bound on message delivery delay.
    pub delta: Duration,
}

impl Params {
    pub fn new(delta: Duration) -> Self {
        Params {
            delta,
        }
    }
}

/// The replica's consensus core. Owns all protocol state exclusively; only
/// ever mutated from [`Engine::run`]'s loop (spec §3 "Ownership", §5).
pub struct Engine {
    backend: Arc<dyn Backend>,
    writer: Arc<dyn ChainWriter>,
    reader: Arc<dyn ChainReader>,
    shared: SharedViewStatus,
    params: Params,

    self_address: Address,
    validators: ValidatorList,

    view: View,
    status: Status,
    lock: Option<Block>,
    committed: Option<Block>,
    highest_certificate: Option<BlockCertificate>,

    blame: HashMap<Address, Signature>,
    validates: HashMap<Address, Signature>,
    votes: HashMap<H256, HashMap<Address, Signature>>,
    /// Candidate blocks backing the entries in `votes`, keyed by the same
    /// hash, so a quorum of signatures can be turned into a
    /// [`BlockCertificate`] (spec §4.5 stage 4).
    vote_blocks: HashMap<H256, Block>,
    /// The certificate the new leader will extend once the miner yields
    /// `B_new` (spec §4.5 stage 5 to stage 6's handoff).
    pending_certificate: Option<BlockCertificate>,

    queue: BlockQueue,

    progress_timer: DeadlineTimer,
    commit_timer: DeadlineTimer,
    validate_timer: DeadlineTimer,
    view_change_entry_timer: DeadlineTimer,

    event_tx: mpsc::UnboundedSender<Event>,
    event_rx: mpsc::UnboundedReceiver<Event>,
}

impl Engine {
    /// `shared` must be the same [`SharedViewStatus`] handed to the
    /// `Backend` implementation, so both sides read/write the same atomic
    /// cells (spec §5, §9).
    pub fn new(
        backend: Arc<dyn Backend>,
        writer: Arc<dyn ChainWriter>,
        reader: Arc<dyn ChainReader>,
        validators: ValidatorList,
        shared: SharedViewStatus,
        params: Params,
        genesis: Block,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let self_address = backend.self_address();
        let progress_timer = DeadlineTimer::new(TickKind::Progress, event_tx.clone());
        let commit_timer = DeadlineTimer::new(TickKind::Commit, event_tx.clone());
        let validate_timer = DeadlineTimer::new(TickKind::ValidateCertificate, event_tx.clone());
        let view_change_entry_timer = DeadlineTimer::new(TickKind::ViewChangeEntry, event_tx.clone());

        let mut engine = Engine {
            backend,
            writer,
            reader,
            shared,
            params,
            self_address,
            validators,
            view: 0,
            status: Status::SteadyState,
            lock: Some(genesis.clone()),
            committed: Some(genesis),
            highest_certificate: None,
            blame: HashMap::new(),
            validates: HashMap::new(),
            votes: HashMap::new(),
            vote_blocks: HashMap::new(),
            pending_certificate: None,
            queue: BlockQueue::new(),
            progress_timer,
            commit_timer,
            validate_timer,
            view_change_entry_timer,
            event_tx,
            event_rx,
        };
        engine.progress_timer.arm(engine.params.delta * 4);
        engine
    }

    /// A sink the backend can hand decoded wire messages and the miner
    /// forwarder task can hand produced blocks through.
    pub fn event_sink(&self) -> EventSink {
        EventSink::new(self.event_tx.clone())
    }

    pub fn event_sender(&self) -> mpsc::UnboundedSender<Event> {
        self.event_tx.clone()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn committed_height(&self) -> Option<Height> {
        self.committed.as_ref().map(|b| b.number())
    }

    pub fn lock_height(&self) -> Option<Height> {
        self.lock.as_ref().map(|b| b.number())
    }

    pub fn leader(&self) -> Address {
        self.validators.leader(self.view)
    }

    pub fn is_leader(&self) -> bool {
        self.leader() == self.self_address
    }

    /// Runs the event loop until the channel closes. Never returns in a
    /// live process; closes only when every sender (including the
    /// engine's own clone used by timers/miner forwarder) is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.event_rx.recv().await {
            self.handle_event(event).await;
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Message(message) => {
                if let Err(err) = self.dispatch_message(message) {
                    trace!("dropping message: {}", err);
                }
            }
            Event::MinerBlock(block) => {
                if let Err(err) = self.handle_miner_block(block) {
                    debug!("miner block not used: {}", err);
                }
            }
            Event::Tick(TickKind::Commit) => self.handle_commit_tick(),
            Event::Tick(TickKind::Progress) => self.handle_progress_tick(),
            Event::Tick(TickKind::ValidateCertificate) => self.handle_validate_certificate_tick(),
            Event::Tick(TickKind::ViewChangeEntry) => self.enter_view_change(),
        }
    }

    fn dispatch_message(&mut self, message: Message) -> Result<()> {
        match &message.body {
            Body::NewBlock(_) => self.handle_new_block_message(message),
            Body::Blame => self.handle_blame(message),
            Body::EquivBlame {
                ..
            } => self.handle_equiv_blame(message),
            Body::BlameCertificate(_) => self.handle_blame_certificate(message),
            Body::Vote(_) => self.handle_vote(message),
            Body::BlockCertificate(_) => self.handle_block_certificate(message),
            Body::FirstProposal {
                ..
            } => self.handle_first_proposal(message),
            Body::Validate => self.handle_validate(message),
            Body::SecondProposal {
                ..
            } => self.handle_second_proposal(message),
            Body::RequestBlock(_) => self.handle_request_block(message),
            Body::Respond(_) => self.handle_respond(message),
        }
    }

    fn handle_miner_block(&mut self, block: Block) -> Result<()> {
        if !self.is_leader() {
            return Err(Error::NotLeader(self.self_address));
        }
        match self.status {
            Status::SteadyState => self.propose_block(block),
            Status::FirstProposal => self.send_first_proposal(block),
            Status::SecondProposal => self.send_second_proposal(block),
            Status::Wait => Err(Error::WrongStatus(Status::Wait)),
        }
    }

    fn sign(&self, digest: H256) -> Signature {
        self.backend.sign(digest)
    }

    fn sign_message(&self, body: Body) -> Message {
        Message::new(body, self.view, self.self_address).sign(|digest| self.sign(digest))
    }

    fn broadcast(&self, body: Body) {
        self.backend.broadcast(self.sign_message(body));
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
        self.backend.set_status(status);
    }

    fn set_view(&mut self, view: View) {
        self.view = view;
        self.shared.set_view(view);
        self.backend.change_view(view);
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
