//! The transport-facing half of a replica: signs and routes consensus
//! messages, verifies headers against the gossip path, and de-duplicates
//! rebroadcasts. The raw peer-to-peer wire protocol itself (connection
//! setup, peer discovery, framing over TCP) is out of scope and modeled
//! here only as the [`PeerTransport`] seam an embedder implements.

mod header_verify;

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use ethereum_types::H256;
use log::trace;
use lru::LruCache;
use parking_lot::Mutex;

use e2c_consensus::backend::Backend;
use e2c_consensus::message::{Message, WireFrame};
use e2c_consensus::state::SharedViewStatus;
use e2c_consensus::validator_set::ValidatorList;
use e2c_crypto::KeyPair;
use e2c_types::{Address, Signature, Status, View};

pub use header_verify::{verify_header, HeaderVerifyError};

/// The out-of-scope raw gossip layer: delivers an already-encoded frame to
/// one peer, or to every peer but `except`.
pub trait PeerTransport: Send + Sync {
    fn send_to(&self, peer: Address, frame: WireFrame);
    fn broadcast_except(&self, except: Address, frame: WireFrame);
}

const KNOWN_CACHE_CAPACITY: usize = 1024;
const PER_PEER_CACHE_CAPACITY: usize = 40;

/// The `Backend` implementation an `e2c-node` binary wires up: signs with
/// the local validator key, de-duplicates broadcasts via `known` and
/// `recent[peer]` LRU caches (spec §4.1 "adaptive LRU"; here a fixed-size
/// LRU substitutes for full ARC, noted in DESIGN.md), and forwards to the
/// embedder's [`PeerTransport`].
pub struct GatewayBackend<T: PeerTransport> {
    keypair: KeyPair,
    validators: ValidatorList,
    shared: SharedViewStatus,
    transport: Arc<T>,
    known: Mutex<LruCache<H256, ()>>,
    recent: Mutex<HashMap<Address, LruCache<H256, ()>>>,
}

impl<T: PeerTransport> GatewayBackend<T> {
    pub fn new(keypair: KeyPair, validators: ValidatorList, shared: SharedViewStatus, transport: Arc<T>) -> Self {
        GatewayBackend {
            keypair,
            validators,
            shared,
            transport,
            known: Mutex::new(LruCache::new(NonZeroUsize::new(KNOWN_CACHE_CAPACITY).unwrap())),
            recent: Mutex::new(HashMap::new()),
        }
    }

    /// Called by the embedder when a frame arrives from `from`: de-dupes
    /// against `recent[from]`, decodes and authenticates it, and (on
    /// success) hands it to `deliver`.
    pub fn on_frame_received(
        &self,
        from: Address,
        frame: WireFrame,
        deliver: impl FnOnce(Message),
    ) -> Result<(), e2c_consensus::error::Error> {
        let digest = frame_digest(&frame);
        {
            let mut recent = self.recent.lock();
            let cache = recent
                .entry(from)
                .or_insert_with(|| LruCache::new(NonZeroUsize::new(PER_PEER_CACHE_CAPACITY).unwrap()));
            if cache.put(digest, ()).is_some() {
                trace!("dropping duplicate frame from {:?}", from);
                return Ok(());
            }
        }
        let current_view = Some(self.shared.view());
        let message = Message::decode_and_verify(&frame, &self.validators, current_view)?;
        deliver(message);
        Ok(())
    }

    fn remember(&self, frame: &WireFrame) -> bool {
        let digest = frame_digest(frame);
        self.known.lock().put(digest, ()).is_none()
    }
}

fn frame_digest(frame: &WireFrame) -> H256 {
    e2c_crypto::keccak256(rlp::encode(frame))
}

impl<T: PeerTransport> Backend for GatewayBackend<T> {
    fn self_address(&self) -> Address {
        self.keypair.address()
    }

    fn validators(&self) -> &ValidatorList {
        &self.validators
    }

    fn sign(&self, digest: H256) -> Signature {
        self.keypair.sign(digest).expect("signing with a local validator key never fails")
    }

    fn broadcast(&self, message: Message) {
        let frame = message.to_frame();
        if !self.remember(&frame) {
            return;
        }
        self.transport.broadcast_except(self.self_address(), frame);
    }

    fn send(&self, message: Message, to: Address) {
        let frame = message.to_frame();
        self.remember(&frame);
        self.transport.send_to(to, frame);
    }

    fn change_view(&self, new_view: View) {
        self.shared.set_view(new_view);
    }

    fn set_status(&self, status: Status) {
        self.shared.set_status(status);
    }
}
