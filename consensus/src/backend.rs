//! The two trait seams that resolve the core/backend cyclic dependency
//! (spec §9 "Cyclic dependency between core and backend"): `Backend` is
//! consumed by the core; `EngineCallbacks` is consumed by the backend to
//! hand decoded events back to the core's event loop. A `GatewayBackend`
//! (in `e2c-network`) implements `Backend`; an `EventSink` here implements
//! `EngineCallbacks` by forwarding onto the core's inbound channel.

use ethereum_types::H256;

use e2c_types::{Address, Signature, Status, View};

use crate::event::Event;
use crate::message::Message;
use crate::validator_set::ValidatorList;

/// Consumed by the core to reach the transport, signing key, and the
/// atomic `status`/`view` cells the backend also reads (spec §5, §9).
pub trait Backend: Send + Sync {
    fn self_address(&self) -> Address;

    fn validators(&self) -> &ValidatorList;

    /// Keccak256 + ECDSA over the local private key (spec §4.1 `sign`).
    fn sign(&self, digest: H256) -> Signature;

    /// Sends `message` to every validator but self, suppressing echoes via
    /// `recent[peer]` (spec §4.1 `broadcast`).
    fn broadcast(&self, message: Message);

    /// Unicast variant of `broadcast` (spec §4.1 `send`).
    fn send(&self, message: Message, to: Address);

    /// Advances the shared atomic view (spec §9: "only the core advances
    /// `view` via a `change_view` call"). Called by the blame-aggregation
    /// rule (spec §4.4) and by view-change stage 1.
    fn change_view(&self, new_view: View);

    /// Publishes the shared atomic status so the backend's header
    /// verifier can gate on it without a lock (spec §3 "Status").
    fn set_status(&self, status: Status);
}

/// Consumed by the backend to push decoded, authenticated events into the
/// core's event loop (spec §9).
pub trait EngineCallbacks: Send + Sync {
    fn deliver(&self, event: Event);
}

/// The concrete `EngineCallbacks` implementation: a clone of the core
/// loop's inbound sender.
#[derive(Clone)]
pub struct EventSink {
    sender: tokio::sync::mpsc::UnboundedSender<Event>,
}

impl EventSink {
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<Event>) -> Self {
        EventSink {
            sender,
        }
    }
}

impl EngineCallbacks for EventSink {
    fn deliver(&self, event: Event) {
        // The loop owns the receiver for the rest of the process's life;
        // a closed channel only happens during shutdown, which is not an
        // error worth propagating (spec §7: transient failures are logged
        // and ignored).
        let _ = self.sender.send(event);
    }
}
