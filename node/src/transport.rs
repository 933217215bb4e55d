//! Stand-in for the real P2P gossip layer (spec §1 Non-goals:
//! "transport-level P2P networking" is out of scope). Logs what it would
//! have sent; a production embedder swaps this for a real
//! `PeerTransport` backed by the actual wire connections.

use log::debug;

use e2c_consensus::message::WireFrame;
use e2c_network::PeerTransport;
use e2c_types::Address;

pub struct LoggingTransport;

impl PeerTransport for LoggingTransport {
    fn send_to(&self, peer: Address, frame: WireFrame) {
        debug!("[transport stub] would send code={} to {:?}", frame.code, peer);
    }

    fn broadcast_except(&self, except: Address, frame: WireFrame) {
        debug!("[transport stub] would broadcast code={} except {:?}", frame.code, except);
    }
}
