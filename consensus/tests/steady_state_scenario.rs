//! End-to-end scenario 1 from spec §8 ("Clean steady-state"): a leader
//! proposes a run of blocks and every honest replica commits them in order,
//! each within 2Δ of its own arrival. Runs four replicas wired together
//! through the real `e2c-network` gateway (signing, dedup, wire codec) so
//! the test exercises the crate boundary the same way `e2c-node` does,
//! not a hand-rolled shortcut.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use e2c_consensus::chain::{ChainReader, ChainWriter};
use e2c_consensus::message::WireFrame;
use e2c_consensus::state::SharedViewStatus;
use e2c_consensus::validator_set::ValidatorList;
use e2c_consensus::{Engine, Event, EventSink, Params};
use e2c_crypto::KeyPair;
use e2c_network::{GatewayBackend, PeerTransport};
use e2c_types::{Address, Block, ExtraData, Header, Height, H256};

/// Routes a frame sent by one replica's `GatewayBackend` straight into the
/// target replica's own `GatewayBackend::on_frame_received`, standing in
/// for the real wire (spec §1 Non-goal: transport-level P2P is out of
/// scope for the core, modeled here by the narrowest possible stand-in).
#[derive(Default)]
struct TestTransport {
    peers: Mutex<HashMap<Address, (Arc<GatewayBackend<TestTransport>>, EventSink)>>,
}

impl TestTransport {
    fn register(&self, address: Address, backend: Arc<GatewayBackend<TestTransport>>, sink: EventSink) {
        self.peers.lock().unwrap().insert(address, (backend, sink));
    }

    fn deliver(&self, peer: Address, frame: WireFrame) {
        let entry = self.peers.lock().unwrap().get(&peer).map(|(b, s)| (b.clone(), s.clone()));
        if let Some((backend, sink)) = entry {
            let _ = backend.on_frame_received(frame.sender, frame, |message| {
                use e2c_consensus::backend::EngineCallbacks;
                sink.deliver(Event::Message(message));
            });
        }
    }

    fn addresses(&self) -> Vec<Address> {
        self.peers.lock().unwrap().keys().copied().collect()
    }
}

impl PeerTransport for TestTransport {
    fn send_to(&self, peer: Address, frame: WireFrame) {
        self.deliver(peer, frame);
    }

    fn broadcast_except(&self, except: Address, frame: WireFrame) {
        for peer in self.addresses() {
            if peer != except {
                self.deliver(peer, frame.clone());
            }
        }
    }
}

#[derive(Default)]
struct MemoryChain {
    blocks: Mutex<Vec<Block>>,
}

impl MemoryChain {
    fn new(genesis: Block) -> Self {
        MemoryChain {
            blocks: Mutex::new(vec![genesis]),
        }
    }
}

impl ChainReader for MemoryChain {
    fn block_by_hash(&self, hash: &H256) -> Option<Block> {
        self.blocks.lock().unwrap().iter().find(|b| b.hash() == *hash).cloned()
    }

    fn block_by_number(&self, number: Height) -> Option<Block> {
        self.blocks.lock().unwrap().iter().find(|b| b.number() == number).cloned()
    }

    fn committed_height(&self) -> Height {
        self.blocks.lock().unwrap().last().map(|b| b.number()).unwrap_or(0)
    }

    fn signer_of(&self, hash: &H256) -> Option<Address> {
        let blocks = self.blocks.lock().unwrap();
        let block = blocks.iter().find(|b| b.hash() == *hash)?;
        block.header.recover_signer(|sig, digest| e2c_crypto::recover(sig, digest).ok())
    }
}

impl ChainWriter for MemoryChain {
    fn commit(&self, block: &Block) -> Result<(), String> {
        let mut blocks = self.blocks.lock().unwrap();
        if blocks.last().map(|b| b.hash()) != Some(block.hash()) {
            blocks.push(block.clone());
        }
        Ok(())
    }
}

fn genesis_block(validators: &[Address]) -> Block {
    let extra = ExtraData::new(validators.to_vec());
    let header = Header::new(H256::zero(), 0, H256::zero(), H256::zero(), 0, extra);
    Block::new(header, Vec::new())
}

fn child_of(parent: &Block, validators: &[Address], timestamp: u64) -> Block {
    let extra = ExtraData::new(validators.to_vec());
    let header = Header::new(parent.hash(), parent.number() + 1, H256::zero(), H256::zero(), timestamp, extra);
    Block::new(header, Vec::new())
}

async fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn four_replicas_commit_a_run_of_blocks_in_order() {
    const N: usize = 4;
    const DELTA_MS: u64 = 25;

    let mut keypairs: Vec<KeyPair> = (0..N).map(|_| KeyPair::generate()).collect();
    // Order validators by address so `leader(0)` is deterministic
    // regardless of key-generation order.
    keypairs.sort_by_key(|k| k.address());
    let validator_addresses: Vec<Address> = keypairs.iter().map(|k| k.address()).collect();

    let genesis = genesis_block(&validator_addresses);
    let transport = Arc::new(TestTransport::default());
    let params = Params::new(Duration::from_millis(DELTA_MS));

    let mut chains = Vec::new();
    let mut event_senders = Vec::new();
    let mut handles = Vec::new();

    for keypair in &keypairs {
        let validators = ValidatorList::new(validator_addresses.clone());
        let shared = SharedViewStatus::new(0);
        let chain = Arc::new(MemoryChain::new(genesis.clone()));
        let backend = Arc::new(GatewayBackend::new(keypair.clone(), validators.clone(), shared.clone(), transport.clone()));

        let engine = Engine::new(backend.clone(), chain.clone(), chain.clone(), validators, shared, params, genesis.clone());

        transport.register(keypair.address(), backend, engine.event_sink());
        event_senders.push(engine.event_sender());
        chains.push(chain);
        handles.push(tokio::spawn(engine.run()));
    }

    let leader_sender = event_senders[0].clone();
    let mut tip = genesis.clone();
    for height in 1..=3u64 {
        let next = child_of(&tip, &validator_addresses, height);
        leader_sender.send(Event::MinerBlock(next.clone())).unwrap();
        tip = next;

        let reached = wait_until(
            || chains.iter().all(|chain| chain.committed_height() >= height),
            Duration::from_secs(3),
        )
        .await;
        assert!(reached, "not every replica committed height {height} in time");
    }

    for chain in &chains {
        assert_eq!(chain.committed_height(), 3);
    }

    for handle in handles {
        handle.abort();
    }
}
