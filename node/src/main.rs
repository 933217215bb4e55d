//! The E2C replica binary: wires the consensus core to a local chain store,
//! a (stub) gossip transport, and the admin RPC surface.

mod chain_store;
mod config;
mod transport;

use std::sync::Arc;

use clap::Parser;
use secp256k1::SecretKey;

use e2c_consensus::state::SharedViewStatus;
use e2c_consensus::validator_set::ValidatorList;
use e2c_consensus::{Engine, Params};
use e2c_crypto::KeyPair;
use e2c_network::GatewayBackend;
use e2c_rpc::{E2cRpcImpl, E2cRpc};
use e2c_types::{Block, ExtraData, Header, H256};

use chain_store::InMemoryChain;
use config::Config;
use transport::LoggingTransport;

#[derive(Parser)]
#[command(name = "e2c-node", about = "An E2C consensus replica")]
struct Args {
    /// Path to the replica's TOML configuration file.
    #[arg(long, default_value = "e2c.toml")]
    config: String,
}

fn genesis_block(validators: &[e2c_types::Address]) -> Block {
    let extra = ExtraData::new(validators.to_vec());
    let header = Header::new(H256::zero(), 0, H256::zero(), H256::zero(), 0, extra);
    Block::new(header, Vec::new())
}

#[tokio::main]
async fn main() {
    e2c_logger::init();

    let args = Args::parse();
    let config = Config::load(&args.config).expect("failed to load config");

    let secret_bytes = hex_decode(&config.secret_key).expect("secret_key must be 32 bytes of hex");
    let secret = SecretKey::from_slice(&secret_bytes).expect("invalid secp256k1 secret key");
    let keypair = KeyPair::from_secret(secret);
    let validators = ValidatorList::new(config.validators.clone());

    let shared = SharedViewStatus::new(0);
    let genesis = genesis_block(&config.validators);
    let chain = Arc::new(InMemoryChain::new(genesis.clone()));
    let transport = Arc::new(LoggingTransport);
    let backend = Arc::new(GatewayBackend::new(keypair, validators.clone(), shared.clone(), transport));

    let params = Params::new(config.delta());
    let engine = Engine::new(backend, chain.clone(), chain.clone(), validators.clone(), shared.clone(), params, genesis);

    let rpc_impl = E2cRpcImpl::new(validators, shared, chain.clone(), chain);
    let mut io = jsonrpc_core::IoHandler::new();
    io.extend_with(rpc_impl.to_delegate());
    let rpc_bind = config.rpc_bind.parse().expect("invalid rpc_bind address");
    let server = jsonrpc_http_server::ServerBuilder::new(io)
        .start_http(&rpc_bind)
        .expect("failed to start the admin RPC server");

    tokio::spawn(async move {
        engine.run().await;
    });

    tokio::task::spawn_blocking(move || server.wait()).await.expect("rpc server task panicked");
}

fn hex_decode(s: &str) -> Option<[u8; 32]> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}
