//! Process configuration (spec §6 "Configuration"): Δ, the initial
//! validator set, and the handful of knobs the engine and RPC surface need
//! at startup. Loaded from a TOML file, mirroring the teacher's
//! `codechain/config` layering but trimmed to only what E2C itself needs —
//! no networking, mining, or snapshot-sync sections, since those belong to
//! the collaborators this crate stubs out for the demo binary.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use e2c_types::Address;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Δ in milliseconds: the assumed upper bound on message delay.
    pub delta_ms: u64,
    /// How far ahead of the local clock a header's timestamp may be
    /// (seconds) before `verify_header` rejects it outright.
    pub future_tolerance_secs: u64,
    /// The ordered validator set (spec §3: "fixed for a view").
    pub validators: Vec<Address>,
    /// Hex-encoded secp256k1 secret key for this replica's signing
    /// identity, without a leading `0x`.
    pub secret_key: String,
    /// Bind address for the admin JSON-RPC server.
    pub rpc_bind: String,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn delta(&self) -> Duration {
        Duration::from_millis(self.delta_ms)
    }
}
