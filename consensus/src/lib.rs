//! E2C: a leader-based, partially-synchronous BFT replication core.
//!
//! This crate implements the steady-state pipeline and view-change protocol
//! only (see [`core::Engine`]). The blockchain data model, the P2P gossip
//! layer, the admin RPC surface, and the local database are external
//! collaborators reached through the [`backend::Backend`] /
//! [`chain::ChainReader`] / [`chain::ChainWriter`] trait seams.

pub mod backend;
pub mod chain;
mod core;
pub mod error;
pub mod event;
pub mod message;
pub mod queue;
pub mod snapshot;
pub mod state;
pub mod timer;
pub mod validator_set;

pub use crate::core::{Engine, Params};
pub use backend::{Backend, EngineCallbacks, EventSink};
pub use chain::{ChainReader, ChainWriter};
pub use error::{Error, Result};
pub use event::{Event, TickKind};
pub use snapshot::{Snapshot, SnapshotStore};
pub use validator_set::ValidatorList;
