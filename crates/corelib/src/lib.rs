//! Core library for the Chord DHT routing substrate.
//!
//! This crate provides the ring-structured key-based routing core: a
//! modular identifier space, per-node routing state, the join/leave/
//! stabilize/fix-fingers protocol, and the `Network` supervisor that
//! external callers drive. Transport, persistence, visualization, and
//! the choice of payload encryption are all external collaborators; see
//! the workspace's `crates/cli` for a minimal demonstration of wiring
//! those in.

pub mod codec;
pub mod error;
pub mod identifier;
pub mod network;
pub mod node;
pub mod protocol;

pub use codec::{Codec, IdentityCodec, XorCodec};
pub use error::{Error, Result};
pub use identifier::{Identifier, RingParams};
pub use network::{HealthReport, Network};
pub use node::{Backup, Metrics, NodeSnapshot, NodeState};
