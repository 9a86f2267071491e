//! Error types for the core library.
//!
//! Variants mirror the external-interface contract: input errors are
//! reported synchronously, lookup misses surface as `KeyNotFound` at the
//! network boundary, and routing/liveness failures collapse to
//! `RoutingFailure` once no finger can make further progress.

use crate::identifier::Identifier;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("ring parameter m={0} is out of range (must be 1..=32)")]
    InvalidRingParams(u32),

    #[error("node id {0} is not a valid ring identifier")]
    InvalidNodeId(Identifier),

    #[error("node id {0} already exists in the ring")]
    DuplicateNodeId(Identifier),

    #[error("network has no nodes")]
    EmptyNetwork,

    #[error("node id {0} is not a member of the ring")]
    NodeNotFound(Identifier),

    #[error("key not found")]
    KeyNotFound,

    #[error("ring is full ({0} nodes)")]
    RingFull(u64),

    #[error("routing failed: no finger advanced toward the target")]
    RoutingFailure,

    #[error("codec error: {0}")]
    Codec(String),
}
