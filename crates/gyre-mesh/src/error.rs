//! Error types for mesh operations.
//!
//! Every kind here is recovered where it occurs: a failed transfer leaves
//! the datum with the sender, a failed peer draw makes the caller a no-op
//! for the tick, a diverged centroid solve leaves the node's previous
//! location standing. Only a divergence during node construction travels
//! further, as a typed failure the constructor's caller inspects.

use thiserror::Error;

/// Errors raised by node-to-node operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MeshError {
    /// The received datum would push the node past its byte capacity.
    #[error("received datum would exceed max bytes")]
    CapacityExceeded,

    /// The receiving node has no free data slot.
    #[error("no free data slot on receiver")]
    SlotExhausted,

    /// A random peer draw came up empty.
    #[error("no such peer")]
    NoSuchPeer,

    /// The centroid solver diverged for the node's data set.
    #[error("no NEMFL solution")]
    NoNemflSolution,
}

impl From<gyre_locate::Error> for MeshError {
    fn from(err: gyre_locate::Error) -> Self {
        match err {
            gyre_locate::Error::NoNemflSolution => MeshError::NoNemflSolution,
        }
    }
}
