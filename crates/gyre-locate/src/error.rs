//! Error types for the location engine.

use thiserror::Error;

/// Result type for location-engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while solving for a location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The smooth descent diverged and every restart failed.
    #[error("no NEMFL solution")]
    NoNemflSolution,
}
