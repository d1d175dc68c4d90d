//! Error types for the nucleus.

use souma_core::{CoreError, OneupId, PersonaId, PlanetId, StarId, StarmapId};
use souma_store::StoreError;
use thiserror::Error;

/// Errors that can occur during nucleus operations.
#[derive(Debug, Error)]
pub enum NucleusError {
    /// Key, state or encoding error from the core types.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("persona not found: {0}")]
    PersonaNotFound(PersonaId),

    #[error("star not found: {0}")]
    StarNotFound(StarId),

    #[error("starmap not found: {0}")]
    StarmapNotFound(StarmapId),

    #[error("planet not found: {0}")]
    PlanetNotFound(PlanetId),

    /// The acting identity may not perform this operation.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Another vote took the (creator, star) slot first.
    #[error("conflicting vote by {creator} on {star}: existing {existing}")]
    Conflict {
        creator: PersonaId,
        star: StarId,
        existing: OneupId,
    },

    /// A vesicle signature did not verify against its author.
    #[error("invalid signature on vesicle by {0}")]
    InvalidSignature(PersonaId),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for nucleus operations.
pub type Result<T> = std::result::Result<T, NucleusError>;
