//! Unified error taxonomy for the trading decision engine.
//!
//! This module provides a common error type [`EngineError`] that can represent
//! errors from any part of the system. Domain-specific error types in other
//! crates convert into `EngineError` for uniform handling at API boundaries.
//!
//! The variants mirror the error kinds named in the error-handling design:
//! `bad_input`, `infeasible`, `solver_error`, `external_unreachable`,
//! `stale_data`, `wal_io` and `cancelled` are all first-class here rather
//! than collapsed into a single opaque string.

use thiserror::Error;

/// Unified error type for all engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed descriptor, length mismatch, or out-of-range index.
    #[error("bad input: {0}")]
    BadInput(String),

    /// The LP was proven infeasible by the solver.
    #[error("infeasible")]
    Infeasible,

    /// The solver returned a status this engine doesn't classify.
    #[error("solver error: {0}")]
    SolverError(String),

    /// A contract freshness, ingestion, or framing call failed or timed out.
    #[error("external collaborator unreachable: {0}")]
    ExternalUnreachable(String),

    /// The freshness check could not confirm currency; caller continues anyway.
    #[error("stale data: {0}")]
    StaleData(String),

    /// The WAL failed to write or fsync; callers are expected to continue.
    #[error("WAL I/O error: {0}")]
    WalIo(String),

    /// The run was cancelled at a phase boundary.
    #[error("cancelled")]
    Cancelled,

    /// I/O errors (file access, etc.) not otherwise classified.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors for wrapping external error types.
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using [`EngineError`].
pub type EngineResult<T> = Result<T, EngineError>;

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Other(err.to_string())
    }
}
