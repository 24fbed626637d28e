//! Error types and exit codes for the model descriptor codec and port
//! protocol.

use thiserror::Error;

/// Exit/status codes shared by the Port protocol (§6.2) and the FFI
/// surface (§6.3): both report solver outcomes with the same small
/// vocabulary so a caller on either side of the boundary can branch on
/// one integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success; check the embedded status for optimality.
    Success = 0,
    /// Invalid input: malformed descriptor, length mismatch, bad index.
    InvalidInput = 1,
    /// Solver returned an error (infeasible, numerical failure).
    SolverError = 2,
    /// The external call timed out.
    Timeout = 3,
}

impl ExitCode {
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => ExitCode::Success,
            1 => ExitCode::InvalidInput,
            2 => ExitCode::SolverError,
            3 => ExitCode::Timeout,
            _ => ExitCode::SolverError,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

/// Errors raised by the codec and port-protocol layer.
#[derive(Debug, Error)]
pub enum WireError {
    /// The byte buffer was shorter than the field being read required.
    #[error("truncated frame: needed {needed} bytes, had {available}")]
    Truncated { needed: usize, available: usize },

    /// A length-prefixed count exceeded a wire-format maximum.
    #[error("count {value} exceeds maximum {max} for {field}")]
    CountExceeded {
        field: &'static str,
        value: usize,
        max: usize,
    },

    /// A tag byte didn't match any known variant.
    #[error("unknown tag {tag} for {field}")]
    UnknownTag { field: &'static str, tag: u8 },

    /// The frame's length prefix didn't match the actual payload length.
    #[error("frame length mismatch: header said {declared}, payload was {actual}")]
    LengthMismatch { declared: u32, actual: usize },

    /// Underlying I/O error communicating over the port.
    #[error("port I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The descriptor failed structural validation.
    #[error("invalid descriptor: {0}")]
    Invalid(String),
}

pub type WireResult<T> = Result<T, WireError>;

impl From<WireError> for engine_core::EngineError {
    fn from(err: WireError) -> Self {
        engine_core::EngineError::BadInput(err.to_string())
    }
}
