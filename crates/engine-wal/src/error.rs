//! Error types for the Snapshot WAL, Audit Index, and Variable Frame
//! Registry.

use thiserror::Error;

/// Errors raised by the WAL appender, reader, and recovery path.
///
/// Per §7's propagation policy, `wal_io` never corrupts in-memory state:
/// callers of [`crate::wal::WalAppender::append`] are expected to log this
/// and continue writing to the Audit Index regardless.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("WAL I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAL serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("WAL frame at {path} truncated: declared {declared} bytes, found {found}")]
    TruncatedFrame {
        path: String,
        declared: u32,
        found: usize,
    },

    #[error("unknown entry kind tag '{0}' in WAL frame")]
    UnknownKind(String),

    #[error("hash chain broken at seq {seq}: expected {expected}, got {got}")]
    ChainBroken {
        seq: u64,
        expected: String,
        got: String,
    },

    #[error("no variable frame registered for product group '{0}'")]
    UnknownProductGroup(String),

    #[error("product group '{0}' is already registered")]
    DuplicateProductGroup(String),
}

pub type WalResult<T> = Result<T, WalError>;

impl From<WalError> for engine_core::EngineError {
    fn from(err: WalError) -> Self {
        match err {
            WalError::Io(e) => engine_core::EngineError::WalIo(e.to_string()),
            other => engine_core::EngineError::WalIo(other.to_string()),
        }
    }
}
