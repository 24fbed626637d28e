//! Error taxonomy for the Solve Pipeline (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("no variable frame registered for product group '{0}'")]
    UnknownProductGroup(String),

    #[error("solve pipeline run was cancelled")]
    Cancelled,

    #[error(transparent)]
    Engine(#[from] engine_core::EngineError),

    #[error(transparent)]
    Wal(#[from] engine_wal::WalError),

    #[error("external collaborator unreachable: {0}")]
    ExternalUnreachable(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
