//! engine-pipeline: the Solve Pipeline (§4.5) that wraps LP Core and the
//! Monte Carlo Runner with contract freshness, framing, and audit
//! emission, running requests across a worker pool and writing every
//! outcome through to the Snapshot WAL and Audit Index.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod event;
pub mod pipeline;

pub use collaborators::{
    Collaborators, ContractRegistry, Framer, FramingOutcome, FreshnessDiff, FreshnessOracle, IngestCoordinator,
    NullCollaborators,
};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use event::PipelineEvent;
pub use pipeline::{Pipeline, RunOutcome, SolveRequest, TerminalState};
