//! engine-wal: Solve Audit model, Snapshot WAL, in-memory Audit Index,
//! and the Variable Frame Registry (§3, §4.6, §4.7, §6.4, §6.5, §9).

pub mod audit;
pub mod config;
pub mod error;
pub mod index;
pub mod registry;
pub mod wal;

pub use audit::{Audit, AuditResult, AuditSpec, ContractFreshness, ContractSnapshot, PhaseTimestamps, ResultStatus, SolveMode};
pub use config::WalConfig;
pub use error::{WalError, WalResult};
pub use index::{AuditIndex, DecisionChainEntry, DecisionClassification, PathComparison, PerformanceSummary};
pub use registry::{ProductGroup, VariableFrame};
pub use wal::{ChainVerification, EntryKind, SnapshotLogEntry, WalAppender};
