//! The immutable Solve Audit record (§3) and the small vocabulary it's
//! built from.
//!
//! An [`Audit`] is frozen on creation: its fields are private and reached
//! only through getters — there is no `&mut self` method anywhere on this
//! type, so "no field may mutate" (§3) is enforced by the type system
//! rather than by convention (§8 Testable Property 7).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use engine_core::ids::{AuditId, RunId};
use engine_core::{MonteCarloResult, SolveResult, SolveStatus, VariableVector};

/// Which solver operation produced this audit (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMode {
    Solve,
    MonteCarlo,
}

/// Outcome of the contract-freshness check (§4.5 Phase 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractFreshness {
    pub checked: bool,
    pub stale: bool,
    pub reason: Option<String>,
    pub ingested_count: u32,
}

impl ContractFreshness {
    pub fn fresh(ingested_count: u32) -> Self {
        Self {
            checked: true,
            stale: false,
            reason: None,
            ingested_count,
        }
    }

    pub fn stale(reason: impl Into<String>) -> Self {
        Self {
            checked: true,
            stale: true,
            reason: Some(reason.into()),
            ingested_count: 0,
        }
    }

    pub fn unchecked() -> Self {
        Self {
            checked: false,
            stale: false,
            reason: None,
            ingested_count: 0,
        }
    }
}

/// One contract snapshot attached to an audit (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub id: String,
    pub counterparty: String,
    pub version: u32,
    pub file_hash: String,
    pub clause_count: u32,
    pub clause_ids: Vec<String>,
}

/// The solver outcome attached to an audit — either shape, or neither
/// when the run terminated before a solve was attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AuditResult {
    Solve(SolveResult),
    MonteCarlo(MonteCarloResult),
    None,
}

/// Overall audit outcome (§7): a superset of [`SolveStatus`] that also
/// covers pipeline-level terminal states the LP Core never produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Optimal,
    Infeasible,
    SolverError,
    BadInput,
    Error,
    Cancelled,
}

impl From<SolveStatus> for ResultStatus {
    fn from(status: SolveStatus) -> Self {
        match status {
            SolveStatus::Optimal => ResultStatus::Optimal,
            SolveStatus::Infeasible => ResultStatus::Infeasible,
            SolveStatus::SolverError => ResultStatus::SolverError,
            SolveStatus::BadInput => ResultStatus::BadInput,
        }
    }
}

/// Wall-clock timestamps for each phase of §4.5's state machine. Phases
/// that didn't run (e.g. ingestion skipped because contracts were fresh)
/// are left `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimestamps {
    pub started: DateTime<Utc>,
    pub contracts_checked: Option<DateTime<Utc>>,
    pub ingest_done: Option<DateTime<Utc>>,
    pub framed: Option<DateTime<Utc>>,
    pub solved: Option<DateTime<Utc>>,
    pub done: Option<DateTime<Utc>>,
}

impl PhaseTimestamps {
    pub fn started_at(ts: DateTime<Utc>) -> Self {
        Self {
            started: ts,
            contracts_checked: None,
            ingest_done: None,
            framed: None,
            solved: None,
            done: None,
        }
    }
}

/// Construction parameters for [`Audit::new`] — a plain data bag since the
/// audit itself exposes no setters once built.
pub struct AuditSpec {
    pub run_id: RunId,
    pub mode: SolveMode,
    pub product_group: String,
    pub trader_id: Option<String>,
    pub trigger: String,
    pub freshness: ContractFreshness,
    pub variable_snapshot: VariableVector,
    pub source_timestamps: HashMap<String, DateTime<Utc>>,
    pub result: AuditResult,
    pub result_status: ResultStatus,
    pub phases: PhaseTimestamps,
    pub contracts: Vec<ContractSnapshot>,
}

/// The frozen, self-contained record of one pipeline run (§3, §4.5 Phase 4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    id: AuditId,
    run_id: RunId,
    mode: SolveMode,
    product_group: String,
    trader_id: Option<String>,
    trigger: String,
    freshness: ContractFreshness,
    variable_snapshot: VariableVector,
    source_timestamps: HashMap<String, DateTime<Utc>>,
    result: AuditResult,
    result_status: ResultStatus,
    phases: PhaseTimestamps,
    contracts: Vec<ContractSnapshot>,
}

impl Audit {
    /// Mint a new, immutable audit. The id is freshly allocated; every
    /// other field is taken verbatim from `spec` and never changes again.
    pub fn new(spec: AuditSpec) -> Self {
        Self {
            id: AuditId::next(),
            run_id: spec.run_id,
            mode: spec.mode,
            product_group: spec.product_group,
            trader_id: spec.trader_id,
            trigger: spec.trigger,
            freshness: spec.freshness,
            variable_snapshot: spec.variable_snapshot,
            source_timestamps: spec.source_timestamps,
            result: spec.result,
            result_status: spec.result_status,
            phases: spec.phases,
            contracts: spec.contracts,
        }
    }

    pub fn id(&self) -> AuditId {
        self.id
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn mode(&self) -> SolveMode {
        self.mode
    }

    pub fn product_group(&self) -> &str {
        &self.product_group
    }

    /// The audit's trader, or the synthetic `__auto__` tag for automated
    /// runs with no human trader attached (§4.6).
    pub fn trader_key(&self) -> &str {
        self.trader_id.as_deref().unwrap_or("__auto__")
    }

    pub fn trader_id(&self) -> Option<&str> {
        self.trader_id.as_deref()
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn is_automated(&self) -> bool {
        self.trigger == "auto"
    }

    pub fn freshness(&self) -> &ContractFreshness {
        &self.freshness
    }

    pub fn variable_snapshot(&self) -> &VariableVector {
        &self.variable_snapshot
    }

    pub fn source_timestamps(&self) -> &HashMap<String, DateTime<Utc>> {
        &self.source_timestamps
    }

    pub fn result(&self) -> &AuditResult {
        &self.result
    }

    pub fn result_status(&self) -> ResultStatus {
        self.result_status
    }

    pub fn phases(&self) -> &PhaseTimestamps {
        &self.phases
    }

    pub fn contracts(&self) -> &[ContractSnapshot] {
        &self.contracts
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.phases.started
    }
}
