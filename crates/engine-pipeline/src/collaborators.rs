//! External collaborator seams (§4.5, §1 Non-goals).
//!
//! The contract registry, freshness oracle, ingest coordinator, and
//! framer are the HTTP-backed adapters spec.md explicitly places outside
//! the core ("these surround the core but do not contain the hard
//! engineering"). They're modeled here as traits with no production
//! implementation — callers outside this workspace supply the real
//! network-backed adapters. [`NullCollaborators`] is the one
//! implementation this crate ships: always-fresh, no framing
//! adjustments, so the pipeline is exercisable end-to-end without
//! network access, mirroring the teacher's `DummySolver` test fixture in
//! `gat-core::solver::registry`.

use engine_core::VariableVector;
use engine_wal::ContractSnapshot;

use crate::error::PipelineResult;

/// Phase 1's three-way diff between the registry's active set and what
/// the external oracle believes is currently true (§4.5).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FreshnessDiff {
    pub changed: Vec<String>,
    pub missing: Vec<String>,
    pub unchanged: Vec<String>,
}

impl FreshnessDiff {
    pub fn needs_ingest(&self) -> bool {
        !self.changed.is_empty() || !self.missing.is_empty()
    }
}

/// Outcome of Phase 2 framing: either the same vector plus adjustments
/// and a free-text note, per §4.5.
#[derive(Debug, Clone, PartialEq)]
pub struct FramingOutcome {
    pub vector: VariableVector,
    pub adjustments: Vec<String>,
    pub note: Option<String>,
}

/// Source of truth for which contracts are currently active for a
/// product group (§4.5 Phase 1, Phase 4).
pub trait ContractRegistry: Send + Sync {
    fn active_contracts(&self, product_group: &str) -> PipelineResult<Vec<ContractSnapshot>>;
}

/// External diff oracle queried during Phase 1.
pub trait FreshnessOracle: Send + Sync {
    fn diff(&self, product_group: &str, active: &[ContractSnapshot]) -> PipelineResult<FreshnessDiff>;
}

/// External coordinator invoked synchronously when Phase 1 finds changed
/// or missing contracts. Returns the count ingested.
pub trait IngestCoordinator: Send + Sync {
    fn ingest(&self, product_group: &str, contract_ids: &[String]) -> PipelineResult<u32>;
}

/// External framer invoked during Phase 2 unless framing is skipped.
pub trait Framer: Send + Sync {
    fn frame(&self, product_group: &str, vector: &VariableVector) -> PipelineResult<FramingOutcome>;
}

/// The four collaborators one [`crate::pipeline::Pipeline`] is built
/// from.
#[derive(Clone)]
pub struct Collaborators {
    pub contracts: std::sync::Arc<dyn ContractRegistry>,
    pub freshness: std::sync::Arc<dyn FreshnessOracle>,
    pub ingest: std::sync::Arc<dyn IngestCoordinator>,
    pub framer: std::sync::Arc<dyn Framer>,
}

impl Collaborators {
    /// Build a bundle from the null fixture: no contracts ever active,
    /// diffs always empty, ingestion a no-op, framing a pass-through.
    pub fn null() -> Self {
        let fixture = std::sync::Arc::new(NullCollaborators);
        Self {
            contracts: fixture.clone(),
            freshness: fixture.clone(),
            ingest: fixture.clone(),
            framer: fixture,
        }
    }
}

/// Always-fresh, no-adjustment test fixture implementing all four
/// collaborator traits at once.
pub struct NullCollaborators;

impl ContractRegistry for NullCollaborators {
    fn active_contracts(&self, _product_group: &str) -> PipelineResult<Vec<ContractSnapshot>> {
        Ok(Vec::new())
    }
}

impl FreshnessOracle for NullCollaborators {
    fn diff(&self, _product_group: &str, active: &[ContractSnapshot]) -> PipelineResult<FreshnessDiff> {
        Ok(FreshnessDiff {
            changed: Vec::new(),
            missing: Vec::new(),
            unchanged: active.iter().map(|c| c.id.clone()).collect(),
        })
    }
}

impl IngestCoordinator for NullCollaborators {
    fn ingest(&self, _product_group: &str, _contract_ids: &[String]) -> PipelineResult<u32> {
        Ok(0)
    }
}

impl Framer for NullCollaborators {
    fn frame(&self, _product_group: &str, vector: &VariableVector) -> PipelineResult<FramingOutcome> {
        Ok(FramingOutcome {
            vector: vector.clone(),
            adjustments: Vec::new(),
            note: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_fixture_reports_no_active_contracts() {
        let fixture = NullCollaborators;
        assert!(fixture.active_contracts("grain").unwrap().is_empty());
    }

    #[test]
    fn null_fixture_diff_is_always_clean() {
        let fixture = NullCollaborators;
        let diff = fixture.diff("grain", &[]).unwrap();
        assert!(!diff.needs_ingest());
    }

    #[test]
    fn null_fixture_framer_passes_vector_through_unchanged() {
        let fixture = NullCollaborators;
        let vector = vec![1.0, 2.0, 3.0];
        let outcome = fixture.frame("grain", &vector).unwrap();
        assert_eq!(outcome.vector, vector);
        assert!(outcome.adjustments.is_empty());
        assert!(outcome.note.is_none());
    }
}
