//! The Solve Pipeline state machine (§4.5):
//!
//! `STARTED → CONTRACTS_CHECKED → (INGESTING → INGEST_DONE)? → FRAMING →
//! FRAMED → SOLVING → DONE`, with a `STALE` excursion when the contract
//! check fails recoverably, and `ERROR` as the only other terminal state.
//!
//! One [`Pipeline::run`] call executes all four phases strictly
//! sequentially (§5: "inside one run, phases are strictly sequential").
//! [`Pipeline::run_many`] fans independent runs out across a rayon
//! thread pool, grounded in the teacher's `gat_batch::runner::run_batch`
//! (`ThreadPoolBuilder` + `par_iter` over one `run_job`-shaped closure).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use engine_core::ids::{AuditId, RunId};
use engine_core::{ModelDescriptor, ObjectiveMode, VariableVector};
use engine_wal::{
    Audit, AuditIndex, AuditResult, AuditSpec, ContractFreshness, ContractSnapshot, EntryKind, PhaseTimestamps,
    ResultStatus, SolveMode, VariableFrame, WalAppender,
};

use crate::collaborators::Collaborators;
use crate::error::PipelineError;
use crate::event::PipelineEvent;

/// One request to the pipeline (§4.5): "Each run receives (variable_vector,
/// product_group, mode, N, trader_id, trigger, caller_reference,
/// skip_contracts, skip_framing, optional trader_notes)".
///
/// `objective_mode`/`risk_aversion`/`profit_floor` ride with the request
/// rather than the registered [`VariableFrame`] since §4.8 only assigns
/// the LP's structural shape (variables, routes, constraints,
/// perturbation defaults) to the registry — the objective is the
/// trader's choice per solve.
#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub variable_vector: VariableVector,
    pub product_group: String,
    pub mode: SolveMode,
    pub objective_mode: ObjectiveMode,
    pub risk_aversion: f64,
    pub profit_floor: f64,
    /// Scenario count for [`SolveMode::MonteCarlo`]; ignored for
    /// [`SolveMode::Solve`].
    pub n_scenarios: Option<u32>,
    pub trader_id: Option<String>,
    pub trigger: String,
    pub caller_reference: String,
    pub skip_contracts: bool,
    pub skip_framing: bool,
    pub trader_notes: Option<String>,
}

/// How one run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalState {
    Done,
    Error(String),
    Cancelled,
}

/// Everything produced by one [`Pipeline::run`] call.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub audit_id: AuditId,
    pub events: Vec<PipelineEvent>,
    pub terminal: TerminalState,
}

fn build_descriptor(frame: &VariableFrame, request: &SolveRequest) -> ModelDescriptor {
    ModelDescriptor {
        n_vars: frame.variables.len() as u16,
        routes: frame.routes.clone(),
        constraints: frame.constraints.clone(),
        objective_mode: request.objective_mode,
        risk_aversion: request.risk_aversion,
        profit_floor: request.profit_floor,
        perturbations: frame.perturbation_defaults.clone(),
    }
}

/// Ties the four external collaborators, the Audit Index, and the WAL
/// appender into the request-handling state machine.
///
/// Per §5, the Audit Index and the WAL appender are each logically
/// single-writer; a `Mutex` around each serializes writers onto this
/// process's synchronous analogue of "one serializer task per
/// subsystem" (the teacher's crates use async actors where this
/// workspace uses a worker-pool-plus-mutex shape instead — see
/// `DESIGN.md`).
pub struct Pipeline {
    collaborators: Collaborators,
    index: Arc<Mutex<AuditIndex>>,
    wal: Arc<Mutex<WalAppender>>,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, index: Arc<Mutex<AuditIndex>>, wal: Arc<Mutex<WalAppender>>) -> Self {
        Self { collaborators, index, wal }
    }

    pub fn index(&self) -> &Arc<Mutex<AuditIndex>> {
        &self.index
    }

    pub fn wal(&self) -> &Arc<Mutex<WalAppender>> {
        &self.wal
    }

    /// Run one request through all four phases.
    pub fn run(&self, request: SolveRequest) -> RunOutcome {
        self.run_with_cancellation(request, None)
    }

    /// Run one request, checking `cancel` at each phase boundary (§5
    /// Cancellation: "cancellable at phase boundaries; mid-LP
    /// cancellation is not supported").
    pub fn run_cancellable(&self, request: SolveRequest, cancel: &AtomicBool) -> RunOutcome {
        self.run_with_cancellation(request, Some(cancel))
    }

    /// Run many independent requests across a rayon thread pool
    /// (`threads = 0` auto-detects via `num_cpus`), mirroring
    /// `gat_batch::runner::run_batch`'s `ThreadPoolBuilder` + `par_iter`
    /// shape.
    pub fn run_many(&self, requests: Vec<SolveRequest>, threads: usize) -> Vec<RunOutcome> {
        let thread_count = if threads == 0 { num_cpus::get() } else { threads };
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .build()
            .expect("building pipeline worker pool");
        pool.install(|| requests.into_par_iter().map(|request| self.run(request)).collect())
    }

    fn run_with_cancellation(&self, request: SolveRequest, cancel: Option<&AtomicBool>) -> RunOutcome {
        let cancelled = || cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false);
        let run_id = RunId::next();
        let caller_reference = request.caller_reference.clone();
        let mut events = vec![PipelineEvent::Started { run_id, caller_reference: caller_reference.clone() }];
        let mut phases = PhaseTimestamps::started_at(Utc::now());

        // Phase 1 — contract freshness.
        let (freshness, pre_ingest_contracts, mut phase1_events) =
            self.phase1_contract_freshness(run_id, &caller_reference, &request);
        events.append(&mut phase1_events);
        phases.contracts_checked = Some(Utc::now());
        events.push(PipelineEvent::ContractsChecked {
            run_id,
            caller_reference: caller_reference.clone(),
            stale: freshness.stale,
        });
        if freshness.ingested_count > 0 {
            phases.ingest_done = Some(Utc::now());
        }

        if cancelled() {
            return self.terminal_cancelled(run_id, &request, events, phases, freshness, pre_ingest_contracts);
        }

        // Phase 2 — framing.
        events.push(PipelineEvent::Framing { run_id, caller_reference: caller_reference.clone() });
        let (framed_vector, _adjustments) = self.phase2_framing(&request);
        phases.framed = Some(Utc::now());
        events.push(PipelineEvent::Framed { run_id, caller_reference: caller_reference.clone() });

        if cancelled() {
            return self.terminal_cancelled(run_id, &request, events, phases, freshness, pre_ingest_contracts);
        }

        let frame = match engine_wal::registry::frame_for(&request.product_group) {
            Ok(f) => f,
            Err(e) => {
                return self.terminal_error(
                    run_id,
                    &request,
                    events,
                    phases,
                    freshness,
                    pre_ingest_contracts,
                    framed_vector,
                    PipelineError::UnknownProductGroup(e.to_string()).to_string(),
                )
            }
        };

        // Phase 3 — solve.
        events.push(PipelineEvent::Solving { run_id, caller_reference: caller_reference.clone() });
        let solve_outcome = self.phase3_solve(&request, &frame, &framed_vector);
        phases.solved = Some(Utc::now());

        let audit_result = match solve_outcome {
            Ok(result) => result,
            Err(e) => {
                return self.terminal_error(
                    run_id,
                    &request,
                    events,
                    phases,
                    freshness,
                    pre_ingest_contracts,
                    framed_vector,
                    e.to_string(),
                )
            }
        };

        // Phase 4 — audit.
        let post_ingest_contracts = if request.skip_contracts {
            Vec::new()
        } else {
            self.collaborators.contracts.active_contracts(&request.product_group).unwrap_or(pre_ingest_contracts)
        };
        phases.done = Some(Utc::now());
        let result_status = match &audit_result {
            AuditResult::Solve(r) => ResultStatus::from(r.status),
            AuditResult::MonteCarlo(_) => ResultStatus::Optimal,
            AuditResult::None => ResultStatus::Error,
        };

        let audit = Audit::new(AuditSpec {
            run_id,
            mode: request.mode,
            product_group: request.product_group.clone(),
            trader_id: request.trader_id.clone(),
            trigger: request.trigger.clone(),
            freshness,
            variable_snapshot: framed_vector,
            source_timestamps: std::collections::HashMap::new(),
            result: audit_result,
            result_status,
            phases,
            contracts: post_ingest_contracts,
        });
        let audit_id = self.write_audit(audit);

        events.push(PipelineEvent::Done { run_id, caller_reference, result_status });
        RunOutcome { run_id, audit_id, events, terminal: TerminalState::Done }
    }

    fn phase1_contract_freshness(
        &self,
        run_id: RunId,
        caller_reference: &str,
        request: &SolveRequest,
    ) -> (ContractFreshness, Vec<ContractSnapshot>, Vec<PipelineEvent>) {
        if request.skip_contracts {
            return (ContractFreshness::unchecked(), Vec::new(), Vec::new());
        }

        let active = match self.collaborators.contracts.active_contracts(&request.product_group) {
            Ok(a) => a,
            Err(e) => return (ContractFreshness::stale(e.to_string()), Vec::new(), Vec::new()),
        };
        let diff = match self.collaborators.freshness.diff(&request.product_group, &active) {
            Ok(d) => d,
            Err(e) => return (ContractFreshness::stale(e.to_string()), active, Vec::new()),
        };

        let mut events = Vec::new();
        let mut ingested_count = 0u32;
        if diff.needs_ingest() {
            let ids: Vec<String> = diff.changed.iter().chain(diff.missing.iter()).cloned().collect();
            if !ids.is_empty() {
                // INGESTING is entered only when Phase 1 found something to ingest.
                events.push(PipelineEvent::IngestStarted {
                    run_id,
                    caller_reference: caller_reference.to_string(),
                });
                match self.collaborators.ingest.ingest(&request.product_group, &ids) {
                    Ok(n) => {
                        ingested_count = n;
                        events.push(PipelineEvent::IngestDone {
                            run_id,
                            caller_reference: caller_reference.to_string(),
                            ingested_count: n,
                        });
                    }
                    Err(e) => return (ContractFreshness::stale(e.to_string()), active, events),
                }
            }
        }
        (ContractFreshness::fresh(ingested_count), active, events)
    }

    fn phase2_framing(&self, request: &SolveRequest) -> (VariableVector, Vec<String>) {
        if request.skip_framing {
            return (request.variable_vector.clone(), Vec::new());
        }
        match self.collaborators.framer.frame(&request.product_group, &request.variable_vector) {
            Ok(outcome) => (outcome.vector, outcome.adjustments),
            // Framing errors never fail the pipeline; the pre-framing vector is used (§4.5).
            Err(_) => (request.variable_vector.clone(), Vec::new()),
        }
    }

    fn phase3_solve(
        &self,
        request: &SolveRequest,
        frame: &VariableFrame,
        vector: &VariableVector,
    ) -> Result<AuditResult, PipelineError> {
        let descriptor = build_descriptor(frame, request);
        descriptor.validate()?;
        match request.mode {
            SolveMode::Solve => {
                let result = engine_lp::solve(&descriptor, vector)?;
                Ok(AuditResult::Solve(result))
            }
            SolveMode::MonteCarlo => {
                let n = request.n_scenarios.unwrap_or(1000);
                let result = engine_lp::run_monte_carlo(&descriptor, vector, n, &frame.signal_thresholds)?;
                Ok(AuditResult::MonteCarlo(result))
            }
        }
    }

    fn write_audit(&self, audit: Audit) -> AuditId {
        match serde_json::to_value(&audit) {
            Ok(payload) => {
                let mut wal = self.wal.lock().expect("wal appender lock poisoned");
                // wal_io never corrupts in-memory state (§7): log and continue regardless.
                if let Err(e) = wal.append(EntryKind::Audit, payload) {
                    tracing::warn!(error = %e, "wal_io: audit append failed; continuing with in-memory index only");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize audit for WAL append"),
        }
        let mut index = self.index.lock().expect("audit index lock poisoned");
        index.insert(audit)
    }

    #[allow(clippy::too_many_arguments)]
    fn terminal_error(
        &self,
        run_id: RunId,
        request: &SolveRequest,
        mut events: Vec<PipelineEvent>,
        mut phases: PhaseTimestamps,
        freshness: ContractFreshness,
        contracts: Vec<ContractSnapshot>,
        variable_snapshot: VariableVector,
        reason: String,
    ) -> RunOutcome {
        phases.done = Some(Utc::now());
        let audit = Audit::new(AuditSpec {
            run_id,
            mode: request.mode,
            product_group: request.product_group.clone(),
            trader_id: request.trader_id.clone(),
            trigger: request.trigger.clone(),
            freshness,
            variable_snapshot,
            source_timestamps: std::collections::HashMap::new(),
            result: AuditResult::None,
            result_status: ResultStatus::Error,
            phases,
            contracts,
        });
        let audit_id = self.write_audit(audit);
        events.push(PipelineEvent::Error {
            run_id,
            caller_reference: request.caller_reference.clone(),
            reason: reason.clone(),
        });
        RunOutcome { run_id, audit_id, events, terminal: TerminalState::Error(reason) }
    }

    fn terminal_cancelled(
        &self,
        run_id: RunId,
        request: &SolveRequest,
        mut events: Vec<PipelineEvent>,
        mut phases: PhaseTimestamps,
        freshness: ContractFreshness,
        contracts: Vec<ContractSnapshot>,
    ) -> RunOutcome {
        phases.done = Some(Utc::now());
        let audit = Audit::new(AuditSpec {
            run_id,
            mode: request.mode,
            product_group: request.product_group.clone(),
            trader_id: request.trader_id.clone(),
            trigger: request.trigger.clone(),
            freshness,
            variable_snapshot: request.variable_vector.clone(),
            source_timestamps: std::collections::HashMap::new(),
            result: AuditResult::None,
            result_status: ResultStatus::Cancelled,
            phases,
            contracts,
        });
        let audit_id = self.write_audit(audit);
        // A cancelled run emits a terminal ERROR event (§5).
        events.push(PipelineEvent::Error {
            run_id,
            caller_reference: request.caller_reference.clone(),
            reason: "cancelled".to_string(),
        });
        RunOutcome { run_id, audit_id, events, terminal: TerminalState::Cancelled }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Collaborators;
    use engine_core::{Constraint, ConstraintKind, PerturbationSpec, Route, SignalThresholds, TransportMode, Variable, VariableKind};
    use engine_wal::VariableFrame;
    use tempfile::tempdir;

    fn scenario_a_frame(product_group: &str) -> VariableFrame {
        VariableFrame {
            product_group: product_group.to_string(),
            variables: vec![
                Variable { symbol: "sell".into(), label: "Sell".into(), unit: "$/t".into(), min: 0.0, max: 1000.0, step: 1.0, source: "market".into(), group: "price".into(), kind: VariableKind::Continuous },
                Variable { symbol: "buy".into(), label: "Buy".into(), unit: "$/t".into(), min: 0.0, max: 1000.0, step: 1.0, source: "market".into(), group: "price".into(), kind: VariableKind::Continuous },
                Variable { symbol: "freight".into(), label: "Freight".into(), unit: "$/t".into(), min: 0.0, max: 1000.0, step: 1.0, source: "market".into(), group: "price".into(), kind: VariableKind::Continuous },
                Variable { symbol: "supply".into(), label: "Supply".into(), unit: "t".into(), min: 0.0, max: 10000.0, step: 1.0, source: "inventory".into(), group: "volume".into(), kind: VariableKind::Continuous },
            ],
            routes: vec![Route {
                id: "r0".into(),
                origin: "A".into(),
                destination: "B".into(),
                mode: TransportMode::Barge,
                sell_idx: 0,
                buy_idx: 1,
                freight_idx: 2,
                base_transit_days: 1.0,
                transit_cost_per_day: 0.0,
                unit_capacity: 1000.0,
            }],
            constraints: vec![Constraint {
                id: "c0".into(),
                kind: ConstraintKind::Supply,
                bound_idx: 3,
                bound_min_idx: None,
                outage_idx: None,
                outage_factor: 1.0,
                route_indices: vec![0],
                custom_coefficients: None,
            }],
            signal_thresholds: SignalThresholds { strong_go: 50_000.0, go: 30_000.0, weak: -10_000.0 },
            perturbation_defaults: vec![PerturbationSpec::identity(); 4],
            poll_interval_seconds: 60,
            short_aliases: std::collections::HashMap::new(),
        }
    }

    fn test_pipeline() -> (Pipeline, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let wal = Arc::new(Mutex::new(WalAppender::open(dir.path()).unwrap()));
        let index = Arc::new(Mutex::new(AuditIndex::new()));
        (Pipeline::new(Collaborators::null(), index, wal), dir)
    }

    #[test]
    fn scenario_a_runs_end_to_end_and_reaches_done() {
        engine_wal::registry::register(scenario_a_frame("pipeline_test_scenario_a")).ok();
        let (pipeline, _dir) = test_pipeline();
        let request = SolveRequest {
            variable_vector: vec![400.0, 300.0, 50.0, 2000.0],
            product_group: "pipeline_test_scenario_a".into(),
            mode: SolveMode::Solve,
            objective_mode: ObjectiveMode::MaxProfit,
            risk_aversion: 0.0,
            profit_floor: 0.0,
            n_scenarios: None,
            trader_id: None,
            trigger: "auto".into(),
            caller_reference: "call-1".into(),
            skip_contracts: true,
            skip_framing: true,
            trader_notes: None,
        };
        let outcome = pipeline.run(request);
        assert_eq!(outcome.terminal, TerminalState::Done);
        assert_eq!(outcome.events.first().unwrap().tag(), "started");
        assert_eq!(outcome.events.last().unwrap().tag(), "ready");
        assert_eq!(pipeline.index().lock().unwrap().len(), 1);

        let audit = pipeline.index().lock().unwrap().get(outcome.audit_id).cloned().unwrap();
        match audit.result() {
            AuditResult::Solve(result) => {
                assert_eq!(result.status, engine_core::SolveStatus::Optimal);
                assert!((result.profit - 100_000.0).abs() < 1e-6);
            }
            other => panic!("expected a solve result, got {other:?}"),
        }
    }

    #[test]
    fn unregistered_product_group_terminates_with_error() {
        let (pipeline, _dir) = test_pipeline();
        let request = SolveRequest {
            variable_vector: vec![1.0],
            product_group: "pipeline_test_never_registered".into(),
            mode: SolveMode::Solve,
            objective_mode: ObjectiveMode::MaxProfit,
            risk_aversion: 0.0,
            profit_floor: 0.0,
            n_scenarios: None,
            trader_id: None,
            trigger: "auto".into(),
            caller_reference: "call-2".into(),
            skip_contracts: true,
            skip_framing: true,
            trader_notes: None,
        };
        let outcome = pipeline.run(request);
        assert!(matches!(outcome.terminal, TerminalState::Error(_)));
        assert_eq!(outcome.events.last().unwrap().tag(), "failed");
    }

    #[test]
    fn cancellation_before_solve_records_cancelled_audit() {
        engine_wal::registry::register(scenario_a_frame("pipeline_test_cancel")).ok();
        let (pipeline, _dir) = test_pipeline();
        let cancel = AtomicBool::new(true);
        let request = SolveRequest {
            variable_vector: vec![400.0, 300.0, 50.0, 2000.0],
            product_group: "pipeline_test_cancel".into(),
            mode: SolveMode::Solve,
            objective_mode: ObjectiveMode::MaxProfit,
            risk_aversion: 0.0,
            profit_floor: 0.0,
            n_scenarios: None,
            trader_id: None,
            trigger: "auto".into(),
            caller_reference: "call-3".into(),
            skip_contracts: true,
            skip_framing: true,
            trader_notes: None,
        };
        let outcome = pipeline.run_cancellable(request, &cancel);
        assert_eq!(outcome.terminal, TerminalState::Cancelled);
        let audit = pipeline.index().lock().unwrap().get(outcome.audit_id).cloned().unwrap();
        assert_eq!(audit.result_status(), ResultStatus::Cancelled);
    }

    #[test]
    fn run_many_executes_independent_requests_in_parallel() {
        engine_wal::registry::register(scenario_a_frame("pipeline_test_run_many")).ok();
        let (pipeline, _dir) = test_pipeline();
        let requests: Vec<SolveRequest> = (0..4)
            .map(|i| SolveRequest {
                variable_vector: vec![400.0, 300.0, 50.0, 2000.0],
                product_group: "pipeline_test_run_many".into(),
                mode: SolveMode::Solve,
                objective_mode: ObjectiveMode::MaxProfit,
                risk_aversion: 0.0,
                profit_floor: 0.0,
                n_scenarios: None,
                trader_id: None,
                trigger: "auto".into(),
                caller_reference: format!("call-{i}"),
                skip_contracts: true,
                skip_framing: true,
                trader_notes: None,
            })
            .collect();
        let outcomes = pipeline.run_many(requests, 2);
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| o.terminal == TerminalState::Done));
        assert_eq!(pipeline.index().lock().unwrap().len(), 4);
    }
}
