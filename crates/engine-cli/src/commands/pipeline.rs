//! `engctl pipeline run`: drive one request through the Solve Pipeline
//! (§4.5) against a fresh in-memory Audit Index and an on-disk WAL
//! directory, using the null collaborator fixture (§4.5's contract
//! freshness / ingest / framing collaborators are external adapters out
//! of scope for this core — see SPEC_FULL.md §1).

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::Deserialize;

use engine_core::{ObjectiveMode, VariableVector};
use engine_pipeline::{Collaborators, Pipeline, SolveRequest};
use engine_wal::{AuditIndex, SolveMode, WalAppender};

/// JSON-shaped mirror of [`SolveRequest`] — the CLI's own DTO since the
/// pipeline type itself carries no `Deserialize` impl (it's constructed
/// by callers inside a process, not read off disk).
#[derive(Deserialize)]
struct SolveRequestDto {
    variable_vector: VariableVector,
    product_group: String,
    mode: String,
    objective_mode: String,
    #[serde(default)]
    risk_aversion: f64,
    #[serde(default)]
    profit_floor: f64,
    #[serde(default)]
    n_scenarios: Option<u32>,
    #[serde(default)]
    trader_id: Option<String>,
    #[serde(default = "default_trigger")]
    trigger: String,
    #[serde(default)]
    caller_reference: String,
    #[serde(default)]
    skip_contracts: bool,
    #[serde(default)]
    skip_framing: bool,
    #[serde(default)]
    trader_notes: Option<String>,
}

fn default_trigger() -> String {
    "manual".to_string()
}

fn parse_objective_mode(s: &str) -> Result<ObjectiveMode> {
    Ok(match s {
        "max_profit" => ObjectiveMode::MaxProfit,
        "min_cost" => ObjectiveMode::MinCost,
        "max_roi" => ObjectiveMode::MaxRoi,
        "cvar_adjusted" => ObjectiveMode::CvarAdjusted,
        "min_risk" => ObjectiveMode::MinRisk,
        other => anyhow::bail!("unknown objective_mode '{other}'"),
    })
}

fn parse_solve_mode(s: &str) -> Result<SolveMode> {
    Ok(match s {
        "solve" => SolveMode::Solve,
        "monte_carlo" => SolveMode::MonteCarlo,
        other => anyhow::bail!("unknown mode '{other}'"),
    })
}

pub fn run(request: &Path, wal_dir: &Path) -> Result<()> {
    let json = fs::read_to_string(request).with_context(|| format!("reading {}", request.display()))?;
    let dto: SolveRequestDto = serde_json::from_str(&json).context("parsing solve request JSON")?;

    let solve_request = SolveRequest {
        variable_vector: dto.variable_vector,
        product_group: dto.product_group,
        mode: parse_solve_mode(&dto.mode)?,
        objective_mode: parse_objective_mode(&dto.objective_mode)?,
        risk_aversion: dto.risk_aversion,
        profit_floor: dto.profit_floor,
        n_scenarios: dto.n_scenarios,
        trader_id: dto.trader_id,
        trigger: dto.trigger,
        caller_reference: dto.caller_reference,
        skip_contracts: dto.skip_contracts,
        skip_framing: dto.skip_framing,
        trader_notes: dto.trader_notes,
    };

    fs::create_dir_all(wal_dir).with_context(|| format!("creating {}", wal_dir.display()))?;
    let wal = WalAppender::open(wal_dir).context("opening WAL directory")?;
    let pipeline = Pipeline::new(Collaborators::null(), Arc::new(Mutex::new(AuditIndex::new())), Arc::new(Mutex::new(wal)));

    let outcome = pipeline.run(solve_request);
    for event in &outcome.events {
        println!("[{}] {}", event.run_id(), event.tag());
    }
    println!("terminal: {:?}", outcome.terminal);
    println!("audit_id: {}", outcome.audit_id);

    let index = pipeline.index().lock().expect("audit index poisoned");
    if let Some(audit) = index.get(outcome.audit_id) {
        println!("{}", serde_json::to_string_pretty(audit)?);
    }
    Ok(())
}
