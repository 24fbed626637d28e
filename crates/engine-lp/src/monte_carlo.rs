//! Monte Carlo Runner: drives N correlated scenarios through LP Core and
//! summarizes the resulting profit/cost/ROI distribution (§4.4).
//!
//! # Feasibility asymmetry (§9 Open Question, preserved as-specified)
//!
//! The per-scenario inclusion rule differs by objective mode and is not
//! generalized further:
//!
//! - `min_risk`, `min_cost`: every `optimal` scenario is included,
//!   regardless of the sign of its metric.
//! - `max_profit`, `max_roi`, `cvar_adjusted`: a scenario is included only
//!   when its metric is strictly positive.
//!
//! `feasible_count` is the size of the included set; `infeasible_count`
//! is everything else out of `n_scenarios` — a non-optimal solve and an
//! optimal-but-metric-excluded scenario are both "not feasible" for
//! reporting purposes, matching §8 Scenario D's invariant
//! `n_feasible + n_infeasible == n_scenarios`.

use engine_core::{
    EngineResult, ModelDescriptor, MonteCarloResult, ObjectiveMode, SignalThresholds, SolveResult,
    SolveStatus, VariableVector,
};

use crate::perturb::perturb;
use crate::rng::DeterministicRng;
use crate::solve::solve;

/// Derive the two 64-bit seed chunks from a center vector (§4.3): the
/// first two variables' bit patterns, zero-padded if the vector is
/// shorter than two elements.
fn seed_chunks(center: &VariableVector) -> (u64, u64) {
    let a = center.first().map(|v| v.to_bits()).unwrap_or(0);
    let b = center.get(1).map(|v| v.to_bits()).unwrap_or(0);
    (a, b)
}

fn metric(mode: ObjectiveMode, result: &SolveResult) -> f64 {
    match mode {
        ObjectiveMode::MaxProfit | ObjectiveMode::CvarAdjusted | ObjectiveMode::MinRisk => result.profit,
        ObjectiveMode::MinCost => -result.cost,
        ObjectiveMode::MaxRoi => result.roi,
    }
}

fn includes(mode: ObjectiveMode, m: f64) -> bool {
    match mode {
        ObjectiveMode::MinRisk | ObjectiveMode::MinCost => true,
        ObjectiveMode::MaxProfit | ObjectiveMode::MaxRoi | ObjectiveMode::CvarAdjusted => m > 0.0,
    }
}

/// Run N scenarios and summarize the resulting distribution. `n_requested`
/// is clamped to [`crate::MAX_SCENARIOS`].
pub fn run(
    descriptor: &ModelDescriptor,
    center: &VariableVector,
    n_requested: u32,
    thresholds: &SignalThresholds,
) -> EngineResult<MonteCarloResult> {
    let n = n_requested.min(crate::MAX_SCENARIOS);
    let n_vars = descriptor.n_vars as usize;
    let (seed_a, seed_b) = seed_chunks(center);
    let mut rng = DeterministicRng::seed_from_chunks(seed_a, seed_b);

    // (metric, scenario vector) pairs for every scenario included per the
    // mode's feasibility rule.
    let mut feasible: Vec<(f64, VariableVector)> = Vec::with_capacity(n as usize);

    for _ in 0..n {
        let scenario_vars = perturb(center, descriptor, &mut rng);
        let result = solve(descriptor, &scenario_vars)?;
        if result.status != SolveStatus::Optimal {
            continue;
        }
        let m = metric(descriptor.objective_mode, &result);
        if includes(descriptor.objective_mode, m) {
            feasible.push((m, scenario_vars));
        }
    }

    let feasible_count = feasible.len() as u32;
    let infeasible_count = n - feasible_count;

    if feasible.is_empty() {
        let signal = thresholds.classify(0.0, 0.0, 0.0);
        return Ok(MonteCarloResult::zero_filled(n_vars, infeasible_count, signal));
    }

    // Sort by metric ascending; pair-preserving, so the per-variable
    // correlation computed below over the same pairing is unaffected by
    // the sort (Pearson correlation is order-invariant under a shared
    // permutation of both series).
    feasible.sort_by(|a, b| a.0.total_cmp(&b.0));

    let nf = feasible.len();
    let metrics: Vec<f64> = feasible.iter().map(|(m, _)| *m).collect();
    let mean = metrics.iter().sum::<f64>() / nf as f64;
    let variance = metrics.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / nf as f64;
    let stddev = variance.sqrt();
    let min = metrics[0];
    let max = metrics[nf - 1];

    let quantile = |q: f64| -> f64 {
        let idx = ((nf as f64) * q).floor() as usize;
        let idx = idx.min(nf - 1);
        metrics[idx]
    };
    let p5 = quantile(0.05);
    let p25 = quantile(0.25);
    let p50 = quantile(0.50);
    let p75 = quantile(0.75);
    let p95 = quantile(0.95);

    let mut sensitivity = vec![0.0; n_vars];
    for (i, s) in sensitivity.iter_mut().enumerate() {
        let xs: Vec<f64> = feasible.iter().map(|(_, vars)| vars[i]).collect();
        *s = pearson(&xs, &metrics);
    }

    let signal = thresholds.classify(p5, p25, p50);

    Ok(MonteCarloResult {
        feasible_count,
        infeasible_count,
        mean,
        stddev,
        p5,
        p25,
        p50,
        p75,
        p95,
        min,
        max,
        sensitivity,
        signal,
    })
}

/// Pearson correlation coefficient, preserving sign. Returns `0.0` when
/// either series has zero variance (including the single-sample case)
/// rather than dividing by zero.
fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = xs[i] - mean_x;
        let dy = ys[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}
