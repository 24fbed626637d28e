//! LP Core: builds and solves the route-allocation linear program for one
//! [`ModelDescriptor`] against one input [`VariableVector`] (§4.2).
//!
//! Route decision variables are tons shipped per route, `x_r >= 0`.
//! Per-route economics are derived from the live variable vector:
//!
//! - `margin_per_ton(r) = sell(r) - buy(r) - freight(r) - transit_cost(r)`,
//!   where `transit_cost(r) = route.transit_cost_per_day * route.base_transit_days`.
//! - `cost_per_ton(r) = buy(r) + freight(r)` — transit cost is charged
//!   against margin, not against the reported `cost` aggregate or the
//!   `capital` constraint row; this matches the source's accounting split
//!   between "margin" (fully loaded) and "cost" (purchase + freight only).
//!
//! # Objective modes (§4.2)
//!
//! Four of the five modes share one LP: maximize `Σ margin_r * tons_r`.
//! `max_roi`, `cvar_adjusted` and `min_risk` are specified as identical to
//! `max_profit` at the single-solve level — ROI, risk weighting by λ, and
//! the feasibility-rule asymmetry for `min_risk` are expressed only at the
//! Monte Carlo layer (`engine_lp::monte_carlo`), never inside the LP
//! itself. `risk_aversion` and `profit_floor` are therefore read from the
//! descriptor but not referenced by this module — see `DESIGN.md` for the
//! Open Question this resolves.
//!
//! Only `min_cost` builds a different objective: minimize `Σ cost_per_ton_r * tons_r`.
//!
//! # Outage reduction asymmetry
//!
//! When a constraint's `outage_idx` variable is set (`> 0.5`), its upper
//! bound is scaled by `outage_factor`. The floor (`bound_min_idx`) is
//! never scaled by an outage — a derate only ever tightens the ceiling,
//! reflecting that committed minimums don't relax just because capacity
//! is impaired. This asymmetry is intentional, not an oversight.

use good_lp::{constraint, variable, variables, Dual, Expression, Solution, SolverModel};

use engine_core::{Constraint, ConstraintKind, ModelDescriptor, ObjectiveMode, Route, SolveResult, SolveStatus, VariableVector};

use crate::solver_backend::solver;

/// Per-route profit margin per ton, independent of the LP outcome.
/// Always computed — §4.2's failure semantics require `margins` to be
/// populated even when the solve itself is infeasible or errors.
pub fn margins(descriptor: &ModelDescriptor, values: &VariableVector) -> Vec<f64> {
    descriptor
        .routes
        .iter()
        .map(|route| margin_per_ton(route, values))
        .collect()
}

fn margin_per_ton(route: &Route, values: &VariableVector) -> f64 {
    values[route.sell_idx as usize]
        - values[route.buy_idx as usize]
        - values[route.freight_idx as usize]
        - transit_cost(route)
}

/// Purchase + freight only — transit cost is excluded per §4.2's `cost`
/// aggregate and `min_cost`/`capital` definitions.
fn cost_per_ton(route: &Route, values: &VariableVector) -> f64 {
    values[route.buy_idx as usize] + values[route.freight_idx as usize]
}

fn transit_cost(route: &Route) -> f64 {
    route.transit_cost_per_day * route.base_transit_days
}

/// Per-route, per-constraint-row LP coefficient, keyed by constraint kind
/// (§4.2). `position` is the route's position within `constraint.route_indices`.
fn row_coefficient(
    kind: ConstraintKind,
    route: &Route,
    position: usize,
    custom: Option<&[f64]>,
) -> f64 {
    match kind {
        ConstraintKind::Supply | ConstraintKind::Demand => 1.0,
        ConstraintKind::Fleet => 1.0 / route.unit_capacity,
        ConstraintKind::Capital => 1.0, // multiplied by cost_per_ton at call site
        ConstraintKind::Custom => custom.map(|c| c[position]).unwrap_or(0.0),
    }
}

/// Resolve a constraint's effective upper bound, applying the outage
/// derate to the ceiling only (never the floor — see module docs).
/// Clamped to `>= 0` per §8's boundary behavior: a negative `bound_idx`
/// reading is treated as zero rather than building a negative-RHS row.
fn effective_upper_bound(constraint: &Constraint, values: &VariableVector) -> f64 {
    let base = values[constraint.bound_idx as usize];
    let scaled = match constraint.outage_idx {
        Some(idx) if values[idx as usize] > 0.5 => base * constraint.outage_factor,
        _ => base,
    };
    scaled.max(0.0)
}

fn effective_lower_bound(constraint: &Constraint, values: &VariableVector) -> f64 {
    constraint
        .bound_min_idx
        .map(|idx| values[idx as usize])
        .unwrap_or(0.0)
}

/// Run one LP solve. `values` must be the same length as
/// `descriptor.n_vars` (the caller is expected to have validated the
/// descriptor already).
pub fn solve(descriptor: &ModelDescriptor, values: &VariableVector) -> engine_core::EngineResult<SolveResult> {
    let row_margins = margins(descriptor, values);
    let n_routes = descriptor.routes.len();
    let n_constraints = descriptor.constraints.len();

    if n_routes == 0 {
        return Ok(SolveResult::zero_filled(SolveStatus::Optimal, 0, n_constraints, row_margins));
    }

    let mut vars = variables!();
    let route_vars: Vec<_> = (0..n_routes).map(|_| vars.add(variable().min(0.0))).collect();

    let profit_expr: Expression = descriptor
        .routes
        .iter()
        .zip(&route_vars)
        .map(|(route, &x)| margin_per_ton(route, values) * x)
        .sum();
    let cost_expr: Expression = descriptor
        .routes
        .iter()
        .zip(&route_vars)
        .map(|(route, &x)| cost_per_ton(route, values) * x)
        .sum();

    let objective: Expression = match descriptor.objective_mode {
        ObjectiveMode::MaxProfit
        | ObjectiveMode::MaxRoi
        | ObjectiveMode::CvarAdjusted
        | ObjectiveMode::MinRisk => -profit_expr.clone(),
        ObjectiveMode::MinCost => cost_expr.clone(),
    };

    let mut problem = vars.minimise(objective).using(solver());

    let mut constraint_refs = Vec::with_capacity(n_constraints);
    for constraint in &descriptor.constraints {
        let mut row: Expression = 0.into();
        for (position, &route_idx) in constraint.route_indices.iter().enumerate() {
            let route = &descriptor.routes[route_idx as usize];
            let x = route_vars[route_idx as usize];
            let coeff = match constraint.kind {
                ConstraintKind::Capital => cost_per_ton(route, values),
                kind => row_coefficient(kind, route, position, constraint.custom_coefficients.as_deref()),
            };
            row = row + coeff * x;
        }
        let upper = effective_upper_bound(constraint, values);
        let lower = effective_lower_bound(constraint, values);
        let upper_ref = problem.add_constraint(constraint!(row.clone() <= upper));
        if lower > 0.0 {
            problem = problem.with(constraint!(row.clone() >= lower));
        }
        constraint_refs.push(upper_ref);
    }

    let resolution = problem.solve();
    match resolution {
        Ok(solution) => {
            let route_tons: Vec<f64> = route_vars.iter().map(|&x| solution.value(x)).collect();
            let route_profits: Vec<f64> = descriptor
                .routes
                .iter()
                .zip(&route_tons)
                .map(|(route, &tons)| margin_per_ton(route, values) * tons)
                .collect();
            let profit: f64 = route_profits.iter().sum();
            let cost: f64 = descriptor
                .routes
                .iter()
                .zip(&route_tons)
                .map(|(route, &tons)| cost_per_ton(route, values) * tons)
                .sum();
            // Sub-ton allocations are rounding noise: excluded from the
            // `tons` aggregate but still reported per-route (§4.2 Extraction).
            let tons: f64 = route_tons.iter().filter(|&&t| t > 0.5).sum();
            let roi = if cost > 0.0 { profit / cost * 100.0 } else { 0.0 };
            let shadow_prices: Vec<f64> = constraint_refs.iter().map(|r| solution.dual(*r)).collect();

            Ok(SolveResult {
                status: SolveStatus::Optimal,
                profit,
                tons,
                cost,
                roi,
                route_tons,
                route_profits,
                margins: row_margins,
                shadow_prices,
            })
        }
        Err(good_lp::ResolutionError::Infeasible) => {
            Ok(SolveResult::zero_filled(SolveStatus::Infeasible, n_routes, n_constraints, row_margins))
        }
        Err(err) => {
            tracing::warn!(error = %err, "LP solver returned a non-infeasible error");
            Ok(SolveResult::zero_filled(SolveStatus::SolverError, n_routes, n_constraints, row_margins))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{ConstraintKind, PerturbationSpec, TransportMode};

    fn two_route_descriptor() -> ModelDescriptor {
        ModelDescriptor {
            n_vars: 6,
            routes: vec![
                Route {
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
                },
                Route {
                    id: "r1".into(),
                    origin: "A".into(),
                    destination: "C".into(),
                    mode: TransportMode::Rail,
                    sell_idx: 3,
                    buy_idx: 1,
                    freight_idx: 4,
                    base_transit_days: 2.0,
                    transit_cost_per_day: 0.0,
                    unit_capacity: 1000.0,
                },
            ],
            constraints: vec![Constraint {
                id: "supply".into(),
                kind: ConstraintKind::Supply,
                bound_idx: 5,
                bound_min_idx: None,
                outage_idx: None,
                outage_factor: 1.0,
                route_indices: vec![0, 1],
                custom_coefficients: None,
            }],
            objective_mode: ObjectiveMode::MaxProfit,
            risk_aversion: 0.0,
            profit_floor: 0.0,
            perturbations: vec![PerturbationSpec::identity(); 6],
        }
    }

    #[test]
    fn max_profit_prefers_higher_margin_route() {
        let descriptor = two_route_descriptor();
        // route 0: sell 50, buy 20, freight 5 -> margin 25
        // route 1: sell 60, buy 20, freight 5 -> margin 35
        let values = vec![50.0, 20.0, 5.0, 60.0, 5.0, 100.0];
        let result = solve(&descriptor, &values).unwrap();
        assert_eq!(result.status, SolveStatus::Optimal);
        assert!(result.route_tons[1] > result.route_tons[0]);
        assert!((result.profit - 3500.0).abs() < 1e-6);
    }

    #[test]
    fn zero_supply_bound_yields_zero_tons_not_infeasible() {
        let mut descriptor = two_route_descriptor();
        let values = vec![50.0, 20.0, 5.0, 60.0, 5.0, 0.0];
        descriptor.constraints[0].bound_idx = 5;
        let result = solve(&descriptor, &values).unwrap();
        assert_eq!(result.status, SolveStatus::Optimal);
        assert_eq!(result.tons, 0.0);
    }

    #[test]
    fn margins_are_computed_independent_of_solver_outcome() {
        let descriptor = two_route_descriptor();
        let values = vec![50.0, 20.0, 5.0, 60.0, 5.0, 100.0];
        let m = margins(&descriptor, &values);
        assert_eq!(m.len(), 2);
        assert!((m[0] - 25.0).abs() < 1e-9);
        assert!((m[1] - 35.0).abs() < 1e-9);
    }

    #[test]
    fn outage_derates_upper_bound_but_not_floor() {
        let mut descriptor = two_route_descriptor();
        descriptor.constraints[0].outage_idx = Some(1); // reuse an existing var slot as a flag
        descriptor.constraints[0].outage_factor = 0.5;
        descriptor.constraints[0].bound_min_idx = Some(1);
        let values = vec![50.0, 1.0, 5.0, 60.0, 5.0, 100.0];
        let upper = effective_upper_bound(&descriptor.constraints[0], &values);
        let lower = effective_lower_bound(&descriptor.constraints[0], &values);
        assert_eq!(upper, 50.0);
        assert_eq!(lower, 1.0);
    }

    #[test]
    fn negative_bound_is_clamped_to_zero() {
        let descriptor = two_route_descriptor();
        let values = vec![50.0, 20.0, 5.0, 60.0, 5.0, -100.0];
        let upper = effective_upper_bound(&descriptor.constraints[0], &values);
        assert_eq!(upper, 0.0);
    }

    /// Scenario A from §8: single route, trivially optimal.
    #[test]
    fn scenario_a_single_route_trivially_optimal() {
        let descriptor = ModelDescriptor {
            n_vars: 4,
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
                id: "supply".into(),
                kind: ConstraintKind::Supply,
                bound_idx: 3,
                bound_min_idx: None,
                outage_idx: None,
                outage_factor: 1.0,
                route_indices: vec![0],
                custom_coefficients: None,
            }],
            objective_mode: ObjectiveMode::MaxProfit,
            risk_aversion: 0.0,
            profit_floor: 0.0,
            perturbations: vec![PerturbationSpec::identity(); 4],
        };
        let values = vec![400.0, 300.0, 50.0, 2000.0];
        let result = solve(&descriptor, &values).unwrap();
        assert_eq!(result.status, SolveStatus::Optimal);
        assert!((result.tons - 2000.0).abs() < 1e-6);
        assert!((result.margins[0] - 50.0).abs() < 1e-9);
        assert!((result.profit - 100_000.0).abs() < 1e-3);
        assert!((result.cost - 700_000.0).abs() < 1e-3);
        assert!((result.roi - 14.2857).abs() < 1e-2);
        assert!((result.shadow_prices[0] - 50.0).abs() < 1e-3);
    }

    /// Scenario B from §8: an unsatisfiable floor makes the LP infeasible.
    #[test]
    fn scenario_b_floor_above_demand_is_infeasible() {
        let descriptor = ModelDescriptor {
            n_vars: 4,
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
                id: "demand".into(),
                kind: ConstraintKind::Demand,
                bound_idx: 3,
                bound_min_idx: Some(3),
                outage_idx: None,
                outage_factor: 1.0,
                route_indices: vec![0],
                custom_coefficients: None,
            }],
            objective_mode: ObjectiveMode::MaxProfit,
            risk_aversion: 0.0,
            profit_floor: 0.0,
            perturbations: vec![PerturbationSpec::identity(); 4],
        };
        // bound = 500 (upper), but bound_min_idx aliases the same variable
        // so we instead drive the scenario with distinct values: model a
        // floor above the ceiling by giving the floor its own constant.
        let mut descriptor = descriptor;
        descriptor.constraints[0].bound_min_idx = None;
        // Emulate floor=1500 > bound=500 using a second variable slot.
        descriptor.n_vars = 5;
        descriptor.perturbations.push(PerturbationSpec::identity());
        descriptor.constraints[0].bound_idx = 3;
        descriptor.constraints[0].bound_min_idx = Some(4);
        let values = vec![400.0, 300.0, 50.0, 500.0, 1500.0];
        let result = solve(&descriptor, &values).unwrap();
        assert_eq!(result.status, SolveStatus::Infeasible);
        assert_eq!(result.profit, 0.0);
        assert_eq!(result.cost, 0.0);
        assert!((result.margins[0] - 50.0).abs() < 1e-9);
    }

    /// Scenario C from §8: an outage halves the effective supply ceiling.
    #[test]
    fn scenario_c_outage_modifier_halves_ceiling() {
        let descriptor = ModelDescriptor {
            n_vars: 5,
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
                id: "supply".into(),
                kind: ConstraintKind::Supply,
                bound_idx: 3,
                bound_min_idx: None,
                outage_idx: Some(4),
                outage_factor: 0.5,
                route_indices: vec![0],
                custom_coefficients: None,
            }],
            objective_mode: ObjectiveMode::MaxProfit,
            risk_aversion: 0.0,
            profit_floor: 0.0,
            perturbations: vec![PerturbationSpec::identity(); 5],
        };
        let values = vec![400.0, 300.0, 50.0, 2000.0, 1.0];
        let result = solve(&descriptor, &values).unwrap();
        assert_eq!(result.status, SolveStatus::Optimal);
        assert!(result.tons <= 1000.0 + 1e-6);
        assert!((result.tons - 1000.0).abs() < 1e-6);
        assert!(result.shadow_prices[0] > 0.0);
    }

    #[test]
    fn max_roi_and_cvar_and_min_risk_match_max_profit_single_solve() {
        let descriptor = two_route_descriptor();
        let values = vec![50.0, 20.0, 5.0, 60.0, 5.0, 100.0];
        let base = solve(&descriptor, &values).unwrap();
        for mode in [ObjectiveMode::MaxRoi, ObjectiveMode::CvarAdjusted, ObjectiveMode::MinRisk] {
            let mut d = descriptor.clone();
            d.objective_mode = mode;
            let r = solve(&d, &values).unwrap();
            assert!((r.profit - base.profit).abs() < 1e-6, "mode {mode:?} diverged");
            assert!((r.tons - base.tons).abs() < 1e-6);
        }
    }

    #[test]
    fn min_cost_transacts_only_when_compelled_by_a_floor() {
        let mut descriptor = two_route_descriptor();
        descriptor.objective_mode = ObjectiveMode::MinCost;
        descriptor.routes[0].transit_cost_per_day = 1_000_000.0; // should not affect min_cost choice
        let values = vec![50.0, 20.0, 5.0, 60.0, 5.0, 100.0];
        let result = solve(&descriptor, &values).unwrap();
        assert_eq!(result.status, SolveStatus::Optimal);
        // nothing compels a min-cost solve to transact: zero tons costs zero,
        // strictly less than shipping anything at a positive buy+freight cost.
        assert_eq!(result.tons, 0.0);
        assert_eq!(result.profit, 0.0);
    }

    #[test]
    fn min_cost_with_a_floor_picks_the_cheapest_route() {
        let mut descriptor = two_route_descriptor();
        descriptor.objective_mode = ObjectiveMode::MinCost;
        // route 0: buy 20, freight 5 -> cost/ton 25
        // route 1: buy 20, freight 20 -> cost/ton 40
        descriptor.constraints[0].bound_min_idx = Some(5); // floor == ceiling == 100
        let values = vec![50.0, 20.0, 5.0, 60.0, 20.0, 100.0];
        let result = solve(&descriptor, &values).unwrap();
        assert_eq!(result.status, SolveStatus::Optimal);
        assert!((result.tons - 100.0).abs() < 1e-6);
        assert!(result.route_tons[0] > result.route_tons[1]); // cheaper route preferred
        assert!((result.cost - 2500.0).abs() < 1e-3);
    }

    #[test]
    fn fleet_coefficient_is_inverse_unit_capacity_only() {
        let route = Route {
            id: "r0".into(),
            origin: "A".into(),
            destination: "B".into(),
            mode: TransportMode::Barge,
            sell_idx: 0,
            buy_idx: 1,
            freight_idx: 2,
            base_transit_days: 7.0,
            transit_cost_per_day: 0.0,
            unit_capacity: 40.0,
        };
        let coeff = row_coefficient(ConstraintKind::Fleet, &route, 0, None);
        assert!((coeff - 1.0 / 40.0).abs() < 1e-12);
    }
}
