//! # engine-core: shared data model for the trading decision engine
//!
//! Provides the fundamental, wire-format-agnostic data structures shared by
//! the codec, the LP/Monte Carlo engine, the solve pipeline, and the audit
//! log: [`Variable`], [`Route`], [`Constraint`], [`ModelDescriptor`],
//! [`SolveResult`], and [`MonteCarloResult`].
//!
//! ## Design philosophy
//!
//! A [`ModelDescriptor`] fully specifies one LP instance: its variables,
//! routes, constraints, objective mode, and Monte Carlo perturbation specs.
//! It carries no wire-format concerns (that's `engine-wire::codec`) and no
//! solver concerns (that's `engine-lp`) — it is the shared vocabulary both
//! depend on.
//!
//! ## Wire-format maxima (§6.1)
//!
//! A descriptor's counts are bounded so that the binary codec's length
//! headers never overflow their fields:
//!
//! - [`MAX_VARS`] variables
//! - [`MAX_ROUTES`] routes
//! - [`MAX_CONSTRAINTS`] constraints
//! - [`MAX_CORRELATIONS`] correlation links per perturbed variable
//!
//! ## Modules
//!
//! - [`error`] — the unified [`error::EngineError`] taxonomy
//! - [`fmt`] — deterministic fixed-precision numeric formatting
//! - [`ids`] — append-only opaque identifier generation
//! - [`anon`] — deterministic anonymization substitution tables

use serde::{Deserialize, Serialize};

pub mod anon;
pub mod error;
pub mod fmt;
pub mod ids;

pub use error::{EngineError, EngineResult};

/// Maximum number of variables a descriptor may declare (§6.1).
pub const MAX_VARS: usize = 64;
/// Maximum number of routes a descriptor may declare (§6.1).
pub const MAX_ROUTES: usize = 16;
/// Maximum number of constraints a descriptor may declare (§6.1).
pub const MAX_CONSTRAINTS: usize = 32;
/// Maximum number of correlation links per perturbed variable (§6.1).
pub const MAX_CORRELATIONS: usize = 8;

/// Sentinel for "absent" index fields in the wire format (`bound_min_idx`,
/// `outage_idx`).
pub const ABSENT_INDEX: u8 = 0xFF;

/// Semantic kind of a [`Variable`].
///
/// Boolean variables are encoded as 0.0/1.0 at the wire layer; the kind
/// only affects interpretation (perturbation flips, not storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Continuous,
    Boolean,
}

/// A single live input to a solve: a market price, a hydrology reading, a
/// fleet count, and so on.
///
/// Invariant: every variable referenced by a [`Route`] or [`Constraint`]
/// must exist in the owning [`crate::VariableFrame`]-like registry; this
/// crate doesn't enforce that itself since it has no notion of "the
/// registry for product group X" (see `engine-wal::registry`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub symbol: String,
    pub label: String,
    pub unit: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub source: String,
    pub group: String,
    pub kind: VariableKind,
}

/// Transport mode of a [`Route`]. Free-form at the wire layer today but
/// kept as a small enum here so callers don't pass arbitrary strings
/// around; extend as new modes are onboarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Barge,
    Rail,
    Truck,
    Vessel,
    Pipeline,
}

/// An origin-destination transport lane expressed as a decision variable
/// in the LP. Indices (`sell_idx`, `buy_idx`, `freight_idx`) refer to
/// [`Variable`] positions in the owning descriptor's variable list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub mode: TransportMode,
    pub sell_idx: u8,
    pub buy_idx: u8,
    pub freight_idx: u8,
    pub base_transit_days: f64,
    pub transit_cost_per_day: f64,
    /// Tons per physical unit. Invariant: `> 0`.
    pub unit_capacity: f64,
}

/// Constraint kind; determines how the row's per-route coefficients are
/// computed against the current variable vector (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Supply,
    Demand,
    Fleet,
    Capital,
    Custom,
}

/// A single row of the LP. `route_indices` are positions into the owning
/// descriptor's route list; `custom_coefficients`, when present, has the
/// same length and order as `route_indices` and is only meaningful for
/// [`ConstraintKind::Custom`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    pub kind: ConstraintKind,
    /// Variable index supplying the upper bound.
    pub bound_idx: u8,
    /// Optional variable index supplying the lower bound ("floor"). `None`
    /// means the lower bound is 0.
    pub bound_min_idx: Option<u8>,
    /// Optional variable index gating an outage reduction of the upper bound.
    pub outage_idx: Option<u8>,
    /// Multiplier applied to the upper bound when the outage variable is
    /// set and `> 0.5`. Unused unless `outage_idx` is `Some`.
    pub outage_factor: f64,
    pub route_indices: Vec<u8>,
    pub custom_coefficients: Option<Vec<f64>>,
}

/// One correlation link inside a [`PerturbationSpec`]: when the source
/// variable moves by δ in pass 1 of the Perturbation Engine, this
/// variable's value is nudged by `coefficient * δ` in pass 2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationLink {
    pub var_idx: u8,
    pub coefficient: f64,
}

/// Per-variable Monte Carlo perturbation spec (§4.3).
///
/// When `sigma == 0.0`, `lo` doubles as a flip probability in `[0, 1]` for
/// boolean variables (§3 encoding convention) — the field isn't renamed
/// because the wire format stores it in the same slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationSpec {
    pub sigma: f64,
    pub lo: f64,
    pub hi: f64,
    pub correlations: Vec<CorrelationLink>,
}

impl PerturbationSpec {
    pub fn identity() -> Self {
        Self {
            sigma: 0.0,
            lo: 0.0,
            hi: 0.0,
            correlations: Vec::new(),
        }
    }

    /// `true` when this spec is a no-op: σ = 0 and no flip probability.
    pub fn is_identity(&self) -> bool {
        self.sigma == 0.0 && self.lo == 0.0
    }
}

/// Which of the five objective modes a solve runs under (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveMode {
    MaxProfit,
    MinCost,
    MaxRoi,
    CvarAdjusted,
    MinRisk,
}

impl ObjectiveMode {
    pub fn from_wire(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::MaxProfit),
            1 => Some(Self::MinCost),
            2 => Some(Self::MaxRoi),
            3 => Some(Self::CvarAdjusted),
            4 => Some(Self::MinRisk),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::MaxProfit => 0,
            Self::MinCost => 1,
            Self::MaxRoi => 2,
            Self::CvarAdjusted => 3,
            Self::MinRisk => 4,
        }
    }
}

/// The complete, decoded specification of an LP instance (§3, §4.1).
///
/// Invariants enforced by [`ModelDescriptor::validate`]: route, constraint
/// and perturbation counts stay under the wire-format maxima; every
/// variable index referenced anywhere is `< n_vars`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub n_vars: u16,
    pub routes: Vec<Route>,
    pub constraints: Vec<Constraint>,
    pub objective_mode: ObjectiveMode,
    pub risk_aversion: f64,
    pub profit_floor: f64,
    /// One entry per variable, in variable-index order. Variables with no
    /// perturbation carry [`PerturbationSpec::identity`].
    pub perturbations: Vec<PerturbationSpec>,
}

impl ModelDescriptor {
    /// Re-validates structural invariants independent of decoding — useful
    /// when a descriptor is constructed programmatically instead of
    /// decoded from bytes.
    pub fn validate(&self) -> EngineResult<()> {
        if self.n_vars as usize > MAX_VARS {
            return Err(EngineError::BadInput(format!(
                "n_vars {} exceeds maximum {}",
                self.n_vars, MAX_VARS
            )));
        }
        if self.routes.len() > MAX_ROUTES {
            return Err(EngineError::BadInput(format!(
                "route count {} exceeds maximum {}",
                self.routes.len(),
                MAX_ROUTES
            )));
        }
        if self.constraints.len() > MAX_CONSTRAINTS {
            return Err(EngineError::BadInput(format!(
                "constraint count {} exceeds maximum {}",
                self.constraints.len(),
                MAX_CONSTRAINTS
            )));
        }
        if self.perturbations.len() != self.n_vars as usize {
            return Err(EngineError::BadInput(format!(
                "perturbation count {} does not match n_vars {}",
                self.perturbations.len(),
                self.n_vars
            )));
        }
        let check_idx = |idx: u8| -> EngineResult<()> {
            if idx as u16 >= self.n_vars {
                return Err(EngineError::BadInput(format!(
                    "variable index {idx} out of range for n_vars {}",
                    self.n_vars
                )));
            }
            Ok(())
        };
        for route in &self.routes {
            check_idx(route.sell_idx)?;
            check_idx(route.buy_idx)?;
            check_idx(route.freight_idx)?;
            if route.unit_capacity <= 0.0 {
                return Err(EngineError::BadInput(format!(
                    "route {} has non-positive unit capacity",
                    route.id
                )));
            }
        }
        for constraint in &self.constraints {
            check_idx(constraint.bound_idx)?;
            if let Some(idx) = constraint.bound_min_idx {
                check_idx(idx)?;
            }
            if let Some(idx) = constraint.outage_idx {
                check_idx(idx)?;
            }
            if constraint.route_indices.len() > MAX_ROUTES {
                return Err(EngineError::BadInput(format!(
                    "constraint {} spans more routes than the maximum",
                    constraint.id
                )));
            }
            for &r in &constraint.route_indices {
                if r as usize >= self.routes.len() {
                    return Err(EngineError::BadInput(format!(
                        "constraint {} references out-of-range route {r}",
                        constraint.id
                    )));
                }
            }
            if let Some(coeffs) = &constraint.custom_coefficients {
                if coeffs.len() != constraint.route_indices.len() {
                    return Err(EngineError::BadInput(format!(
                        "constraint {} has {} coefficients for {} routes",
                        constraint.id,
                        coeffs.len(),
                        constraint.route_indices.len()
                    )));
                }
            }
        }
        for spec in &self.perturbations {
            if spec.correlations.len() > MAX_CORRELATIONS {
                return Err(EngineError::BadInput(
                    "perturbation spec exceeds maximum correlation links".into(),
                ));
            }
            for link in &spec.correlations {
                check_idx(link.var_idx)?;
            }
        }
        Ok(())
    }
}

/// Length-`n_vars` sequence of live inputs; semantic kind is inherited
/// from the matching [`Variable`] in the registry.
pub type VariableVector = Vec<f64>;

/// Outcome of one LP Core solve (§3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    SolverError,
    BadInput,
}

/// Full result of one LP Core solve. Aggregates are zero-filled on
/// non-optimal outcomes except `margins`, which is always computed
/// (§4.2 Failure semantics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub status: SolveStatus,
    pub profit: f64,
    pub tons: f64,
    pub cost: f64,
    pub roi: f64,
    /// Per-route tons, in route order; unlike the `tons` aggregate this
    /// includes sub-ton values.
    pub route_tons: Vec<f64>,
    pub route_profits: Vec<f64>,
    pub margins: Vec<f64>,
    /// Per-constraint shadow price (LP dual), in constraint order.
    pub shadow_prices: Vec<f64>,
}

impl SolveResult {
    /// A zero-filled result for the given status, with `margins` supplied
    /// separately since those are always computed regardless of status.
    pub fn zero_filled(status: SolveStatus, n_routes: usize, n_constraints: usize, margins: Vec<f64>) -> Self {
        Self {
            status,
            profit: 0.0,
            tons: 0.0,
            cost: 0.0,
            roi: 0.0,
            route_tons: vec![0.0; n_routes],
            route_profits: vec![0.0; n_routes],
            margins,
            shadow_prices: vec![0.0; n_constraints],
        }
    }
}

/// Discrete classification of a Monte Carlo distribution against
/// product-group thresholds (§4.4, Scenario F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    StrongGo,
    Go,
    Cautious,
    Weak,
    NoGo,
}

/// Per-product-group signal thresholds (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    pub strong_go: f64,
    pub go: f64,
    pub weak: f64,
}

impl SignalThresholds {
    /// Pure total function of `(p5, p25, p50, thresholds)` (Testable
    /// Properties §8 item 8). Order of the rule matters: strong_go is
    /// tried before go, go before the p50 > 0 cautious check, and so on.
    pub fn classify(&self, p5: f64, p25: f64, p50: f64) -> Signal {
        if p5 > self.strong_go {
            Signal::StrongGo
        } else if p25 > self.go {
            Signal::Go
        } else if p50 > 0.0 {
            Signal::Cautious
        } else if p50 > self.weak {
            Signal::Weak
        } else {
            Signal::NoGo
        }
    }
}

/// Result of one Monte Carlo run (§3, §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub feasible_count: u32,
    pub infeasible_count: u32,
    pub mean: f64,
    pub stddev: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
    /// One Pearson coefficient per variable, in variable-index order.
    pub sensitivity: Vec<f64>,
    pub signal: Signal,
}

impl MonteCarloResult {
    /// A zero-filled result for when the feasible set is empty (§8
    /// boundary behavior: "no crash, no negative percentiles from empty
    /// sort").
    pub fn zero_filled(n_vars: usize, infeasible_count: u32, signal: Signal) -> Self {
        Self {
            feasible_count: 0,
            infeasible_count,
            mean: 0.0,
            stddev: 0.0,
            p5: 0.0,
            p25: 0.0,
            p50: 0.0,
            p75: 0.0,
            p95: 0.0,
            min: 0.0,
            max: 0.0,
            sensitivity: vec![0.0; n_vars],
            signal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_descriptor() -> ModelDescriptor {
        ModelDescriptor {
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
                id: "c0".into(),
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
        }
    }

    #[test]
    fn valid_descriptor_passes() {
        assert!(simple_descriptor().validate().is_ok());
    }

    #[test]
    fn out_of_range_variable_index_rejected() {
        let mut d = simple_descriptor();
        d.routes[0].sell_idx = 9;
        assert!(matches!(d.validate(), Err(EngineError::BadInput(_))));
    }

    #[test]
    fn zero_unit_capacity_rejected() {
        let mut d = simple_descriptor();
        d.routes[0].unit_capacity = 0.0;
        assert!(d.validate().is_err());
    }

    #[test]
    fn signal_thresholds_follow_ordered_rule() {
        let t = SignalThresholds {
            strong_go: 50_000.0,
            go: 30_000.0,
            weak: -10_000.0,
        };
        assert_eq!(t.classify(60_000.0, 0.0, 0.0), Signal::StrongGo);
        assert_eq!(t.classify(10_000.0, 35_000.0, 0.0), Signal::Go);
        assert_eq!(t.classify(-5_000.0, 0.0, 5_000.0), Signal::Cautious);
        assert_eq!(t.classify(-20_000.0, -20_000.0, -5_000.0), Signal::Weak);
        assert_eq!(t.classify(-50_000.0, -50_000.0, -20_000.0), Signal::NoGo);
    }
}
