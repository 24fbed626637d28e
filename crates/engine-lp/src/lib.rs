//! engine-lp: LP Core, Perturbation Engine and Monte Carlo Runner (§4.2–§4.4).
//!
//! This crate owns every CPU-bound computation in the system: it builds
//! and solves one route-allocation LP per call ([`solve::solve`]), draws
//! one correlated scenario from a center vector ([`perturb::perturb`]),
//! and drives N scenarios through both to produce a risk distribution
//! ([`monte_carlo::run`]).
//!
//! None of this crate suspends — the enclosing pipeline (`engine-pipeline`)
//! is responsible for everything that touches the network or disk.

pub mod monte_carlo;
pub mod perturb;
pub mod rng;
pub mod solve;
pub mod solver_backend;

pub use monte_carlo::run as run_monte_carlo;
pub use perturb::perturb;
pub use solve::solve;

/// Hard cap on requested Monte Carlo scenario count, independent of any
/// caller-supplied `N` (§4.4: "requested scenario count N (clamped to a
/// compile-time maximum)").
pub const MAX_SCENARIOS: u32 = 100_000;
