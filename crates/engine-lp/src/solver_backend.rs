//! Selects the `good_lp` backend at compile time.
//!
//! HiGHS is the default: unlike Clarabel, it exposes row dual values
//! through `good_lp`'s `Dual` trait, which the LP Core needs for shadow
//! prices (§4.2). Clarabel remains available behind a feature flag for
//! environments where the HiGHS native library can't be linked, but it
//! cannot report shadow prices — `solve()` will return zeros for
//! `shadow_prices` in that configuration.

#[cfg(feature = "solver-highs")]
pub use good_lp::solvers::highs::highs as solver;

#[cfg(all(feature = "solver-clarabel", not(feature = "solver-highs")))]
pub use good_lp::solvers::clarabel::clarabel as solver;
