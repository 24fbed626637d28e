//! Deterministic fixed-precision numeric formatting.
//!
//! Anything written to the audit log, the CLI, or a snapshot diff goes
//! through here rather than `{}` or `{:?}` so re-runs produce byte-identical
//! text regardless of platform float-printing quirks.

/// Format a dollar-denominated quantity to 2 decimal places.
pub fn money(value: f64) -> String {
    format!("{value:.2}")
}

/// Format a tonnage quantity to 3 decimal places.
pub fn tons(value: f64) -> String {
    format!("{value:.3}")
}

/// Format a ratio (ROI, correlation coefficient) to 4 decimal places.
pub fn ratio(value: f64) -> String {
    format!("{value:.4}")
}

/// Format a percentile/probability in `[0, 1]` as a percentage to 1 decimal.
pub fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}
