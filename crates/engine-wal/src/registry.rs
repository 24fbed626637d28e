//! Variable Frame Registry (§4.6, §9): a process-wide, write-once-per-
//! product-group table of what each product group's LP looks like —
//! variables, routes, constraints, signal thresholds, perturbation
//! defaults, poll cadence, and short aliases.
//!
//! Grounded directly in the teacher's `gat_core::solver::registry`
//! `SolverRegistry` pattern: a `Lazy<RwLock<_>>` behind free functions,
//! never a type callers instantiate themselves.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use engine_core::{Constraint, PerturbationSpec, Route, SignalThresholds, Variable};

use crate::error::{WalError, WalResult};

/// A normalized product group handle — the registry's typed analogue of
/// the teacher's `SolverKind`, standing in for a `&'static str` key since
/// product groups are registered at runtime rather than compiled in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductGroup(String);

impl ProductGroup {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(normalize(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One product group's complete variable frame.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VariableFrame {
    pub product_group: String,
    pub variables: Vec<Variable>,
    pub routes: Vec<Route>,
    pub constraints: Vec<Constraint>,
    pub signal_thresholds: SignalThresholds,
    /// One entry per variable, in variable-index order, used as the
    /// Perturbation Engine's default when a caller doesn't override it.
    pub perturbation_defaults: Vec<PerturbationSpec>,
    pub poll_interval_seconds: u64,
    /// Short display alias -> backing variable symbol.
    pub short_aliases: HashMap<String, String>,
}

impl VariableFrame {
    pub fn variable_index(&self, symbol: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.symbol == symbol)
    }

    pub fn resolve_alias(&self, alias: &str) -> Option<&str> {
        self.short_aliases.get(alias).map(|s| s.as_str())
    }
}

static REGISTRY: Lazy<RwLock<HashMap<ProductGroup, VariableFrame>>> = Lazy::new(|| RwLock::new(HashMap::new()));

fn normalize(product_group: &str) -> String {
    product_group.trim().to_lowercase()
}

/// Register a product group's frame. Product groups are write-once: a
/// second registration under the same (case-insensitive) name errors
/// instead of silently overwriting the first (§4.6).
pub fn register(frame: VariableFrame) -> WalResult<()> {
    let key = ProductGroup::new(&frame.product_group);
    let mut registry = REGISTRY.write().expect("variable frame registry poisoned");
    if registry.contains_key(&key) {
        return Err(WalError::DuplicateProductGroup(frame.product_group.clone()));
    }
    registry.insert(key, frame);
    Ok(())
}

/// Fetch a clone of the registered frame for `product_group`.
pub fn frame_for(product_group: &str) -> WalResult<VariableFrame> {
    let key = ProductGroup::new(product_group);
    let registry = REGISTRY.read().expect("variable frame registry poisoned");
    registry
        .get(&key)
        .cloned()
        .ok_or_else(|| WalError::UnknownProductGroup(product_group.to_string()))
}

pub fn is_registered(product_group: &str) -> bool {
    let key = ProductGroup::new(product_group);
    REGISTRY.read().expect("variable frame registry poisoned").contains_key(&key)
}

/// Every registered product group name, sorted.
pub fn available() -> Vec<String> {
    let registry = REGISTRY.read().expect("variable frame registry poisoned");
    let mut names: Vec<String> = registry.values().map(|f| f.product_group.clone()).collect();
    names.sort();
    names
}
