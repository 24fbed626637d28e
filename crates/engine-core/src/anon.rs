//! Deterministic anonymization of free-text identifiers.
//!
//! Audit records and WAL snapshots are sometimes exported for cross-desk
//! review where route origins, destinations, and counterparties must be
//! scrubbed while preserving their identity for joins (the same origin
//! string always maps to the same alias within one [`AnonTable`]).

use std::collections::HashMap;

/// A substitution table built up as unfamiliar strings are seen, assigning
/// each a stable, ordinal-based alias.
#[derive(Debug, Default, Clone)]
pub struct AnonTable {
    prefix: String,
    forward: HashMap<String, String>,
}

impl AnonTable {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            forward: HashMap::new(),
        }
    }

    /// Returns the alias for `value`, minting and recording a new one on
    /// first sight. Stable for the lifetime of this table.
    pub fn alias(&mut self, value: &str) -> String {
        if let Some(existing) = self.forward.get(value) {
            return existing.clone();
        }
        let alias = format!("{}-{:04}", self.prefix, self.forward.len());
        self.forward.insert(value.to_string(), alias.clone());
        alias
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_yields_same_alias() {
        let mut table = AnonTable::new("origin");
        let a1 = table.alias("Houston");
        let a2 = table.alias("Houston");
        assert_eq!(a1, a2);
    }

    #[test]
    fn distinct_inputs_yield_distinct_aliases() {
        let mut table = AnonTable::new("origin");
        let a1 = table.alias("Houston");
        let a2 = table.alias("Rotterdam");
        assert_ne!(a1, a2);
        assert_eq!(table.len(), 2);
    }
}
