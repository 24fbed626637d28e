//! In-memory Audit Index (§4.6, §9).
//!
//! Audits are appended to one `Vec` and never removed or reordered; every
//! query is a secondary `HashMap<Key, Vec<usize>>` of positions into that
//! vec, never a copy of the audit itself — the same "arena + index
//! handles" shape the registry and the LP arena both use (§9's design
//! note, grounded in the teacher's `solver::registry` and `lp::arena`
//! modules).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use engine_core::ids::AuditId;
use engine_core::Signal;

use crate::audit::{Audit, AuditResult};

/// How one audit relates to the trader's previous audit in
/// [`AuditIndex::decision_chain`] (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionClassification {
    /// No earlier audit exists for this trader.
    Initial,
    /// Contracts were added, removed, or bumped in version since the last audit.
    ContractUpdate,
    /// The variable snapshot changed but the contract set did not.
    VariableChange,
    /// Neither contracts nor variables changed — a recheck of the same inputs.
    Recheck,
}

/// One step of a trader's decision chain (§4.6).
#[derive(Debug, Clone)]
pub struct DecisionChainEntry {
    pub audit_id: AuditId,
    pub timestamp: DateTime<Utc>,
    pub classification: DecisionClassification,
    pub contracts_added: Vec<String>,
    pub contracts_removed: Vec<String>,
    pub contracts_version_changed: Vec<String>,
    /// Per-variable delta against the prior audit; empty when there is no
    /// prior audit or the variable counts don't match.
    pub variable_deltas: Vec<f64>,
    pub elapsed_seconds: Option<f64>,
}

/// Result of [`AuditIndex::compare_paths`]: how often an automated run's
/// signal agreed with the next human-triggered run in the same product
/// group within a 30-minute lookahead window (§4.6).
///
/// Only automated runs whose signal is `strong_go` or `go` are considered
/// for pairing — a `cautious`/`weak`/`no_go` automated signal isn't
/// expected to trigger a human follow-up, so it's excluded from both
/// `auto_count` and the unmatched set rather than counted as a miss.
#[derive(Debug, Clone, PartialEq)]
pub struct PathComparison {
    pub auto_count: usize,
    pub human_count: usize,
    pub paired_count: usize,
    pub agreement_count: usize,
    pub alignment_ratio: f64,
    /// Eligible automated audits with no human follow-up inside the window.
    pub unmatched_auto: Vec<AuditId>,
    /// Human audits not claimed as any eligible automated audit's pairing.
    pub unmatched_human: Vec<AuditId>,
}

/// Aggregate performance counters over a scope of audits (§4.6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSummary {
    pub total: usize,
    pub optimal: usize,
    pub infeasible: usize,
    pub errored: usize,
    pub automated: usize,
    pub human: usize,
}

const LOOKAHEAD_WINDOW_SECONDS: i64 = 30 * 60;

fn signal_of(audit: &Audit) -> Option<Signal> {
    match audit.result() {
        AuditResult::MonteCarlo(mc) => Some(mc.signal),
        _ => None,
    }
}

/// Append-only store of every [`Audit`] minted this process, with
/// secondary indexes for the query shapes §4.6 describes.
#[derive(Debug, Default)]
pub struct AuditIndex {
    records: Vec<Audit>,
    by_id: HashMap<AuditId, usize>,
    by_trader: HashMap<String, Vec<usize>>,
    by_contract: HashMap<String, Vec<usize>>,
    by_product_group: HashMap<String, Vec<usize>>,
}

impl AuditIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one audit, returning its id. Positions are never reused or
    /// reordered once assigned.
    pub fn insert(&mut self, audit: Audit) -> AuditId {
        let pos = self.records.len();
        let id = audit.id();

        self.by_id.insert(id, pos);
        self.by_trader.entry(audit.trader_key().to_string()).or_default().push(pos);
        self.by_product_group.entry(audit.product_group().to_string()).or_default().push(pos);
        for contract in audit.contracts() {
            self.by_contract.entry(contract.id.clone()).or_default().push(pos);
        }

        self.records.push(audit);
        id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: AuditId) -> Option<&Audit> {
        self.by_id.get(&id).map(|&pos| &self.records[pos])
    }

    /// The `limit` most recently inserted audits, most recent first.
    pub fn recent(&self, limit: usize) -> Vec<&Audit> {
        self.records.iter().rev().take(limit).collect()
    }

    pub fn find_by_contract(&self, contract_id: &str) -> Vec<&Audit> {
        self.by_contract
            .get(contract_id)
            .map(|positions| positions.iter().map(|&p| &self.records[p]).collect())
            .unwrap_or_default()
    }

    pub fn find_by_trader(&self, trader_key: &str) -> Vec<&Audit> {
        self.by_trader
            .get(trader_key)
            .map(|positions| positions.iter().map(|&p| &self.records[p]).collect())
            .unwrap_or_default()
    }

    pub fn find_by_time_range(&self, product_group: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&Audit> {
        self.by_product_group
            .get(product_group)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&p| &self.records[p])
                    .filter(|a| a.timestamp() >= from && a.timestamp() <= to)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The full sequence of audits attached to `trader_key`, oldest first,
    /// each annotated with how it differs from its predecessor (§4.6).
    pub fn decision_chain(&self, trader_key: &str) -> Vec<DecisionChainEntry> {
        let mut audits = self.find_by_trader(trader_key);
        audits.sort_by_key(|a| a.timestamp());

        let mut out = Vec::with_capacity(audits.len());
        let mut prev: Option<&Audit> = None;
        for audit in audits {
            let entry = match prev {
                None => DecisionChainEntry {
                    audit_id: audit.id(),
                    timestamp: audit.timestamp(),
                    classification: DecisionClassification::Initial,
                    contracts_added: audit.contracts().iter().map(|c| c.id.clone()).collect(),
                    contracts_removed: Vec::new(),
                    contracts_version_changed: Vec::new(),
                    variable_deltas: Vec::new(),
                    elapsed_seconds: None,
                },
                Some(prior) => {
                    let prior_ids: HashMap<&str, u32> =
                        prior.contracts().iter().map(|c| (c.id.as_str(), c.version)).collect();
                    let current_ids: HashMap<&str, u32> =
                        audit.contracts().iter().map(|c| (c.id.as_str(), c.version)).collect();

                    let added: Vec<String> = current_ids
                        .keys()
                        .filter(|id| !prior_ids.contains_key(*id))
                        .map(|s| s.to_string())
                        .collect();
                    let removed: Vec<String> = prior_ids
                        .keys()
                        .filter(|id| !current_ids.contains_key(*id))
                        .map(|s| s.to_string())
                        .collect();
                    let version_changed: Vec<String> = current_ids
                        .iter()
                        .filter_map(|(id, v)| match prior_ids.get(id) {
                            Some(pv) if pv != v => Some(id.to_string()),
                            _ => None,
                        })
                        .collect();

                    let variable_deltas = if prior.variable_snapshot().len() == audit.variable_snapshot().len() {
                        prior
                            .variable_snapshot()
                            .iter()
                            .zip(audit.variable_snapshot())
                            .map(|(a, b)| b - a)
                            .collect()
                    } else {
                        Vec::new()
                    };

                    let contracts_changed = !added.is_empty() || !removed.is_empty() || !version_changed.is_empty();
                    let variables_changed = variable_deltas.iter().any(|d| *d != 0.0);

                    let classification = if contracts_changed {
                        DecisionClassification::ContractUpdate
                    } else if variables_changed {
                        DecisionClassification::VariableChange
                    } else {
                        DecisionClassification::Recheck
                    };

                    let elapsed_seconds = Some((audit.timestamp() - prior.timestamp()).num_milliseconds() as f64 / 1000.0);

                    DecisionChainEntry {
                        audit_id: audit.id(),
                        timestamp: audit.timestamp(),
                        classification,
                        contracts_added: added,
                        contracts_removed: removed,
                        contracts_version_changed: version_changed,
                        variable_deltas,
                        elapsed_seconds,
                    }
                }
            };
            out.push(entry);
            prev = Some(audit);
        }
        out
    }

    /// Every audit in `product_group`, oldest first, capped to the most
    /// recent `limit`.
    pub fn product_group_timeline(&self, product_group: &str, limit: usize) -> Vec<&Audit> {
        let mut audits: Vec<&Audit> = self.by_product_group.get(product_group).map_or_else(Vec::new, |positions| {
            positions.iter().map(|&p| &self.records[p]).collect()
        });
        audits.sort_by_key(|a| a.timestamp());
        if audits.len() > limit {
            let skip = audits.len() - limit;
            audits.drain(0..skip);
        }
        audits
    }

    /// Split `product_group`'s audits into automated and human-triggered
    /// runs, then, for each automated run, look up to 30 minutes ahead for
    /// the next human-triggered run in the same group and check whether
    /// their signals agree (§4.6).
    pub fn compare_paths(&self, product_group: &str) -> PathComparison {
        let mut audits: Vec<&Audit> = self.by_product_group.get(product_group).map_or_else(Vec::new, |positions| {
            positions.iter().map(|&p| &self.records[p]).collect()
        });
        audits.sort_by_key(|a| a.timestamp());

        let human_count = audits.iter().filter(|a| !a.is_automated()).count();

        // Only "go"/"strong_go" automated signals are eligible for pairing
        // (§4.6): a cautious/weak/no-go signal isn't expected to provoke a
        // human follow-up.
        let eligible = |a: &&Audit| a.is_automated() && matches!(signal_of(a), Some(Signal::StrongGo) | Some(Signal::Go));
        let auto_count = audits.iter().filter(eligible).count();

        let mut paired_count = 0;
        let mut agreement_count = 0;
        let mut unmatched_auto = Vec::new();
        let mut matched_human: std::collections::HashSet<AuditId> = std::collections::HashSet::new();

        for (i, audit) in audits.iter().enumerate() {
            if !eligible(audit) {
                continue;
            }
            let auto_signal = signal_of(audit).expect("eligible implies signal_of is Some");
            let window_end = audit.timestamp() + chrono::Duration::seconds(LOOKAHEAD_WINDOW_SECONDS);
            let paired = audits[i + 1..]
                .iter()
                .find(|candidate| !candidate.is_automated() && candidate.timestamp() <= window_end);
            match paired {
                Some(human) => {
                    paired_count += 1;
                    matched_human.insert(human.id());
                    if signal_of(human) == Some(auto_signal) {
                        agreement_count += 1;
                    }
                }
                None => unmatched_auto.push(audit.id()),
            }
        }

        let unmatched_human: Vec<AuditId> = audits
            .iter()
            .filter(|a| !a.is_automated() && !matched_human.contains(&a.id()))
            .map(|a| a.id())
            .collect();

        let alignment_ratio = if paired_count > 0 { agreement_count as f64 / paired_count as f64 } else { 0.0 };

        PathComparison {
            auto_count,
            human_count,
            paired_count,
            agreement_count,
            alignment_ratio,
            unmatched_auto,
            unmatched_human,
        }
    }

    /// Aggregate result-status counters over every audit matching `scope`
    /// (a product group name, or `None` for every audit ever indexed).
    pub fn performance_summary(&self, scope: Option<&str>) -> PerformanceSummary {
        use crate::audit::ResultStatus;

        let audits: Vec<&Audit> = match scope {
            Some(pg) => self.by_product_group.get(pg).map_or_else(Vec::new, |positions| {
                positions.iter().map(|&p| &self.records[p]).collect()
            }),
            None => self.records.iter().collect(),
        };

        let mut summary = PerformanceSummary {
            total: audits.len(),
            optimal: 0,
            infeasible: 0,
            errored: 0,
            automated: 0,
            human: 0,
        };
        for audit in audits {
            match audit.result_status() {
                ResultStatus::Optimal => summary.optimal += 1,
                ResultStatus::Infeasible => summary.infeasible += 1,
                ResultStatus::SolverError | ResultStatus::BadInput | ResultStatus::Error | ResultStatus::Cancelled => {
                    summary.errored += 1
                }
            }
            if audit.is_automated() {
                summary.automated += 1;
            } else {
                summary.human += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditResult, AuditSpec, ContractFreshness, ContractSnapshot, PhaseTimestamps, ResultStatus, SolveMode};
    use engine_core::ids::RunId;
    use engine_core::{MonteCarloResult, Signal};
    use std::collections::HashMap as Map;

    fn mc_result(signal: Signal) -> MonteCarloResult {
        MonteCarloResult::zero_filled(2, 0, signal)
    }

    fn audit_at(
        trader: Option<&str>,
        pg: &str,
        ts: DateTime<Utc>,
        trigger: &str,
        contracts: Vec<ContractSnapshot>,
        variables: Vec<f64>,
        signal: Signal,
    ) -> Audit {
        Audit::new(AuditSpec {
            run_id: RunId::next(),
            mode: SolveMode::MonteCarlo,
            product_group: pg.into(),
            trader_id: trader.map(|s| s.to_string()),
            trigger: trigger.into(),
            freshness: ContractFreshness::fresh(contracts.len() as u32),
            variable_snapshot: variables,
            source_timestamps: Map::new(),
            result: AuditResult::MonteCarlo(mc_result(signal)),
            result_status: ResultStatus::Optimal,
            phases: PhaseTimestamps::started_at(ts),
            contracts,
        })
    }

    fn contract(id: &str, version: u32) -> ContractSnapshot {
        ContractSnapshot {
            id: id.into(),
            counterparty: "acme".into(),
            version,
            file_hash: "deadbeef".into(),
            clause_count: 1,
            clause_ids: vec!["c1".into()],
        }
    }

    #[test]
    fn recent_returns_latest_first() {
        let mut index = AuditIndex::new();
        let t0 = Utc::now();
        for i in 0..3 {
            index.insert(audit_at(
                None,
                "grain",
                t0 + chrono::Duration::seconds(i),
                "auto",
                vec![],
                vec![1.0],
                Signal::Go,
            ));
        }
        let recent = index.recent(2);
        assert_eq!(recent.len(), 2);
        assert!(recent[0].timestamp() > recent[1].timestamp());
    }

    #[test]
    fn decision_chain_classifies_first_entry_as_initial() {
        let mut index = AuditIndex::new();
        index.insert(audit_at(
            Some("trader-1"),
            "grain",
            Utc::now(),
            "human",
            vec![contract("k1", 1)],
            vec![1.0],
            Signal::Go,
        ));
        let chain = index.decision_chain("trader-1");
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].classification, DecisionClassification::Initial);
    }

    #[test]
    fn decision_chain_detects_contract_version_bump() {
        let mut index = AuditIndex::new();
        let t0 = Utc::now();
        index.insert(audit_at(
            Some("trader-1"),
            "grain",
            t0,
            "human",
            vec![contract("k1", 1)],
            vec![1.0],
            Signal::Go,
        ));
        index.insert(audit_at(
            Some("trader-1"),
            "grain",
            t0 + chrono::Duration::minutes(5),
            "human",
            vec![contract("k1", 2)],
            vec![1.0],
            Signal::Go,
        ));
        let chain = index.decision_chain("trader-1");
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].classification, DecisionClassification::ContractUpdate);
        assert_eq!(chain[1].contracts_version_changed, vec!["k1".to_string()]);
    }

    #[test]
    fn decision_chain_detects_variable_change_with_stable_contracts() {
        let mut index = AuditIndex::new();
        let t0 = Utc::now();
        index.insert(audit_at(Some("trader-1"), "grain", t0, "human", vec![], vec![1.0, 2.0], Signal::Go));
        index.insert(audit_at(
            Some("trader-1"),
            "grain",
            t0 + chrono::Duration::minutes(1),
            "human",
            vec![],
            vec![1.5, 2.0],
            Signal::Go,
        ));
        let chain = index.decision_chain("trader-1");
        assert_eq!(chain[1].classification, DecisionClassification::VariableChange);
        assert_eq!(chain[1].variable_deltas, vec![0.5, 0.0]);
    }

    #[test]
    fn decision_chain_detects_recheck_when_nothing_changed() {
        let mut index = AuditIndex::new();
        let t0 = Utc::now();
        index.insert(audit_at(Some("trader-1"), "grain", t0, "human", vec![], vec![1.0], Signal::Go));
        index.insert(audit_at(
            Some("trader-1"),
            "grain",
            t0 + chrono::Duration::minutes(1),
            "human",
            vec![],
            vec![1.0],
            Signal::Go,
        ));
        let chain = index.decision_chain("trader-1");
        assert_eq!(chain[1].classification, DecisionClassification::Recheck);
    }

    #[test]
    fn compare_paths_pairs_auto_run_with_next_human_run_in_window() {
        let mut index = AuditIndex::new();
        let t0 = Utc::now();
        index.insert(audit_at(None, "grain", t0, "auto", vec![], vec![1.0], Signal::Go));
        index.insert(audit_at(
            Some("trader-1"),
            "grain",
            t0 + chrono::Duration::minutes(10),
            "human",
            vec![],
            vec![1.0],
            Signal::Go,
        ));
        let cmp = index.compare_paths("grain");
        assert_eq!(cmp.auto_count, 1);
        assert_eq!(cmp.human_count, 1);
        assert_eq!(cmp.paired_count, 1);
        assert_eq!(cmp.agreement_count, 1);
        assert_eq!(cmp.alignment_ratio, 1.0);
    }

    #[test]
    fn compare_paths_ignores_human_run_outside_window() {
        let mut index = AuditIndex::new();
        let t0 = Utc::now();
        index.insert(audit_at(None, "grain", t0, "auto", vec![], vec![1.0], Signal::Go));
        index.insert(audit_at(
            Some("trader-1"),
            "grain",
            t0 + chrono::Duration::minutes(45),
            "human",
            vec![],
            vec![1.0],
            Signal::NoGo,
        ));
        let cmp = index.compare_paths("grain");
        assert_eq!(cmp.paired_count, 0);
        assert_eq!(cmp.alignment_ratio, 0.0);
        assert_eq!(cmp.unmatched_auto.len(), 1);
        assert_eq!(cmp.unmatched_human.len(), 1);
    }

    #[test]
    fn compare_paths_excludes_cautious_automated_signal_from_eligibility() {
        let mut index = AuditIndex::new();
        let t0 = Utc::now();
        index.insert(audit_at(None, "grain", t0, "auto", vec![], vec![1.0], Signal::Cautious));
        index.insert(audit_at(
            Some("trader-1"),
            "grain",
            t0 + chrono::Duration::minutes(5),
            "human",
            vec![],
            vec![1.0],
            Signal::Cautious,
        ));
        let cmp = index.compare_paths("grain");
        assert_eq!(cmp.auto_count, 0);
        assert_eq!(cmp.paired_count, 0);
        assert!(cmp.unmatched_auto.is_empty());
        assert_eq!(cmp.unmatched_human.len(), 1);
    }

    #[test]
    fn performance_summary_counts_by_status_and_trigger() {
        let mut index = AuditIndex::new();
        let t0 = Utc::now();
        index.insert(audit_at(None, "grain", t0, "auto", vec![], vec![1.0], Signal::Go));
        index.insert(audit_at(
            Some("trader-1"),
            "grain",
            t0 + chrono::Duration::minutes(1),
            "human",
            vec![],
            vec![1.0],
            Signal::Go,
        ));
        let summary = index.performance_summary(Some("grain"));
        assert_eq!(summary.total, 2);
        assert_eq!(summary.optimal, 2);
        assert_eq!(summary.automated, 1);
        assert_eq!(summary.human, 1);
    }
}
