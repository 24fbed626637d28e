//! Discrete pipeline events, one per phase transition (§4.5, §7).
//!
//! A UI consumer renders purely from [`PipelineEvent::tag`] — "optimizing…",
//! "stale contracts", "contracts updated", "ready", "failed" — without
//! ever inspecting a payload (§7 User-visible behavior).

use engine_core::ids::RunId;
use engine_wal::ResultStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Started { run_id: RunId, caller_reference: String },
    ContractsChecked { run_id: RunId, caller_reference: String, stale: bool },
    IngestStarted { run_id: RunId, caller_reference: String },
    IngestDone { run_id: RunId, caller_reference: String, ingested_count: u32 },
    Framing { run_id: RunId, caller_reference: String },
    Framed { run_id: RunId, caller_reference: String },
    Solving { run_id: RunId, caller_reference: String },
    Done { run_id: RunId, caller_reference: String, result_status: ResultStatus },
    Error { run_id: RunId, caller_reference: String, reason: String },
}

impl PipelineEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            PipelineEvent::Started { run_id, .. }
            | PipelineEvent::ContractsChecked { run_id, .. }
            | PipelineEvent::IngestStarted { run_id, .. }
            | PipelineEvent::IngestDone { run_id, .. }
            | PipelineEvent::Framing { run_id, .. }
            | PipelineEvent::Framed { run_id, .. }
            | PipelineEvent::Solving { run_id, .. }
            | PipelineEvent::Done { run_id, .. }
            | PipelineEvent::Error { run_id, .. } => *run_id,
        }
    }

    pub fn caller_reference(&self) -> &str {
        match self {
            PipelineEvent::Started { caller_reference, .. }
            | PipelineEvent::ContractsChecked { caller_reference, .. }
            | PipelineEvent::IngestStarted { caller_reference, .. }
            | PipelineEvent::IngestDone { caller_reference, .. }
            | PipelineEvent::Framing { caller_reference, .. }
            | PipelineEvent::Framed { caller_reference, .. }
            | PipelineEvent::Solving { caller_reference, .. }
            | PipelineEvent::Done { caller_reference, .. }
            | PipelineEvent::Error { caller_reference, .. } => caller_reference,
        }
    }

    /// The UI-facing tag a consumer renders from, with no payload
    /// inspection required (§7).
    pub fn tag(&self) -> &'static str {
        match self {
            PipelineEvent::Started { .. } => "started",
            PipelineEvent::ContractsChecked { stale: true, .. } => "stale contracts",
            PipelineEvent::ContractsChecked { stale: false, .. } => "contracts fresh",
            PipelineEvent::IngestStarted { .. } => "ingesting",
            PipelineEvent::IngestDone { .. } => "contracts updated",
            PipelineEvent::Framing { .. } => "framing",
            PipelineEvent::Framed { .. } => "framed",
            PipelineEvent::Solving { .. } => "optimizing…",
            PipelineEvent::Done { .. } => "ready",
            PipelineEvent::Error { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_the_documented_ui_strings() {
        let run_id = RunId::next();
        let cr = "ref-1".to_string();
        assert_eq!(PipelineEvent::Solving { run_id, caller_reference: cr.clone() }.tag(), "optimizing…");
        assert_eq!(
            PipelineEvent::ContractsChecked { run_id, caller_reference: cr.clone(), stale: true }.tag(),
            "stale contracts"
        );
        assert_eq!(
            PipelineEvent::IngestDone { run_id, caller_reference: cr.clone(), ingested_count: 3 }.tag(),
            "contracts updated"
        );
        assert_eq!(
            PipelineEvent::Done { run_id, caller_reference: cr.clone(), result_status: ResultStatus::Optimal }.tag(),
            "ready"
        );
        assert_eq!(PipelineEvent::Error { run_id, caller_reference: cr, reason: "x".into() }.tag(), "failed");
    }
}
