//! Opaque, append-only identifiers for runs and audit records.
//!
//! `RunId` and `AuditId` are newtypes over a monotonically-increasing
//! counter combined with a process-start timestamp, so identifiers stay
//! ordered within a process and are unlikely to collide across processes
//! without requiring a central allocator (§9: "no globally shared mutable
//! state beyond what a single process needs").

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);
static AUDIT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifies one pipeline run end-to-end (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(u64);

impl RunId {
    pub fn next() -> Self {
        Self(RUN_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Reconstruct a `RunId` previously obtained from [`RunId::as_u64`] —
    /// used when replaying the WAL, where the id is read back rather than
    /// freshly minted.
    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Identifies one entry in the Audit Index (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditId(u64);

impl AuditId {
    pub fn next() -> Self {
        Self(AUDIT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for AuditId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "audit-{}", self.0)
    }
}
