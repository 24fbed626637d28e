//! WAL ambient configuration (§6.5): an explicit struct constructed from
//! environment variables with documented defaults, never an implicit
//! global — matching the teacher's "configuration is an explicit struct
//! per subsystem" convention (`gat-cli::install::config`).

use std::path::PathBuf;

const DEFAULT_WAL_DIR: &str = "./wal_data";
const DEFAULT_MANIFEST_EVERY_N_APPENDS: u32 = 50;

/// Directory layout and cadence knobs for the Snapshot WAL.
#[derive(Debug, Clone, PartialEq)]
pub struct WalConfig {
    /// Directory holding the per-type `.wal` files and `manifest.etf`.
    pub wal_dir: PathBuf,
    /// How many appends (of any type) between manifest flushes.
    pub manifest_every_n_appends: u32,
}

impl WalConfig {
    /// Build from environment variables, falling back to the documented
    /// defaults when unset or unparseable:
    ///
    /// - `ENGINE_WAL_DIR` (default `./wal_data`)
    /// - `ENGINE_WAL_MANIFEST_EVERY` (default `50`)
    pub fn from_env() -> Self {
        let wal_dir = std::env::var("ENGINE_WAL_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(DEFAULT_WAL_DIR));
        let manifest_every_n_appends = std::env::var("ENGINE_WAL_MANIFEST_EVERY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MANIFEST_EVERY_N_APPENDS);
        Self { wal_dir, manifest_every_n_appends }
    }
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            wal_dir: PathBuf::from(DEFAULT_WAL_DIR),
            manifest_every_n_appends: DEFAULT_MANIFEST_EVERY_N_APPENDS,
        }
    }
}
