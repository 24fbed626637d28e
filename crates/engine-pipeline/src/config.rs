//! Pipeline ambient configuration (§6.5): explicit struct, `from_env()`
//! constructor with documented defaults, never an implicit global.

use std::path::PathBuf;

const DEFAULT_SCENARIO_COUNT: u32 = 1000;
const DEFAULT_COOLDOWN_SECONDS: u64 = 0;

/// Environment-carried values consumed by the pipeline (§6.5). The WAL
/// directory path lives in [`engine_wal::config::WalConfig`] — this
/// struct only holds what the pipeline itself reads.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub default_product_group: Option<String>,
    pub default_scenario_count: u32,
    pub solver_binary_path: Option<PathBuf>,
    /// Cooldown window for notifications. Carried for parity with the
    /// configuration surface; notifications are out of scope here, so
    /// this value is read but never acted on (§6.5: "ignored at this
    /// layer").
    pub cooldown_window_seconds: u64,
}

impl PipelineConfig {
    /// Build from environment variables, falling back to the documented
    /// defaults when unset or unparseable:
    ///
    /// - `ENGINE_DEFAULT_PRODUCT_GROUP` (default unset)
    /// - `ENGINE_DEFAULT_SCENARIO_COUNT` (default `1000`)
    /// - `ENGINE_SOLVER_BINARY_PATH` (default unset)
    /// - `ENGINE_COOLDOWN_SECONDS` (default `0`, ignored at this layer)
    pub fn from_env() -> Self {
        Self {
            default_product_group: std::env::var("ENGINE_DEFAULT_PRODUCT_GROUP").ok(),
            default_scenario_count: std::env::var("ENGINE_DEFAULT_SCENARIO_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SCENARIO_COUNT),
            solver_binary_path: std::env::var("ENGINE_SOLVER_BINARY_PATH").ok().map(PathBuf::from),
            cooldown_window_seconds: std::env::var("ENGINE_COOLDOWN_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_COOLDOWN_SECONDS),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_product_group: None,
            default_scenario_count: DEFAULT_SCENARIO_COUNT,
            solver_binary_path: None,
            cooldown_window_seconds: DEFAULT_COOLDOWN_SECONDS,
        }
    }
}
