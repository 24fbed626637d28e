//! `engctl doctor`: reports on the environment and on-disk state this
//! binary depends on (§6.5), without mutating anything.

use anyhow::Result;
use engine_pipeline::PipelineConfig;
use engine_wal::WalConfig;

pub fn run() -> Result<()> {
    let wal_config = WalConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();

    println!("wal_dir: {}", wal_config.wal_dir.display());
    println!("wal_dir exists: {}", wal_config.wal_dir.exists());
    println!("manifest_every_n_appends: {}", wal_config.manifest_every_n_appends);
    println!(
        "default_product_group: {}",
        pipeline_config.default_product_group.as_deref().unwrap_or("<unset>")
    );
    println!("default_scenario_count: {}", pipeline_config.default_scenario_count);
    println!(
        "solver_binary_path: {}",
        pipeline_config.solver_binary_path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<unset>".into())
    );
    println!("registered product groups: {}", engine_wal::registry::available().len());

    Ok(())
}
