//! `engctl solve` / `engctl monte-carlo`: one-shot invocations of LP Core
//! and the Monte Carlo Runner against JSON-encoded inputs (§4.2, §4.4).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use engine_core::{ModelDescriptor, SignalThresholds, VariableVector};

fn load_descriptor(path: &Path) -> Result<ModelDescriptor> {
    let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let descriptor: ModelDescriptor = serde_json::from_str(&json).context("parsing descriptor JSON")?;
    descriptor.validate().context("descriptor failed validation")?;
    Ok(descriptor)
}

fn load_vector(path: &Path) -> Result<VariableVector> {
    let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let vector: VariableVector = serde_json::from_str(&json).context("parsing variable vector JSON")?;
    Ok(vector)
}

pub fn solve(descriptor: &Path, vector: &Path) -> Result<()> {
    let descriptor = load_descriptor(descriptor)?;
    let values = load_vector(vector)?;
    let result = engine_lp::solve(&descriptor, &values).context("LP solve failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub fn monte_carlo(descriptor: &Path, center: &Path, scenarios: u32, thresholds: Option<&Path>) -> Result<()> {
    let descriptor = load_descriptor(descriptor)?;
    let center = load_vector(center)?;
    let thresholds = match thresholds {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&json).context("parsing signal thresholds JSON")?
        }
        None => SignalThresholds { strong_go: 0.0, go: 0.0, weak: 0.0 },
    };
    let result = engine_lp::run_monte_carlo(&descriptor, &center, scenarios, &thresholds).context("Monte Carlo run failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
