//! `engctl codec encode|decode`: JSON <-> binary wire format (§4.1).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use engine_core::ModelDescriptor;

pub fn encode(input: &Path, output: &Path) -> Result<()> {
    let json = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let descriptor: ModelDescriptor = serde_json::from_str(&json).context("parsing descriptor JSON")?;
    descriptor.validate().context("descriptor failed validation")?;
    let bytes = engine_wire::codec::encode(&descriptor).context("encoding descriptor")?;
    fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    println!("wrote {} bytes to {}", bytes.len(), output.display());
    Ok(())
}

pub fn decode(input: &Path, output: Option<&Path>) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let descriptor = engine_wire::codec::decode(&bytes).context("decoding descriptor")?;
    let json = serde_json::to_string_pretty(&descriptor)?;
    match output {
        Some(path) => fs::write(path, json).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
