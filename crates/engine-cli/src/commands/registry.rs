//! `engctl registry register|list|show`: the process-wide Variable Frame
//! Registry (§4.8). Registrations only live for the lifetime of this
//! process — there is no on-disk registry store, matching §4.8's
//! "read-only after init" contract.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use engine_wal::VariableFrame;

pub fn register(frame: &Path) -> Result<()> {
    let json = fs::read_to_string(frame).with_context(|| format!("reading {}", frame.display()))?;
    let frame: VariableFrame = serde_json::from_str(&json).context("parsing variable frame JSON")?;
    let product_group = frame.product_group.clone();
    engine_wal::registry::register(frame).context("registering variable frame")?;
    println!("registered product group '{product_group}'");
    Ok(())
}

pub fn list() -> Result<()> {
    for group in engine_wal::registry::available() {
        println!("{group}");
    }
    Ok(())
}

pub fn show(product_group: &str) -> Result<()> {
    let frame = engine_wal::registry::frame_for(product_group).context("looking up product group")?;
    println!("{}", serde_json::to_string_pretty(&frame)?);
    Ok(())
}
