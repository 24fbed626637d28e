//! `engctl wal read|verify|recover`: direct inspection of on-disk
//! Snapshot WAL files (§4.7, §6.4), independent of the in-memory Audit
//! Index.

use std::path::Path;

use anyhow::{Context, Result};
use engine_wal::wal;

pub fn read(path: &Path) -> Result<()> {
    let entries = wal::read_file(path).with_context(|| format!("reading {}", path.display()))?;
    for entry in &entries {
        println!("{}", serde_json::to_string(entry)?);
    }
    Ok(())
}

pub fn verify(path: &Path) -> Result<()> {
    match wal::verify_chain(path).with_context(|| format!("verifying {}", path.display()))? {
        engine_wal::ChainVerification::Ok => {
            println!("chain ok");
        }
        engine_wal::ChainVerification::Broken { seq, expected, got } => {
            println!("chain broken at seq {seq}: expected {}, got {}", hex(&expected), hex(&got));
            std::process::exit(1);
        }
    }
    Ok(())
}

pub fn recover(dir: &Path) -> Result<()> {
    let (seq, prev_hashes) = wal::recover(dir).with_context(|| format!("recovering from {}", dir.display()))?;
    println!("seq: {seq}");
    for kind in engine_wal::EntryKind::ALL {
        let hash = prev_hashes.get(&kind).copied().unwrap_or([0u8; 16]);
        println!("{}: {}", kind.as_str(), hex(&hash));
    }
    Ok(())
}

fn hex(bytes: &[u8; 16]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
