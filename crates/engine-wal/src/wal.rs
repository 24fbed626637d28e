//! Append-only Snapshot WAL (§4.7, §6.4).
//!
//! Per-type daily files (`<type>_<YYYYMMDD>.wal`) hold length-prefixed,
//! hash-chained frames. The appender is the WAL's single writer (§5: "the
//! WAL appender owns its file handles and a small state... no other
//! writer exists") — callers serialize through one owned `&mut
//! WalAppender`, matching the teacher's single-owner file-handle pattern.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::{WalError, WalResult};

/// Which log the entry belongs to (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Contract,
    Audit,
    Scenario,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Contract => "contract",
            EntryKind::Audit => "audit",
            EntryKind::Scenario => "scenario",
        }
    }

    pub const ALL: [EntryKind; 3] = [EntryKind::Contract, EntryKind::Audit, EntryKind::Scenario];
}

impl FromStr for EntryKind {
    type Err = WalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contract" => Ok(EntryKind::Contract),
            "audit" => Ok(EntryKind::Audit),
            "scenario" => Ok(EntryKind::Scenario),
            other => Err(WalError::UnknownKind(other.to_string())),
        }
    }
}

/// One framed record in the append-only log (§3, §6.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotLogEntry {
    pub seq: u64,
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub data: serde_json::Value,
    pub prev_hash: [u8; 16],
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    seq: u64,
    prev_hash: std::collections::BTreeMap<String, String>,
    saved_at: DateTime<Utc>,
}

/// Result of [`verify_chain`]: either the chain holds, or it breaks at a
/// specific sequence number (§8 Testable Property 5).
#[derive(Debug, Clone, PartialEq)]
pub enum ChainVerification {
    Ok,
    Broken { seq: u64, expected: String, got: String },
}

fn md5_hash(bytes: &[u8]) -> [u8; 16] {
    let digest = Md5::digest(bytes);
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest);
    out
}

fn hex_encode(bytes: &[u8; 16]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> WalResult<[u8; 16]> {
    if s.len() != 32 {
        return Err(WalError::UnknownKind(format!("malformed hash '{s}'")));
    }
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
            .map_err(|_| WalError::UnknownKind(format!("malformed hash '{s}'")))?;
    }
    Ok(out)
}

fn frame_bytes(entry: &SnapshotLogEntry) -> WalResult<Vec<u8>> {
    let payload = serde_json::to_vec(entry)?;
    let size = u32::try_from(payload.len())
        .map_err(|_| WalError::TruncatedFrame { path: String::new(), declared: u32::MAX, found: payload.len() })?;
    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.extend_from_slice(&size.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Parse every frame in one `.wal` file, tolerating a trailing short
/// write (a partial frame left by a crash mid-append). Returns the
/// decoded entry paired with its exact on-disk frame bytes, since
/// [`verify_chain`] and recovery hash the bytes as written rather than
/// re-serializing.
fn read_frames(path: &Path) -> WalResult<Vec<(SnapshotLogEntry, Vec<u8>)>> {
    let bytes = fs::read(path)?;
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        if pos + 4 > bytes.len() {
            tracing::warn!(path = %path.display(), "discarding trailing short length prefix");
            break;
        }
        let declared = u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap());
        let start = pos + 4;
        let end = start + declared as usize;
        if end > bytes.len() {
            tracing::warn!(path = %path.display(), declared, "discarding trailing truncated frame");
            break;
        }
        let payload = &bytes[start..end];
        let entry: SnapshotLogEntry = serde_json::from_slice(payload)?;
        out.push((entry, bytes[pos..end].to_vec()));
        pos = end;
    }
    Ok(out)
}

/// Parse a `.wal` file into its entries, discarding a trailing partial
/// frame (§4.7 `read_file`).
pub fn read_file(path: &Path) -> WalResult<Vec<SnapshotLogEntry>> {
    Ok(read_frames(path)?.into_iter().map(|(e, _)| e).collect())
}

fn wal_files_for(dir: &Path, kind: EntryKind) -> WalResult<Vec<PathBuf>> {
    let prefix = format!("{}_", kind.as_str());
    let mut out = Vec::new();
    if !dir.exists() {
        return Ok(out);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".wal") {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}

/// Read every entry of `kind` across all daily files in `dir` whose
/// timestamp falls in `[from, to]`, sorted by sequence number (§4.7
/// `read_range`).
pub fn read_range(dir: &Path, kind: EntryKind, from: DateTime<Utc>, to: DateTime<Utc>) -> WalResult<Vec<SnapshotLogEntry>> {
    let mut out = Vec::new();
    for path in wal_files_for(dir, kind)? {
        out.extend(read_file(&path)?);
    }
    out.retain(|e| e.ts >= from && e.ts <= to);
    out.sort_by_key(|e| e.seq);
    Ok(out)
}

/// Verify the hash chain of one `.wal` file (§4.7, §8 Testable Property 5).
pub fn verify_chain(path: &Path) -> WalResult<ChainVerification> {
    let frames = read_frames(path)?;
    let mut expected_prev = [0u8; 16];
    for (entry, raw) in &frames {
        if entry.prev_hash != expected_prev {
            return Ok(ChainVerification::Broken {
                seq: entry.seq,
                expected: hex_encode(&expected_prev),
                got: hex_encode(&entry.prev_hash),
            });
        }
        expected_prev = md5_hash(raw);
    }
    Ok(ChainVerification::Ok)
}

/// Replay entries across `types` within `[since, up_to]` in (timestamp,
/// seq) order, handing each payload to `applier`. `applier` is expected
/// to be idempotent (insert-if-absent) since replaying the same range
/// twice must leave the target store unchanged (§4.7, §8).
pub fn replay<F>(dir: &Path, since: DateTime<Utc>, up_to: DateTime<Utc>, types: &[EntryKind], mut applier: F) -> WalResult<()>
where
    F: FnMut(EntryKind, &serde_json::Value) -> WalResult<()>,
{
    let mut all = Vec::new();
    for &kind in types {
        all.extend(read_range(dir, kind, since, up_to)?);
    }
    all.sort_by_key(|e| (e.ts, e.seq));
    for entry in &all {
        applier(entry.kind, &entry.data)?;
    }
    Ok(())
}

/// Restore `(seq, per-type prev_hash)` at process startup (§4.7 Startup
/// recovery): from the manifest when present, otherwise by scanning
/// every WAL file in `dir`.
pub fn recover(dir: &Path) -> WalResult<(u64, HashMap<EntryKind, [u8; 16]>)> {
    let manifest_path = dir.join("manifest.etf");
    if manifest_path.exists() {
        let bytes = fs::read(&manifest_path)?;
        let manifest: ManifestFile = serde_json::from_slice(&bytes)?;
        let mut prev_hash = HashMap::new();
        for (k, v) in manifest.prev_hash {
            prev_hash.insert(EntryKind::from_str(&k)?, hex_decode(&v)?);
        }
        return Ok((manifest.seq, prev_hash));
    }

    let mut seq = 0u64;
    let mut last_seen: HashMap<EntryKind, (u64, [u8; 16])> = HashMap::new();
    for kind in EntryKind::ALL {
        for path in wal_files_for(dir, kind)? {
            for (entry, raw) in read_frames(&path)? {
                seq = seq.max(entry.seq);
                let replace = last_seen.get(&kind).map(|(s, _)| entry.seq > *s).unwrap_or(true);
                if replace {
                    last_seen.insert(kind, (entry.seq, md5_hash(&raw)));
                }
            }
        }
    }
    let prev_hash = last_seen.into_iter().map(|(k, (_, h))| (k, h)).collect();
    Ok((seq, prev_hash))
}

/// The WAL's single writer: owns open file handles, the monotonic
/// sequence counter, and the per-type hash cache.
pub struct WalAppender {
    dir: PathBuf,
    seq: u64,
    prev_hash: HashMap<EntryKind, [u8; 16]>,
    open_files: HashMap<(EntryKind, NaiveDate), File>,
    appends_since_manifest: u32,
}

impl WalAppender {
    /// Open (creating if absent) the WAL directory and recover prior state.
    pub fn open(dir: impl Into<PathBuf>) -> WalResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let (seq, prev_hash) = recover(&dir)?;
        Ok(Self {
            dir,
            seq,
            prev_hash,
            open_files: HashMap::new(),
            appends_since_manifest: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    fn file_for(&mut self, kind: EntryKind, date: NaiveDate) -> WalResult<&mut File> {
        let key = (kind, date);
        if !self.open_files.contains_key(&key) {
            let path = self.dir.join(format!("{}_{}.wal", kind.as_str(), date.format("%Y%m%d")));
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            self.open_files.insert(key, file);
        }
        Ok(self.open_files.get_mut(&key).unwrap())
    }

    /// Append one entry. Assigns the next sequence number, chains against
    /// this type's last hash, writes the length-prefixed frame, and
    /// fsyncs before returning.
    pub fn append(&mut self, kind: EntryKind, data: serde_json::Value) -> WalResult<SnapshotLogEntry> {
        let now = Utc::now();
        let seq = self.seq + 1;
        let prev_hash = self.prev_hash.get(&kind).copied().unwrap_or([0u8; 16]);
        let entry = SnapshotLogEntry { seq, ts: now, kind, data, prev_hash };
        let frame = frame_bytes(&entry)?;

        let file = self.file_for(kind, now.date_naive())?;
        file.write_all(&frame)?;
        file.sync_all()?;

        let new_hash = md5_hash(&frame);
        self.seq = seq;
        self.prev_hash.insert(kind, new_hash);
        self.appends_since_manifest += 1;
        if self.appends_since_manifest % 50 == 0 {
            self.write_manifest()?;
        }
        Ok(entry)
    }

    fn write_manifest(&self) -> WalResult<()> {
        let manifest = ManifestFile {
            seq: self.seq,
            prev_hash: self
                .prev_hash
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), hex_encode(v)))
                .collect(),
            saved_at: Utc::now(),
        };
        let tmp = self.dir.join("manifest.etf.tmp");
        {
            let mut f = File::create(&tmp)?;
            serde_json::to_writer(&mut f, &manifest)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, self.dir.join("manifest.etf"))?;
        Ok(())
    }

    /// Force a manifest flush outside the every-50 cadence — used by
    /// tests and by an orderly shutdown path.
    pub fn flush_manifest(&self) -> WalResult<()> {
        self.write_manifest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn payload(n: u64) -> serde_json::Value {
        serde_json::json!({"n": n})
    }

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let mut wal = WalAppender::open(dir.path()).unwrap();
        for i in 0..5 {
            wal.append(EntryKind::Audit, payload(i)).unwrap();
        }
        let files = wal_files_for(dir.path(), EntryKind::Audit).unwrap();
        assert_eq!(files.len(), 1);
        let entries = read_file(&files[0]).unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].prev_hash, [0u8; 16]);
        for w in entries.windows(2) {
            assert_ne!(w[0].prev_hash, w[1].prev_hash);
        }
    }

    #[test]
    fn verify_chain_detects_no_corruption() {
        let dir = tempdir().unwrap();
        let mut wal = WalAppender::open(dir.path()).unwrap();
        for i in 0..10 {
            wal.append(EntryKind::Scenario, payload(i)).unwrap();
        }
        let files = wal_files_for(dir.path(), EntryKind::Scenario).unwrap();
        assert_eq!(verify_chain(&files[0]).unwrap(), ChainVerification::Ok);
    }

    #[test]
    fn flipping_a_byte_breaks_the_chain() {
        let dir = tempdir().unwrap();
        let mut wal = WalAppender::open(dir.path()).unwrap();
        for i in 0..6 {
            wal.append(EntryKind::Contract, payload(i)).unwrap();
        }
        let files = wal_files_for(dir.path(), EntryKind::Contract).unwrap();
        let path = &files[0];
        let mut bytes = fs::read(path).unwrap();
        // Flip a byte well inside the first frame's payload (past the
        // 4-byte length prefix), not the final frame.
        bytes[10] ^= 0xFF;
        fs::write(path, &bytes).unwrap();
        match verify_chain(path).unwrap() {
            ChainVerification::Broken { .. } => {}
            ChainVerification::Ok => panic!("expected a broken chain"),
        }
    }

    #[test]
    fn recovery_without_manifest_scans_all_files() {
        let dir = tempdir().unwrap();
        {
            let mut wal = WalAppender::open(dir.path()).unwrap();
            for i in 0..10 {
                wal.append(EntryKind::Audit, payload(i)).unwrap();
            }
        }
        // No manifest written yet (fewer than 50 appends).
        assert!(!dir.path().join("manifest.etf").exists());
        let (seq, prev_hash) = recover(dir.path()).unwrap();
        assert_eq!(seq, 10);
        assert!(prev_hash.contains_key(&EntryKind::Audit));
    }

    #[test]
    fn recovery_after_reopen_continues_seq_and_chain() {
        let dir = tempdir().unwrap();
        let last_hash = {
            let mut wal = WalAppender::open(dir.path()).unwrap();
            for i in 0..3 {
                wal.append(EntryKind::Audit, payload(i)).unwrap();
            }
            *wal.prev_hash.get(&EntryKind::Audit).unwrap()
        };
        let mut wal2 = WalAppender::open(dir.path()).unwrap();
        assert_eq!(wal2.seq(), 3);
        let next = wal2.append(EntryKind::Audit, payload(99)).unwrap();
        assert_eq!(next.prev_hash, last_hash);
        assert_eq!(next.seq, 4);
    }

    #[test]
    fn manifest_is_written_every_fifty_appends() {
        let dir = tempdir().unwrap();
        let mut wal = WalAppender::open(dir.path()).unwrap();
        for i in 0..50 {
            wal.append(EntryKind::Scenario, payload(i)).unwrap();
        }
        assert!(dir.path().join("manifest.etf").exists());
    }

    #[test]
    fn replay_is_idempotent_with_insert_if_absent_applier() {
        let dir = tempdir().unwrap();
        let mut wal = WalAppender::open(dir.path()).unwrap();
        for i in 0..4 {
            wal.append(EntryKind::Audit, payload(i)).unwrap();
        }
        let since = Utc::now() - chrono::Duration::hours(1);
        let up_to = Utc::now() + chrono::Duration::hours(1);

        let mut store: std::collections::HashSet<u64> = std::collections::HashSet::new();
        let apply = |_: EntryKind, data: &serde_json::Value| -> WalResult<()> {
            let n = data["n"].as_u64().unwrap();
            store.insert(n);
            Ok(())
        };
        let mut store2 = std::collections::HashSet::new();
        let apply2 = |_: EntryKind, data: &serde_json::Value| -> WalResult<()> {
            let n = data["n"].as_u64().unwrap();
            store2.insert(n);
            Ok(())
        };
        replay(dir.path(), since, up_to, &[EntryKind::Audit], apply).unwrap();
        replay(dir.path(), since, up_to, &[EntryKind::Audit], apply2).unwrap();
        let first: std::collections::HashSet<u64> = (0..4).collect();
        assert_eq!(store, first);
        assert_eq!(store2, first);
    }
}
