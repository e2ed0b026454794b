use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::AuditEntry;

/// Append-only JSON Lines mirror of committed audit entries.
///
/// With `hash_chain` on, every line carries `hash_prev` (the previous line's
/// `hash_self`) and `hash_self` (SHA-256 of the line's canonical JSON without
/// `hash_self`). Opening an existing file resumes the chain from its last line.
pub struct AuditWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    lines: u64,
}

/// One line of the mirror file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainedEntry {
    #[serde(flatten)]
    pub entry: AuditEntry,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

impl AuditWriter {
    /// Open (or create) the mirror file and pick up the existing chain tail.
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }

        let mut writer = Self {
            path,
            hash_chain,
            last_hash: None,
            lines: 0,
        };

        if writer.path.exists() {
            let content = fs::read_to_string(&writer.path)
                .with_context(|| format!("read audit mirror {:?}", writer.path))?;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                let rec: ChainedEntry = serde_json::from_str(line.trim())
                    .with_context(|| format!("parse audit mirror {:?}", writer.path))?;
                writer.last_hash = rec.hash_self;
                writer.lines += 1;
            }
        }

        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Number of lines in the file, including ones written before `open`.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn append(&mut self, entry: &AuditEntry) -> Result<ChainedEntry> {
        let mut rec = ChainedEntry {
            entry: entry.clone(),
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            rec.hash_prev = self.last_hash.clone();
            let h = compute_entry_hash(&rec)?;
            rec.hash_self = Some(h.clone());
            self.last_hash = Some(h);
        }

        let line = canonical_json_line(&rec)?;
        append_line(&self.path, &line)?;
        self.lines += 1;

        Ok(rec)
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit mirror {:?}", path))?;
    writeln!(f, "{line}").context("write audit line failed")?;
    Ok(())
}

/// Compact JSON with object keys sorted at every depth.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit entry failed")?;
    serde_json::to_string(&sort_keys(raw)).context("json stringify failed")
}

fn sort_keys(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut pairs: Vec<(String, Value)> = map.into_iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(pairs.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

pub fn compute_entry_hash(rec: &ChainedEntry) -> Result<String> {
    let mut unsigned = rec.clone();
    unsigned.hash_self = None;

    let canonical = canonical_json_line(&unsigned)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    /// 1-based line of the first break.
    Broken { line: usize, reason: String },
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit mirror {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let rec: ChainedEntry = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit entry at line {}", i + 1))?;
        count += 1;

        if rec.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, rec.hash_prev
                ),
            });
        }

        if let Some(claimed) = &rec.hash_self {
            let recomputed = compute_entry_hash(&rec)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                });
            }
        }

        prev_hash = rec.hash_self;
    }

    Ok(VerifyResult::Valid { lines: count })
}

/// Parse every entry from a mirror file, ignoring the chain fields.
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<AuditEntry>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit mirror {:?}", path.as_ref()))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, l)| {
            serde_json::from_str::<ChainedEntry>(l.trim())
                .map(|r| r.entry)
                .with_context(|| format!("parse audit entry #{}", i + 1))
        })
        .collect()
}
