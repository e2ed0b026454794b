//! Audit trail commands: hash-chain verification and history reconstruction.

use anyhow::{bail, Result};
use fac_audit::{read_entries, reconstruct_history, verify_hash_chain, HistoryPoint, VerifyResult};
use fac_engine::Console;
use fac_schemas::EntityKind;
use uuid::Uuid;

pub fn verify(path: &str) -> Result<()> {
    match verify_hash_chain(path)? {
        VerifyResult::Valid { lines } => {
            println!("audit_path={path}");
            println!("valid=true lines={lines}");
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            bail!("AUDIT_CHAIN_BROKEN path={path} line={line} reason={reason}")
        }
    }
}

/// Offline reconstruction from a JSONL mirror; no database needed.
pub fn history_from_file(path: &str, table: &str, record_id: Uuid) -> Result<()> {
    known_table(table)?;
    let entries: Vec<_> = read_entries(path)?
        .into_iter()
        .filter(|e| e.table_name == table && e.record_id == record_id)
        .collect();
    print_history(table, record_id, &reconstruct_history(&entries))
}

pub async fn history_from_db(console: &Console, table: &str, record_id: Uuid) -> Result<()> {
    let points = console.garnishments.reconstruct(table, record_id).await?;
    print_history(table, record_id, &points)
}

fn known_table(table: &str) -> Result<()> {
    if EntityKind::from_table_name(table).is_none() {
        bail!("unknown audited table: {table}");
    }
    Ok(())
}

fn print_history(table: &str, record_id: Uuid, points: &[HistoryPoint]) -> Result<()> {
    println!("table={table} record_id={record_id} entries={}", points.len());
    for p in points {
        let state = match &p.state {
            Some(v) => serde_json::to_string(v)?,
            None => "deleted".to_string(),
        };
        println!(
            "at={} action={} actor={} state={}",
            p.at.to_rfc3339(),
            p.action,
            p.actor_name,
            state
        );
    }
    Ok(())
}
