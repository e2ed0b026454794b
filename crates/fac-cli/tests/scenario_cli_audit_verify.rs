use assert_cmd::prelude::*;
use chrono::{TimeZone, Utc};
use fac_audit::{AuditEntry, AuditWriter};
use fac_schemas::{EntityKind, Principal, Role};
use predicates::prelude::*;
use serde_json::json;
use std::process::Command;
use uuid::Uuid;

fn clerk() -> Principal {
    Principal::new(Uuid::new_v4(), "payroll clerk", Role::Editor)
}

/// Insert then two updates of one profile, plus an unrelated record.
fn write_trail(path: &std::path::Path, record_id: Uuid) -> anyhow::Result<()> {
    let actor = clerk();
    let t = |m: u32| Utc.with_ymd_and_hms(2026, 3, 1, 9, m, 0).unwrap();
    let v1 = json!({"id": record_id, "balance_remaining": "1000.00", "status": "active"});
    let v2 = json!({"id": record_id, "balance_remaining": "700.00", "status": "active"});
    let v3 = json!({"id": record_id, "balance_remaining": "700.00", "status": "suspended"});

    let mut w = AuditWriter::open(path, true)?;
    w.append(&AuditEntry::insert(EntityKind::ObligationProfile, record_id, &v1, &actor, t(0))?)?;
    w.append(
        &AuditEntry::update(EntityKind::ObligationProfile, record_id, &v1, &v2, &actor, t(1))?
            .unwrap(),
    )?;
    let other = Uuid::new_v4();
    w.append(&AuditEntry::insert(
        EntityKind::ObligationProfile,
        other,
        &json!({"id": other}),
        &actor,
        t(2),
    )?)?;
    w.append(
        &AuditEntry::update(EntityKind::ObligationProfile, record_id, &v2, &v3, &actor, t(3))?
            .unwrap(),
    )?;
    Ok(())
}

#[test]
fn untouched_mirror_verifies() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("audit.jsonl");
    write_trail(&path, Uuid::new_v4())?;

    Command::cargo_bin("fac-cli")?
        .args(["audit", "verify", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid=true lines=4"));
    Ok(())
}

#[test]
fn edited_mirror_is_reported_broken() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("audit.jsonl");
    write_trail(&path, Uuid::new_v4())?;

    let content = std::fs::read_to_string(&path)?;
    std::fs::write(&path, content.replacen("700.00", "7.00", 1))?;

    Command::cargo_bin("fac-cli")?
        .args(["audit", "verify", "--path"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("AUDIT_CHAIN_BROKEN"))
        .stderr(predicate::str::contains("line=2"));
    Ok(())
}

#[test]
fn offline_history_replays_one_record() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("audit.jsonl");
    let record_id = Uuid::new_v4();
    write_trail(&path, record_id)?;

    let out = Command::cargo_bin("fac-cli")?
        .args(["audit", "history", "--table", "garnishment_profiles", "--record-id"])
        .arg(record_id.to_string())
        .arg("--path")
        .arg(&path)
        .output()?;
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout)?;

    assert!(stdout.contains("entries=3"));
    let last = stdout.lines().last().unwrap();
    assert!(last.contains("action=update"));
    assert!(last.contains("\"status\":\"suspended\""));
    assert!(last.contains("\"balance_remaining\":\"700.00\""));
    Ok(())
}

#[test]
fn history_rejects_unknown_table() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("audit.jsonl");
    write_trail(&path, Uuid::new_v4())?;

    Command::cargo_bin("fac-cli")?
        .args(["audit", "history", "--table", "payroll_runs", "--record-id"])
        .arg(Uuid::new_v4().to_string())
        .arg("--path")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown audited table"));
    Ok(())
}
