//! Read-only balance commands over the Postgres-backed console.

use anyhow::{Context, Result};
use fac_engine::Console;
use fac_schemas::Money;
use uuid::Uuid;

pub async fn list_profiles(console: &Console) -> Result<()> {
    let profiles = console.garnishments.list_profiles().await?;
    for p in &profiles {
        println!(
            "profile_id={} case_number={} status={} owed={} paid={} balance={}",
            p.id,
            p.case_number,
            p.status.as_str(),
            p.total_amount_owed,
            p.amount_paid_so_far,
            p.balance_remaining
        );
    }
    println!("profiles={}", profiles.len());
    Ok(())
}

/// Exits non-zero when the stored totals disagree with the installments.
pub async fn check_profile(console: &Console, profile_id: Uuid) -> Result<()> {
    let report = console.garnishments.check_profile(profile_id).await?;
    println!("profile_id={}", report.profile_id);
    println!("derived_paid={}", report.derived.paid);
    println!("derived_balance={}", report.derived.balance);
    for f in &report.findings {
        println!("finding={}", serde_json::to_string(f)?);
    }
    if !report.is_clean() {
        anyhow::bail!(
            "PROFILE_INCONSISTENT profile_id={} findings={}",
            profile_id,
            report.findings.len()
        );
    }
    println!("consistent=true");
    Ok(())
}

pub async fn outstanding(console: &Console, employee_id: Uuid) -> Result<()> {
    let outstanding = console.loans.outstanding_balance(employee_id).await?;
    println!("employee_id={employee_id}");
    println!("policy={}", console.loans.policy().as_str());
    println!("outstanding={outstanding}");
    Ok(())
}

pub async fn evaluate(console: &Console, employee_id: Uuid, amount: &str) -> Result<()> {
    let requested =
        Money::parse(amount).with_context(|| format!("invalid --amount '{amount}'"))?;
    let e = console
        .loans
        .evaluate_withdrawal(employee_id, requested)
        .await?;
    println!("employee_id={employee_id}");
    println!("requested={requested}");
    println!("total_outstanding_at_time={}", e.total_outstanding_at_time);
    println!("requires_interest={}", e.requires_interest);
    Ok(())
}
