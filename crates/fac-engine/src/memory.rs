//! In-memory store for tests and local development.
//!
//! One `RwLock` guards all tables, so each commit is a single critical
//! section and enforces the same constraints as the Postgres schema.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use fac_audit::AuditEntry;
use fac_loans::{LoanLedger, LoanPlan};
use fac_reconcile::{DeletePlan, InstallmentPlan, StatusPlan};
use fac_schemas::{
    ApprovalStatus, Employee, EntityKind, FinanceError, FinanceResult, Installment, LoanRepayment,
    LoanRequest, LoanWithdrawal, ObligationProfile,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{AuditLog, GarnishmentStore, LoanStore, ProfileAggregate};

#[derive(Default)]
struct Tables {
    employees: HashMap<Uuid, Employee>,
    profiles: HashMap<Uuid, ObligationProfile>,
    installments: HashMap<Uuid, Installment>,
    withdrawals: HashMap<Uuid, LoanWithdrawal>,
    repayments: HashMap<Uuid, LoanRepayment>,
    requests: HashMap<Uuid, LoanRequest>,
    ledger_versions: HashMap<Uuid, i64>,
    audit: Vec<AuditEntry>,
}

impl Tables {
    fn ledger_version(&self, employee_id: Uuid) -> i64 {
        self.ledger_versions.get(&employee_id).copied().unwrap_or(0)
    }

    fn check_ledger_version(&self, employee_id: Uuid, expected: i64) -> FinanceResult<()> {
        let current = self.ledger_version(employee_id);
        if current != expected {
            return Err(FinanceError::Conflict(format!(
                "loan ledger of employee {employee_id} moved from version {expected} to {current}"
            )));
        }
        Ok(())
    }

    fn bump_ledger(&mut self, employee_id: Uuid) {
        *self.ledger_versions.entry(employee_id).or_insert(0) += 1;
    }
}

#[derive(Default)]
pub struct MemStore {
    tables: RwLock<Tables>,
    forced_conflicts: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_employee(&self, employee: Employee) {
        self.tables.write().await.employees.insert(employee.id, employee);
    }

    /// The next `n` commits fail with `Conflict` before touching anything.
    pub fn force_conflicts(&self, n: usize) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    /// Every call fails with `CollaboratorUnavailable` while set.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    pub async fn audit_len(&self) -> usize {
        self.tables.read().await.audit.len()
    }

    fn available(&self) -> FinanceResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FinanceError::unavailable("in-memory store is marked unavailable"));
        }
        Ok(())
    }

    fn forced_conflict(&self) -> FinanceResult<()> {
        let hit = self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hit {
            return Err(FinanceError::Conflict("forced conflict".into()));
        }
        Ok(())
    }

    fn before_commit(&self) -> FinanceResult<()> {
        self.available()?;
        self.forced_conflict()
    }
}

fn check_profile_version(t: &Tables, profile_id: Uuid, expected: i64) -> FinanceResult<()> {
    let current = t
        .profiles
        .get(&profile_id)
        .ok_or_else(|| FinanceError::not_found(EntityKind::ObligationProfile, profile_id))?
        .version;
    if current != expected {
        return Err(FinanceError::Conflict(format!(
            "profile {profile_id} moved from version {expected} to {current}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Garnishments
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl GarnishmentStore for MemStore {
    async fn insert_profile(
        &self,
        profile: &ObligationProfile,
        audit: &AuditEntry,
    ) -> FinanceResult<()> {
        self.available()?;
        let mut t = self.tables.write().await;
        if t.profiles.values().any(|p| p.case_number == profile.case_number) {
            return Err(FinanceError::validation(format!(
                "case number {} is already registered",
                profile.case_number
            )));
        }
        t.profiles.insert(profile.id, profile.clone());
        t.audit.push(audit.clone());
        Ok(())
    }

    async fn load_profile(&self, profile_id: Uuid) -> FinanceResult<ProfileAggregate> {
        self.available()?;
        let t = self.tables.read().await;
        let profile = t
            .profiles
            .get(&profile_id)
            .cloned()
            .ok_or_else(|| FinanceError::not_found(EntityKind::ObligationProfile, profile_id))?;
        let mut installments: Vec<Installment> = t
            .installments
            .values()
            .filter(|i| i.profile_id == profile_id)
            .cloned()
            .collect();
        installments.sort_by_key(|i| i.installment_number);
        Ok(ProfileAggregate {
            profile,
            installments,
        })
    }

    async fn find_installment(&self, installment_id: Uuid) -> FinanceResult<Installment> {
        self.available()?;
        self.tables
            .read()
            .await
            .installments
            .get(&installment_id)
            .cloned()
            .ok_or_else(|| FinanceError::not_found(EntityKind::Installment, installment_id))
    }

    async fn list_profiles(&self) -> FinanceResult<Vec<ObligationProfile>> {
        self.available()?;
        let mut out: Vec<ObligationProfile> =
            self.tables.read().await.profiles.values().cloned().collect();
        out.sort_by(|a, b| a.case_number.cmp(&b.case_number));
        Ok(out)
    }

    async fn commit_installment(&self, plan: &InstallmentPlan) -> FinanceResult<()> {
        self.before_commit()?;
        let mut t = self.tables.write().await;
        let inst = &plan.installment;
        check_profile_version(&t, inst.profile_id, plan.expected_version)?;

        for other in t
            .installments
            .values()
            .filter(|o| o.profile_id == inst.profile_id && o.id != inst.id)
        {
            if other.installment_number == inst.installment_number {
                return Err(FinanceError::Conflict(format!(
                    "installment number {} is already taken",
                    inst.installment_number
                )));
            }
            if other.payroll_date == inst.payroll_date {
                return Err(FinanceError::validation(format!(
                    "an installment for payroll date {} already exists",
                    inst.payroll_date
                )));
            }
        }

        t.installments.insert(inst.id, inst.clone());
        t.profiles.insert(plan.profile.id, plan.profile.clone());
        t.audit.extend(plan.audit.iter().cloned());
        Ok(())
    }

    async fn commit_status(&self, plan: &StatusPlan) -> FinanceResult<()> {
        self.before_commit()?;
        let mut t = self.tables.write().await;
        check_profile_version(&t, plan.profile.id, plan.expected_version)?;
        t.profiles.insert(plan.profile.id, plan.profile.clone());
        t.audit.extend(plan.audit.iter().cloned());
        Ok(())
    }

    async fn delete_profile(&self, plan: &DeletePlan) -> FinanceResult<()> {
        self.before_commit()?;
        let mut t = self.tables.write().await;
        check_profile_version(&t, plan.profile_id, plan.expected_version)?;
        t.profiles.remove(&plan.profile_id);
        t.installments.retain(|_, i| i.profile_id != plan.profile_id);
        t.audit.extend(plan.audit.iter().cloned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl LoanStore for MemStore {
    async fn find_employee(&self, employee_id: Uuid) -> FinanceResult<Employee> {
        self.available()?;
        self.tables
            .read()
            .await
            .employees
            .get(&employee_id)
            .cloned()
            .ok_or_else(|| FinanceError::not_found(EntityKind::Employee, employee_id))
    }

    async fn load_ledger(&self, employee_id: Uuid) -> FinanceResult<LoanLedger> {
        self.available()?;
        let t = self.tables.read().await;
        let mut withdrawals: Vec<LoanWithdrawal> = t
            .withdrawals
            .values()
            .filter(|w| w.employee_id == employee_id)
            .cloned()
            .collect();
        withdrawals.sort_by_key(|w| (w.withdrawal_date, w.created_at));
        let mut repayments: Vec<LoanRepayment> = t
            .repayments
            .values()
            .filter(|r| r.employee_id == employee_id)
            .cloned()
            .collect();
        repayments.sort_by_key(|r| (r.payroll_date, r.created_at));
        Ok(LoanLedger {
            employee_id,
            withdrawals,
            repayments,
            version: t.ledger_version(employee_id),
        })
    }

    async fn find_withdrawal(&self, withdrawal_id: Uuid) -> FinanceResult<LoanWithdrawal> {
        self.available()?;
        self.tables
            .read()
            .await
            .withdrawals
            .get(&withdrawal_id)
            .cloned()
            .ok_or_else(|| FinanceError::not_found(EntityKind::LoanWithdrawal, withdrawal_id))
    }

    async fn commit_withdrawal(
        &self,
        expected_version: i64,
        plan: &LoanPlan<LoanWithdrawal>,
    ) -> FinanceResult<()> {
        self.before_commit()?;
        let mut t = self.tables.write().await;
        let employee_id = plan.record.employee_id;
        t.check_ledger_version(employee_id, expected_version)?;
        t.withdrawals.insert(plan.record.id, plan.record.clone());
        t.bump_ledger(employee_id);
        t.audit.push(plan.audit.clone());
        Ok(())
    }

    async fn commit_repayment(
        &self,
        expected_version: i64,
        plan: &LoanPlan<LoanRepayment>,
    ) -> FinanceResult<()> {
        self.before_commit()?;
        let mut t = self.tables.write().await;
        let employee_id = plan.record.employee_id;
        t.check_ledger_version(employee_id, expected_version)?;
        t.repayments.insert(plan.record.id, plan.record.clone());
        t.bump_ledger(employee_id);
        t.audit.push(plan.audit.clone());
        Ok(())
    }

    async fn commit_withdrawal_status(
        &self,
        expected_version: i64,
        plan: &LoanPlan<LoanWithdrawal>,
    ) -> FinanceResult<()> {
        self.before_commit()?;
        let mut t = self.tables.write().await;
        let employee_id = plan.record.employee_id;
        if !t.withdrawals.contains_key(&plan.record.id) {
            return Err(FinanceError::not_found(
                EntityKind::LoanWithdrawal,
                plan.record.id,
            ));
        }
        t.check_ledger_version(employee_id, expected_version)?;
        t.withdrawals.insert(plan.record.id, plan.record.clone());
        t.bump_ledger(employee_id);
        t.audit.push(plan.audit.clone());
        Ok(())
    }

    async fn insert_request(&self, plan: &LoanPlan<LoanRequest>) -> FinanceResult<()> {
        self.before_commit()?;
        let mut t = self.tables.write().await;
        t.requests.insert(plan.record.id, plan.record.clone());
        t.audit.push(plan.audit.clone());
        Ok(())
    }

    async fn find_request(&self, request_id: Uuid) -> FinanceResult<LoanRequest> {
        self.available()?;
        self.tables
            .read()
            .await
            .requests
            .get(&request_id)
            .cloned()
            .ok_or_else(|| FinanceError::not_found(EntityKind::LoanRequest, request_id))
    }

    async fn list_requests(&self, employee_id: Uuid) -> FinanceResult<Vec<LoanRequest>> {
        self.available()?;
        let mut out: Vec<LoanRequest> = self
            .tables
            .read()
            .await
            .requests
            .values()
            .filter(|r| r.employee_id == employee_id)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.created_at);
        Ok(out)
    }

    async fn commit_request_status(
        &self,
        expected_status: ApprovalStatus,
        plan: &LoanPlan<LoanRequest>,
    ) -> FinanceResult<()> {
        self.before_commit()?;
        let mut t = self.tables.write().await;
        let current = t
            .requests
            .get(&plan.record.id)
            .ok_or_else(|| FinanceError::not_found(EntityKind::LoanRequest, plan.record.id))?
            .status;
        if current != expected_status {
            return Err(FinanceError::Conflict(format!(
                "loan request {} moved from '{expected_status}' to '{current}'",
                plan.record.id
            )));
        }
        t.requests.insert(plan.record.id, plan.record.clone());
        t.audit.push(plan.audit.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuditLog for MemStore {
    async fn history(&self, table_name: &str, record_id: Uuid) -> FinanceResult<Vec<AuditEntry>> {
        self.available()?;
        let mut out: Vec<AuditEntry> = self
            .tables
            .read()
            .await
            .audit
            .iter()
            .filter(|e| e.table_name == table_name && e.record_id == record_id)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.timestamp);
        Ok(out)
    }
}
