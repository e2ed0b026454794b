//! Persistence seams.
//!
//! Every `commit_*` call is one atomic unit: either all rows and audit
//! entries land, or nothing does. Commits are conditional on the version the
//! plan was validated against and report a stale version as
//! `FinanceError::Conflict`.

use fac_audit::AuditEntry;
use fac_loans::{LoanLedger, LoanPlan};
use fac_reconcile::{DeletePlan, InstallmentPlan, StatusPlan};
use fac_schemas::{
    ApprovalStatus, Employee, FinanceResult, Installment, LoanRepayment, LoanRequest,
    LoanWithdrawal, ObligationProfile,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A profile with all of its installments, read in one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileAggregate {
    pub profile: ObligationProfile,
    /// Ordered by `installment_number`.
    pub installments: Vec<Installment>,
}

#[async_trait::async_trait]
pub trait GarnishmentStore: Send + Sync {
    /// Duplicate `case_number` is a `Validation` error.
    async fn insert_profile(
        &self,
        profile: &ObligationProfile,
        audit: &AuditEntry,
    ) -> FinanceResult<()>;

    async fn load_profile(&self, profile_id: Uuid) -> FinanceResult<ProfileAggregate>;

    async fn find_installment(&self, installment_id: Uuid) -> FinanceResult<Installment>;

    async fn list_profiles(&self) -> FinanceResult<Vec<ObligationProfile>>;

    /// Upsert the installment and replace the profile row.
    ///
    /// Stale profile version or a taken `installment_number` is `Conflict`;
    /// a taken payroll date is `Validation`.
    async fn commit_installment(&self, plan: &InstallmentPlan) -> FinanceResult<()>;

    async fn commit_status(&self, plan: &StatusPlan) -> FinanceResult<()>;

    /// Removes the profile and its installments.
    async fn delete_profile(&self, plan: &DeletePlan) -> FinanceResult<()>;
}

#[async_trait::async_trait]
pub trait LoanStore: Send + Sync {
    async fn find_employee(&self, employee_id: Uuid) -> FinanceResult<Employee>;

    /// Empty ledger (version 0) for an employee with no loan history.
    async fn load_ledger(&self, employee_id: Uuid) -> FinanceResult<LoanLedger>;

    async fn find_withdrawal(&self, withdrawal_id: Uuid) -> FinanceResult<LoanWithdrawal>;

    /// Inserts the withdrawal and bumps the ledger version.
    async fn commit_withdrawal(
        &self,
        expected_version: i64,
        plan: &LoanPlan<LoanWithdrawal>,
    ) -> FinanceResult<()>;

    async fn commit_repayment(
        &self,
        expected_version: i64,
        plan: &LoanPlan<LoanRepayment>,
    ) -> FinanceResult<()>;

    /// Replaces the withdrawal row. Approval changes what counts as
    /// outstanding, so this also goes through the ledger version.
    async fn commit_withdrawal_status(
        &self,
        expected_version: i64,
        plan: &LoanPlan<LoanWithdrawal>,
    ) -> FinanceResult<()>;

    async fn insert_request(&self, plan: &LoanPlan<LoanRequest>) -> FinanceResult<()>;

    async fn find_request(&self, request_id: Uuid) -> FinanceResult<LoanRequest>;

    async fn list_requests(&self, employee_id: Uuid) -> FinanceResult<Vec<LoanRequest>>;

    /// Compare-and-set on the request's status.
    async fn commit_request_status(
        &self,
        expected_status: ApprovalStatus,
        plan: &LoanPlan<LoanRequest>,
    ) -> FinanceResult<()>;
}

#[async_trait::async_trait]
pub trait AuditLog: Send + Sync {
    /// Entries for one record, oldest first.
    async fn history(&self, table_name: &str, record_id: Uuid) -> FinanceResult<Vec<AuditEntry>>;
}
