use std::sync::Arc;

use chrono::Utc;
use fac_audit::AuditEntry;
use fac_loans::{
    evaluate_withdrawal, plan_repayment, plan_request, plan_request_status, plan_withdrawal,
    plan_withdrawal_status, validate_withdrawal_status_change, LoanLedger, OutstandingPolicy,
    WithdrawalEvaluation,
};
use fac_schemas::{
    ApprovalStatus, EntityKind, FinanceError, FinanceResult, LoanRepayment, LoanRequest,
    LoanWithdrawal, Money, NewLoanRequest, NewRepayment, NewWithdrawal, Principal,
};
use tracing::info;
use uuid::Uuid;

use crate::retry::retry_once_on_conflict;
use crate::{AuditMirror, ChangeBus, KeyedLocks, LoanStore};

/// Loan Obligation Tracker service.
///
/// Writes that change an employee's outstanding balance serialize on that
/// employee's ledger: in-process lock plus the store's ledger version.
pub struct LoanDesk {
    store: Arc<dyn LoanStore>,
    bus: ChangeBus,
    locks: KeyedLocks,
    policy: OutstandingPolicy,
    mirror: Option<AuditMirror>,
}

impl LoanDesk {
    pub fn new(
        store: Arc<dyn LoanStore>,
        bus: ChangeBus,
        policy: OutstandingPolicy,
        mirror: Option<AuditMirror>,
    ) -> Self {
        Self {
            store,
            bus,
            locks: KeyedLocks::new(),
            policy,
            mirror,
        }
    }

    pub fn policy(&self) -> OutstandingPolicy {
        self.policy
    }

    async fn committed(&self, entry: &AuditEntry) {
        let entries = std::slice::from_ref(entry);
        self.bus.publish_all(entries);
        if let Some(m) = &self.mirror {
            m.record(entries).await;
        }
    }

    /// Ledger of an existing employee.
    pub async fn ledger(&self, employee_id: Uuid) -> FinanceResult<LoanLedger> {
        self.store.find_employee(employee_id).await?;
        self.store.load_ledger(employee_id).await
    }

    pub async fn outstanding_balance(&self, employee_id: Uuid) -> FinanceResult<Money> {
        Ok(self.ledger(employee_id).await?.outstanding(self.policy))
    }

    /// Read-only preview of what a withdrawal would snapshot.
    pub async fn evaluate_withdrawal(
        &self,
        employee_id: Uuid,
        requested: Money,
    ) -> FinanceResult<WithdrawalEvaluation> {
        if !requested.is_positive() {
            return Err(FinanceError::validation(format!(
                "requested amount must be greater than zero (got {requested})"
            )));
        }
        let outstanding = self.outstanding_balance(employee_id).await?;
        Ok(evaluate_withdrawal(outstanding, requested))
    }

    pub async fn record_withdrawal(
        &self,
        principal: &Principal,
        employee_id: Uuid,
        draft: NewWithdrawal,
    ) -> FinanceResult<LoanWithdrawal> {
        principal.require_edit()?;
        self.store.find_employee(employee_id).await?;
        let _guard = self.locks.lock(employee_id).await;

        let draft = &draft;
        let policy = self.policy;
        let plan = retry_once_on_conflict("record_withdrawal", || async move {
            let ledger = self.store.load_ledger(employee_id).await?;
            let plan = plan_withdrawal(
                employee_id,
                ledger.outstanding(policy),
                draft,
                principal,
                Utc::now(),
            )?;
            self.store.commit_withdrawal(ledger.version, &plan).await?;
            Ok(plan)
        })
        .await?;

        info!(
            employee_id = %employee_id,
            withdrawal_id = %plan.record.id,
            amount = %plan.record.amount,
            outstanding_before = %plan.record.total_outstanding_at_time,
            requires_interest = plan.record.requires_interest,
            "loan withdrawal recorded"
        );
        self.committed(&plan.audit).await;
        Ok(plan.record)
    }

    pub async fn record_repayment(
        &self,
        principal: &Principal,
        employee_id: Uuid,
        draft: NewRepayment,
    ) -> FinanceResult<LoanRepayment> {
        principal.require_edit()?;
        self.store.find_employee(employee_id).await?;
        let _guard = self.locks.lock(employee_id).await;

        let draft = &draft;
        let policy = self.policy;
        let plan = retry_once_on_conflict("record_repayment", || async move {
            let ledger = self.store.load_ledger(employee_id).await?;
            let plan = plan_repayment(
                employee_id,
                ledger.outstanding(policy),
                draft,
                principal,
                Utc::now(),
            )?;
            self.store.commit_repayment(ledger.version, &plan).await?;
            Ok(plan)
        })
        .await?;

        info!(
            employee_id = %employee_id,
            repayment_id = %plan.record.id,
            amount = %plan.record.amount,
            "loan repayment recorded"
        );
        self.committed(&plan.audit).await;
        Ok(plan.record)
    }

    pub async fn change_withdrawal_status(
        &self,
        principal: &Principal,
        withdrawal_id: Uuid,
        target: ApprovalStatus,
    ) -> FinanceResult<LoanWithdrawal> {
        let employee_id = self.store.find_withdrawal(withdrawal_id).await?.employee_id;
        let _guard = self.locks.lock(employee_id).await;
        let policy = self.policy;

        let plan = retry_once_on_conflict("change_withdrawal_status", || async move {
            let ledger = self.store.load_ledger(employee_id).await?;
            let current = ledger
                .withdrawals
                .iter()
                .find(|w| w.id == withdrawal_id)
                .ok_or_else(|| FinanceError::not_found(EntityKind::LoanWithdrawal, withdrawal_id))?;
            let plan = plan_withdrawal_status(current, target, principal, Utc::now())?;
            validate_withdrawal_status_change(policy, &ledger, &plan.record)?;
            self.store
                .commit_withdrawal_status(ledger.version, &plan)
                .await?;
            Ok(plan)
        })
        .await?;

        info!(
            withdrawal_id = %withdrawal_id,
            status = %plan.record.status,
            actor = %principal.name,
            "loan withdrawal status changed"
        );
        self.committed(&plan.audit).await;
        Ok(plan.record)
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    pub async fn submit_request(
        &self,
        principal: &Principal,
        employee_id: Uuid,
        draft: NewLoanRequest,
    ) -> FinanceResult<LoanRequest> {
        principal.require_edit()?;
        let outstanding = self.outstanding_balance(employee_id).await?;
        let plan = plan_request(employee_id, outstanding, &draft, principal, Utc::now())?;
        self.store.insert_request(&plan).await?;

        info!(
            employee_id = %employee_id,
            request_id = %plan.record.id,
            requested = %plan.record.requested_amount,
            "loan request submitted"
        );
        self.committed(&plan.audit).await;
        Ok(plan.record)
    }

    pub async fn list_requests(&self, employee_id: Uuid) -> FinanceResult<Vec<LoanRequest>> {
        self.store.find_employee(employee_id).await?;
        self.store.list_requests(employee_id).await
    }

    pub async fn change_request_status(
        &self,
        principal: &Principal,
        request_id: Uuid,
        target: ApprovalStatus,
    ) -> FinanceResult<LoanRequest> {
        let plan = retry_once_on_conflict("change_request_status", || async move {
            let current = self.store.find_request(request_id).await?;
            let plan = plan_request_status(&current, target, principal, Utc::now())?;
            self.store
                .commit_request_status(current.status, &plan)
                .await?;
            Ok(plan)
        })
        .await?;

        info!(
            request_id = %request_id,
            status = %plan.record.status,
            actor = %principal.name,
            "loan request status changed"
        );
        self.committed(&plan.audit).await;
        Ok(plan.record)
    }
}
