use chrono::{DateTime, Utc};
use fac_audit::AuditEntry;
use fac_lifecycle::authorize_transition;
use fac_schemas::{
    ApprovalStatus, EntityKind, FinanceResult, LoanRepayment, LoanRequest, LoanWithdrawal, Money,
    NewLoanRequest, NewRepayment, NewWithdrawal, Principal,
};
use uuid::Uuid;

use crate::{
    evaluate_withdrawal, request_annotation, validate_new_request, validate_new_withdrawal,
    validate_repayment,
};

/// A validated record plus the audit entry that goes with it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanPlan<T> {
    pub record: T,
    pub audit: AuditEntry,
}

/// New `pending` withdrawal carrying the write-once evaluation snapshot.
pub fn plan_withdrawal(
    employee_id: Uuid,
    outstanding: Money,
    draft: &NewWithdrawal,
    actor: &Principal,
    now: DateTime<Utc>,
) -> FinanceResult<LoanPlan<LoanWithdrawal>> {
    validate_new_withdrawal(draft)?;
    let eval = evaluate_withdrawal(outstanding, draft.amount);

    let record = LoanWithdrawal {
        id: Uuid::new_v4(),
        employee_id,
        amount: draft.amount,
        withdrawal_date: draft.withdrawal_date,
        due_date: draft.due_date,
        approved_by: None,
        notes: draft.notes.clone(),
        status: ApprovalStatus::Pending,
        total_outstanding_at_time: eval.total_outstanding_at_time,
        requires_interest: eval.requires_interest,
        created_at: now,
        updated_at: now,
    };
    let audit = AuditEntry::insert(EntityKind::LoanWithdrawal, record.id, &record, actor, now)?;
    Ok(LoanPlan { record, audit })
}

pub fn plan_repayment(
    employee_id: Uuid,
    outstanding: Money,
    draft: &NewRepayment,
    actor: &Principal,
    now: DateTime<Utc>,
) -> FinanceResult<LoanPlan<LoanRepayment>> {
    validate_repayment(outstanding, draft.amount)?;

    let record = LoanRepayment {
        id: Uuid::new_v4(),
        employee_id,
        amount: draft.amount,
        payroll_date: draft.payroll_date,
        notes: draft.notes.clone(),
        recorded_by: actor.id,
        created_at: now,
    };
    let audit = AuditEntry::insert(EntityKind::LoanRepayment, record.id, &record, actor, now)?;
    Ok(LoanPlan { record, audit })
}

/// New `pending` request. The threshold note is appended to caller notes.
pub fn plan_request(
    employee_id: Uuid,
    outstanding: Money,
    draft: &NewLoanRequest,
    actor: &Principal,
    now: DateTime<Utc>,
) -> FinanceResult<LoanPlan<LoanRequest>> {
    validate_new_request(draft)?;

    let notes = match (draft.notes.as_deref(), request_annotation(outstanding, draft.requested_amount)) {
        (Some(n), Some(a)) if !n.trim().is_empty() => Some(format!("{n}\n{a}")),
        (_, Some(a)) => Some(a),
        (n, None) => n.map(str::to_string),
    };

    let record = LoanRequest {
        id: Uuid::new_v4(),
        employee_id,
        requested_amount: draft.requested_amount,
        purpose: draft.purpose.trim().to_string(),
        status: ApprovalStatus::Pending,
        notes,
        requested_by: actor.id,
        created_at: now,
        updated_at: now,
    };
    let audit = AuditEntry::insert(EntityKind::LoanRequest, record.id, &record, actor, now)?;
    Ok(LoanPlan { record, audit })
}

/// Guarded approval step. Approvals stamp `approved_by`; snapshots stay.
pub fn plan_withdrawal_status(
    current: &LoanWithdrawal,
    target: ApprovalStatus,
    actor: &Principal,
    now: DateTime<Utc>,
) -> FinanceResult<LoanPlan<LoanWithdrawal>> {
    authorize_transition(
        actor,
        EntityKind::LoanWithdrawal,
        current.status.as_str(),
        target.as_str(),
    )?;

    let mut record = current.clone();
    record.status = target;
    if target.is_approved() {
        record.approved_by = Some(actor.id);
    }
    record.updated_at = now;

    let audit = AuditEntry::status_change(
        EntityKind::LoanWithdrawal,
        record.id,
        current.status.as_str(),
        target.as_str(),
        actor,
        now,
    );
    Ok(LoanPlan { record, audit })
}

pub fn plan_request_status(
    current: &LoanRequest,
    target: ApprovalStatus,
    actor: &Principal,
    now: DateTime<Utc>,
) -> FinanceResult<LoanPlan<LoanRequest>> {
    authorize_transition(
        actor,
        EntityKind::LoanRequest,
        current.status.as_str(),
        target.as_str(),
    )?;

    let mut record = current.clone();
    record.status = target;
    record.updated_at = now;

    let audit = AuditEntry::status_change(
        EntityKind::LoanRequest,
        record.id,
        current.status.as_str(),
        target.as_str(),
        actor,
        now,
    );
    Ok(LoanPlan { record, audit })
}
