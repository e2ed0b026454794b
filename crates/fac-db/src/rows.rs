//! Row decoding. Money columns are `*_cents` bigints; statuses are text.

use fac_audit::{AuditAction, AuditEntry};
use fac_schemas::{
    ApprovalStatus, Employee, FinanceError, FinanceResult, Installment, LoanRepayment,
    LoanRequest, LoanWithdrawal, Money, ObligationProfile, ProfileStatus,
};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::errors::classify;

pub(crate) const PROFILE_COLUMNS: &str = "id, case_number, employee_id, creditor_name, \
     court_district, law_firm, total_amount_owed_cents, amount_paid_so_far_cents, \
     balance_remaining_cents, status, notes, document_ref, version, created_at, updated_at";

pub(crate) const INSTALLMENT_COLUMNS: &str = "id, profile_id, installment_number, amount_cents, \
     payroll_date, check_number, notes, document_ref, recorded_by, created_at, updated_at";

pub(crate) const WITHDRAWAL_COLUMNS: &str = "id, employee_id, amount_cents, withdrawal_date, \
     due_date, approved_by, notes, status, total_outstanding_at_time_cents, requires_interest, \
     created_at, updated_at";

pub(crate) const REPAYMENT_COLUMNS: &str =
    "id, employee_id, amount_cents, payroll_date, notes, recorded_by, created_at";

pub(crate) const REQUEST_COLUMNS: &str = "id, employee_id, requested_amount_cents, purpose, \
     status, notes, requested_by, created_at, updated_at";

fn get<'r, T>(row: &'r PgRow, col: &'static str) -> FinanceResult<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(col).map_err(|e| classify("decode row", e))
}

fn money(row: &PgRow, col: &'static str) -> FinanceResult<Money> {
    Ok(Money::from_cents(get::<i64>(row, col)?))
}

pub(crate) fn employee(row: &PgRow) -> FinanceResult<Employee> {
    Ok(Employee {
        id: get(row, "id")?,
        full_name: get(row, "full_name")?,
        active: get(row, "active")?,
    })
}

pub(crate) fn profile(row: &PgRow) -> FinanceResult<ObligationProfile> {
    let status: String = get(row, "status")?;
    Ok(ObligationProfile {
        id: get(row, "id")?,
        case_number: get(row, "case_number")?,
        employee_id: get(row, "employee_id")?,
        creditor_name: get(row, "creditor_name")?,
        court_district: get(row, "court_district")?,
        law_firm: get(row, "law_firm")?,
        total_amount_owed: money(row, "total_amount_owed_cents")?,
        amount_paid_so_far: money(row, "amount_paid_so_far_cents")?,
        balance_remaining: money(row, "balance_remaining_cents")?,
        status: ProfileStatus::parse(&status)?,
        notes: get(row, "notes")?,
        document_ref: get(row, "document_ref")?,
        version: get(row, "version")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn installment(row: &PgRow) -> FinanceResult<Installment> {
    Ok(Installment {
        id: get(row, "id")?,
        profile_id: get(row, "profile_id")?,
        installment_number: get(row, "installment_number")?,
        amount: money(row, "amount_cents")?,
        payroll_date: get(row, "payroll_date")?,
        check_number: get(row, "check_number")?,
        notes: get(row, "notes")?,
        document_ref: get(row, "document_ref")?,
        recorded_by: get(row, "recorded_by")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn withdrawal(row: &PgRow) -> FinanceResult<LoanWithdrawal> {
    let status: String = get(row, "status")?;
    Ok(LoanWithdrawal {
        id: get(row, "id")?,
        employee_id: get(row, "employee_id")?,
        amount: money(row, "amount_cents")?,
        withdrawal_date: get(row, "withdrawal_date")?,
        due_date: get(row, "due_date")?,
        approved_by: get(row, "approved_by")?,
        notes: get(row, "notes")?,
        status: ApprovalStatus::parse(&status)?,
        total_outstanding_at_time: money(row, "total_outstanding_at_time_cents")?,
        requires_interest: get(row, "requires_interest")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn repayment(row: &PgRow) -> FinanceResult<LoanRepayment> {
    Ok(LoanRepayment {
        id: get(row, "id")?,
        employee_id: get(row, "employee_id")?,
        amount: money(row, "amount_cents")?,
        payroll_date: get(row, "payroll_date")?,
        notes: get(row, "notes")?,
        recorded_by: get(row, "recorded_by")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn request(row: &PgRow) -> FinanceResult<LoanRequest> {
    let status: String = get(row, "status")?;
    Ok(LoanRequest {
        id: get(row, "id")?,
        employee_id: get(row, "employee_id")?,
        requested_amount: money(row, "requested_amount_cents")?,
        purpose: get(row, "purpose")?,
        status: ApprovalStatus::parse(&status)?,
        notes: get(row, "notes")?,
        requested_by: get(row, "requested_by")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn audit_entry(row: &PgRow) -> FinanceResult<AuditEntry> {
    let action: String = get(row, "action")?;
    let action = AuditAction::parse(&action).ok_or_else(|| {
        FinanceError::unavailable(format!("audit_log holds unknown action '{action}'"))
    })?;
    let old_values: Option<Value> = get(row, "old_values")?;
    let new_values: Option<Value> = get(row, "new_values")?;
    Ok(AuditEntry {
        id: get(row, "id")?,
        action,
        table_name: get(row, "table_name")?,
        record_id: get(row, "record_id")?,
        old_values: old_values.unwrap_or(Value::Null),
        new_values: new_values.unwrap_or(Value::Null),
        actor_id: get(row, "actor_id")?,
        actor_name: get(row, "actor_name")?,
        timestamp: get(row, "ts")?,
    })
}
