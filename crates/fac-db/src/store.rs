//! [`PgStore`]: the engine's store seams over Postgres.
//!
//! Each `commit_*` runs in one transaction: the conditional version write
//! first, then the rows, then the audit entries. Reads that must agree with
//! each other (profile + installments, ledger rows + version) run in a
//! repeatable-read transaction.

use fac_audit::AuditEntry;
use fac_engine::{AuditLog, GarnishmentStore, LoanStore, ProfileAggregate};
use fac_loans::{LoanLedger, LoanPlan};
use fac_reconcile::{DeletePlan, InstallmentPlan, StatusPlan};
use fac_schemas::{
    ApprovalStatus, Employee, EntityKind, FinanceError, FinanceResult, Installment, LoanRepayment,
    LoanRequest, LoanWithdrawal, ObligationProfile,
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::errors::classify;
use crate::rows;

fn db(op: &'static str) -> impl FnOnce(sqlx::Error) -> FinanceError {
    move |e| classify(op, e)
}

fn nullable(v: &Value) -> Option<Value> {
    (!v.is_null()).then(|| v.clone())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self, op: &'static str) -> FinanceResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(db(op))
    }

    async fn begin_snapshot(&self, op: &'static str) -> FinanceResult<Transaction<'static, Postgres>> {
        let mut tx = self.begin(op).await?;
        sqlx::query("set transaction isolation level repeatable read")
            .execute(&mut *tx)
            .await
            .map_err(db(op))?;
        Ok(tx)
    }
}

// ---------------------------------------------------------------------------
// Shared statements
// ---------------------------------------------------------------------------

async fn insert_audit(conn: &mut PgConnection, op: &'static str, e: &AuditEntry) -> FinanceResult<()> {
    sqlx::query(
        r#"
        insert into audit_log (
          id, action, table_name, record_id, old_values, new_values,
          actor_id, actor_name, ts
        ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(e.id)
    .bind(e.action.as_str())
    .bind(&e.table_name)
    .bind(e.record_id)
    .bind(nullable(&e.old_values))
    .bind(nullable(&e.new_values))
    .bind(e.actor_id)
    .bind(&e.actor_name)
    .bind(e.timestamp)
    .execute(&mut *conn)
    .await
    .map_err(db(op))?;
    Ok(())
}

async fn insert_audit_all(
    conn: &mut PgConnection,
    op: &'static str,
    entries: &[AuditEntry],
) -> FinanceResult<()> {
    for e in entries {
        insert_audit(conn, op, e).await?;
    }
    Ok(())
}

/// Replace the mutable profile columns, conditional on `expected_version`.
async fn write_profile(
    conn: &mut PgConnection,
    op: &'static str,
    p: &ObligationProfile,
    expected_version: i64,
) -> FinanceResult<()> {
    let res = sqlx::query(
        r#"
        update garnishment_profiles
           set amount_paid_so_far_cents = $3,
               balance_remaining_cents  = $4,
               status                   = $5,
               notes                    = $6,
               document_ref             = $7,
               version                  = $8,
               updated_at               = $9
         where id = $1
           and version = $2
        "#,
    )
    .bind(p.id)
    .bind(expected_version)
    .bind(p.amount_paid_so_far.cents())
    .bind(p.balance_remaining.cents())
    .bind(p.status.as_str())
    .bind(&p.notes)
    .bind(&p.document_ref)
    .bind(p.version)
    .bind(p.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(db(op))?;

    if res.rows_affected() == 0 {
        return Err(profile_miss(conn, op, p.id, expected_version).await);
    }
    Ok(())
}

/// Explain a zero-row conditional write on a profile.
async fn profile_miss(
    conn: &mut PgConnection,
    op: &'static str,
    profile_id: Uuid,
    expected_version: i64,
) -> FinanceError {
    let current = sqlx::query("select version from garnishment_profiles where id = $1")
        .bind(profile_id)
        .fetch_optional(&mut *conn)
        .await;
    match current {
        Ok(Some(row)) => match row.try_get::<i64, _>("version") {
            Ok(v) => FinanceError::Conflict(format!(
                "profile {profile_id} moved from version {expected_version} to {v}"
            )),
            Err(e) => classify(op, e),
        },
        Ok(None) => FinanceError::not_found(EntityKind::ObligationProfile, profile_id),
        Err(e) => classify(op, e),
    }
}

/// Advance the employee's ledger version from `expected` to `expected + 1`.
async fn bump_ledger(
    conn: &mut PgConnection,
    op: &'static str,
    employee_id: Uuid,
    expected: i64,
) -> FinanceResult<()> {
    let row = sqlx::query(
        r#"
        insert into employee_loan_ledgers (employee_id, version)
        values ($1, 1)
        on conflict (employee_id) do update
          set version = employee_loan_ledgers.version + 1
          where employee_loan_ledgers.version = $2
        returning version
        "#,
    )
    .bind(employee_id)
    .bind(expected)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db(op))?;

    let next: Option<i64> = match row {
        Some(r) => Some(r.try_get("version").map_err(db(op))?),
        None => None,
    };
    if next != Some(expected + 1) {
        return Err(FinanceError::Conflict(format!(
            "loan ledger of employee {employee_id} moved past version {expected}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Garnishments
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl GarnishmentStore for PgStore {
    async fn insert_profile(
        &self,
        p: &ObligationProfile,
        audit: &AuditEntry,
    ) -> FinanceResult<()> {
        const OP: &str = "insert_profile";
        let mut tx = self.begin(OP).await?;
        sqlx::query(
            r#"
            insert into garnishment_profiles (
              id, case_number, employee_id, creditor_name, court_district, law_firm,
              total_amount_owed_cents, amount_paid_so_far_cents, balance_remaining_cents,
              status, notes, document_ref, version, created_at, updated_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(p.id)
        .bind(&p.case_number)
        .bind(p.employee_id)
        .bind(&p.creditor_name)
        .bind(&p.court_district)
        .bind(&p.law_firm)
        .bind(p.total_amount_owed.cents())
        .bind(p.amount_paid_so_far.cents())
        .bind(p.balance_remaining.cents())
        .bind(p.status.as_str())
        .bind(&p.notes)
        .bind(&p.document_ref)
        .bind(p.version)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db(OP))?;

        insert_audit(&mut tx, OP, audit).await?;
        tx.commit().await.map_err(db(OP))
    }

    async fn load_profile(&self, profile_id: Uuid) -> FinanceResult<ProfileAggregate> {
        const OP: &str = "load_profile";
        let mut tx = self.begin_snapshot(OP).await?;

        let row = sqlx::query(&format!(
            "select {} from garnishment_profiles where id = $1",
            rows::PROFILE_COLUMNS
        ))
        .bind(profile_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db(OP))?
        .ok_or_else(|| FinanceError::not_found(EntityKind::ObligationProfile, profile_id))?;
        let profile = rows::profile(&row)?;

        let installments = sqlx::query(&format!(
            "select {} from garnishment_installments where profile_id = $1 \
             order by installment_number",
            rows::INSTALLMENT_COLUMNS
        ))
        .bind(profile_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db(OP))?
        .iter()
        .map(rows::installment)
        .collect::<FinanceResult<Vec<Installment>>>()?;

        tx.commit().await.map_err(db(OP))?;
        Ok(ProfileAggregate {
            profile,
            installments,
        })
    }

    async fn find_installment(&self, installment_id: Uuid) -> FinanceResult<Installment> {
        let row = sqlx::query(&format!(
            "select {} from garnishment_installments where id = $1",
            rows::INSTALLMENT_COLUMNS
        ))
        .bind(installment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db("find_installment"))?
        .ok_or_else(|| FinanceError::not_found(EntityKind::Installment, installment_id))?;
        rows::installment(&row)
    }

    async fn list_profiles(&self) -> FinanceResult<Vec<ObligationProfile>> {
        sqlx::query(&format!(
            "select {} from garnishment_profiles order by case_number",
            rows::PROFILE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db("list_profiles"))?
        .iter()
        .map(rows::profile)
        .collect()
    }

    async fn commit_installment(&self, plan: &InstallmentPlan) -> FinanceResult<()> {
        const OP: &str = "commit_installment";
        let i = &plan.installment;
        let mut tx = self.begin(OP).await?;

        write_profile(&mut tx, OP, &plan.profile, plan.expected_version).await?;

        // number and owning profile never change once assigned
        sqlx::query(
            r#"
            insert into garnishment_installments (
              id, profile_id, installment_number, amount_cents, payroll_date,
              check_number, notes, document_ref, recorded_by, created_at, updated_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            on conflict (id) do update
              set amount_cents = excluded.amount_cents,
                  payroll_date = excluded.payroll_date,
                  check_number = excluded.check_number,
                  notes        = excluded.notes,
                  document_ref = excluded.document_ref,
                  updated_at   = excluded.updated_at
            "#,
        )
        .bind(i.id)
        .bind(i.profile_id)
        .bind(i.installment_number)
        .bind(i.amount.cents())
        .bind(i.payroll_date)
        .bind(&i.check_number)
        .bind(&i.notes)
        .bind(&i.document_ref)
        .bind(i.recorded_by)
        .bind(i.created_at)
        .bind(i.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db(OP))?;

        insert_audit_all(&mut tx, OP, &plan.audit).await?;
        tx.commit().await.map_err(db(OP))
    }

    async fn commit_status(&self, plan: &StatusPlan) -> FinanceResult<()> {
        const OP: &str = "commit_status";
        let mut tx = self.begin(OP).await?;
        write_profile(&mut tx, OP, &plan.profile, plan.expected_version).await?;
        insert_audit_all(&mut tx, OP, &plan.audit).await?;
        tx.commit().await.map_err(db(OP))
    }

    async fn delete_profile(&self, plan: &DeletePlan) -> FinanceResult<()> {
        const OP: &str = "delete_profile";
        let mut tx = self.begin(OP).await?;
        let res = sqlx::query("delete from garnishment_profiles where id = $1 and version = $2")
            .bind(plan.profile_id)
            .bind(plan.expected_version)
            .execute(&mut *tx)
            .await
            .map_err(db(OP))?;
        if res.rows_affected() == 0 {
            return Err(profile_miss(&mut tx, OP, plan.profile_id, plan.expected_version).await);
        }
        insert_audit_all(&mut tx, OP, &plan.audit).await?;
        tx.commit().await.map_err(db(OP))
    }
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl LoanStore for PgStore {
    async fn find_employee(&self, employee_id: Uuid) -> FinanceResult<Employee> {
        let row = sqlx::query("select id, full_name, active from employees where id = $1")
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db("find_employee"))?
            .ok_or_else(|| FinanceError::not_found(EntityKind::Employee, employee_id))?;
        rows::employee(&row)
    }

    async fn load_ledger(&self, employee_id: Uuid) -> FinanceResult<LoanLedger> {
        const OP: &str = "load_ledger";
        let mut tx = self.begin_snapshot(OP).await?;

        let version: i64 =
            match sqlx::query("select version from employee_loan_ledgers where employee_id = $1")
                .bind(employee_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db(OP))?
            {
                Some(row) => row.try_get("version").map_err(db(OP))?,
                None => 0,
            };

        let withdrawals = sqlx::query(&format!(
            "select {} from loan_withdrawals where employee_id = $1 \
             order by withdrawal_date, created_at",
            rows::WITHDRAWAL_COLUMNS
        ))
        .bind(employee_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db(OP))?
        .iter()
        .map(rows::withdrawal)
        .collect::<FinanceResult<Vec<LoanWithdrawal>>>()?;

        let repayments = sqlx::query(&format!(
            "select {} from loan_repayments where employee_id = $1 \
             order by payroll_date, created_at",
            rows::REPAYMENT_COLUMNS
        ))
        .bind(employee_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db(OP))?
        .iter()
        .map(rows::repayment)
        .collect::<FinanceResult<Vec<LoanRepayment>>>()?;

        tx.commit().await.map_err(db(OP))?;
        Ok(LoanLedger {
            employee_id,
            withdrawals,
            repayments,
            version,
        })
    }

    async fn find_withdrawal(&self, withdrawal_id: Uuid) -> FinanceResult<LoanWithdrawal> {
        let row = sqlx::query(&format!(
            "select {} from loan_withdrawals where id = $1",
            rows::WITHDRAWAL_COLUMNS
        ))
        .bind(withdrawal_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db("find_withdrawal"))?
        .ok_or_else(|| FinanceError::not_found(EntityKind::LoanWithdrawal, withdrawal_id))?;
        rows::withdrawal(&row)
    }

    async fn commit_withdrawal(
        &self,
        expected_version: i64,
        plan: &LoanPlan<LoanWithdrawal>,
    ) -> FinanceResult<()> {
        const OP: &str = "commit_withdrawal";
        let w = &plan.record;
        let mut tx = self.begin(OP).await?;
        bump_ledger(&mut tx, OP, w.employee_id, expected_version).await?;

        sqlx::query(
            r#"
            insert into loan_withdrawals (
              id, employee_id, amount_cents, withdrawal_date, due_date, approved_by, notes,
              status, total_outstanding_at_time_cents, requires_interest, created_at, updated_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(w.id)
        .bind(w.employee_id)
        .bind(w.amount.cents())
        .bind(w.withdrawal_date)
        .bind(w.due_date)
        .bind(w.approved_by)
        .bind(&w.notes)
        .bind(w.status.as_str())
        .bind(w.total_outstanding_at_time.cents())
        .bind(w.requires_interest)
        .bind(w.created_at)
        .bind(w.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db(OP))?;

        insert_audit(&mut tx, OP, &plan.audit).await?;
        tx.commit().await.map_err(db(OP))
    }

    async fn commit_repayment(
        &self,
        expected_version: i64,
        plan: &LoanPlan<LoanRepayment>,
    ) -> FinanceResult<()> {
        const OP: &str = "commit_repayment";
        let r = &plan.record;
        let mut tx = self.begin(OP).await?;
        bump_ledger(&mut tx, OP, r.employee_id, expected_version).await?;

        sqlx::query(
            r#"
            insert into loan_repayments (
              id, employee_id, amount_cents, payroll_date, notes, recorded_by, created_at
            ) values ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(r.id)
        .bind(r.employee_id)
        .bind(r.amount.cents())
        .bind(r.payroll_date)
        .bind(&r.notes)
        .bind(r.recorded_by)
        .bind(r.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db(OP))?;

        insert_audit(&mut tx, OP, &plan.audit).await?;
        tx.commit().await.map_err(db(OP))
    }

    async fn commit_withdrawal_status(
        &self,
        expected_version: i64,
        plan: &LoanPlan<LoanWithdrawal>,
    ) -> FinanceResult<()> {
        const OP: &str = "commit_withdrawal_status";
        let w = &plan.record;
        let mut tx = self.begin(OP).await?;
        bump_ledger(&mut tx, OP, w.employee_id, expected_version).await?;

        let res = sqlx::query(
            r#"
            update loan_withdrawals
               set status = $2,
                   approved_by = $3,
                   notes = $4,
                   updated_at = $5
             where id = $1
            "#,
        )
        .bind(w.id)
        .bind(w.status.as_str())
        .bind(w.approved_by)
        .bind(&w.notes)
        .bind(w.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db(OP))?;
        if res.rows_affected() == 0 {
            return Err(FinanceError::not_found(EntityKind::LoanWithdrawal, w.id));
        }

        insert_audit(&mut tx, OP, &plan.audit).await?;
        tx.commit().await.map_err(db(OP))
    }

    async fn insert_request(&self, plan: &LoanPlan<LoanRequest>) -> FinanceResult<()> {
        const OP: &str = "insert_request";
        let r = &plan.record;
        let mut tx = self.begin(OP).await?;
        sqlx::query(
            r#"
            insert into loan_requests (
              id, employee_id, requested_amount_cents, purpose, status, notes,
              requested_by, created_at, updated_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(r.id)
        .bind(r.employee_id)
        .bind(r.requested_amount.cents())
        .bind(&r.purpose)
        .bind(r.status.as_str())
        .bind(&r.notes)
        .bind(r.requested_by)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db(OP))?;

        insert_audit(&mut tx, OP, &plan.audit).await?;
        tx.commit().await.map_err(db(OP))
    }

    async fn find_request(&self, request_id: Uuid) -> FinanceResult<LoanRequest> {
        let row = sqlx::query(&format!(
            "select {} from loan_requests where id = $1",
            rows::REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db("find_request"))?
        .ok_or_else(|| FinanceError::not_found(EntityKind::LoanRequest, request_id))?;
        rows::request(&row)
    }

    async fn list_requests(&self, employee_id: Uuid) -> FinanceResult<Vec<LoanRequest>> {
        sqlx::query(&format!(
            "select {} from loan_requests where employee_id = $1 order by created_at",
            rows::REQUEST_COLUMNS
        ))
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db("list_requests"))?
        .iter()
        .map(rows::request)
        .collect()
    }

    async fn commit_request_status(
        &self,
        expected_status: ApprovalStatus,
        plan: &LoanPlan<LoanRequest>,
    ) -> FinanceResult<()> {
        const OP: &str = "commit_request_status";
        let r = &plan.record;
        let mut tx = self.begin(OP).await?;
        let res = sqlx::query(
            r#"
            update loan_requests
               set status = $3,
                   notes = $4,
                   updated_at = $5
             where id = $1
               and status = $2
            "#,
        )
        .bind(r.id)
        .bind(expected_status.as_str())
        .bind(r.status.as_str())
        .bind(&r.notes)
        .bind(r.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db(OP))?;

        if res.rows_affected() == 0 {
            let exists = sqlx::query("select 1 from loan_requests where id = $1")
                .bind(r.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db(OP))?
                .is_some();
            return Err(if exists {
                FinanceError::Conflict(format!(
                    "loan request {} is no longer '{expected_status}'",
                    r.id
                ))
            } else {
                FinanceError::not_found(EntityKind::LoanRequest, r.id)
            });
        }

        insert_audit(&mut tx, OP, &plan.audit).await?;
        tx.commit().await.map_err(db(OP))
    }
}

#[async_trait::async_trait]
impl AuditLog for PgStore {
    async fn history(&self, table_name: &str, record_id: Uuid) -> FinanceResult<Vec<AuditEntry>> {
        sqlx::query(
            r#"
            select id, action, table_name, record_id, old_values, new_values,
                   actor_id, actor_name, ts
              from audit_log
             where table_name = $1
               and record_id = $2
             order by ts, seq
            "#,
        )
        .bind(table_name)
        .bind(record_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db("history"))?
        .iter()
        .map(rows::audit_entry)
        .collect()
    }
}
