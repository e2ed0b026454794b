//! Scenario: the Postgres store upholds the balance invariants under
//! independent writers.
//!
//! Two `Console`s over separate pools stand in for two daemon processes:
//! they share no in-process locks, so only the schema constraints and the
//! conditional version writes keep the profile consistent.
//!
//! DB-backed test. Skips if `FAC_DATABASE_URL` is not set.

use chrono::{NaiveDate, Utc};
use fac_db::{is_check_violation, PgStore};
use fac_engine::Console;
use fac_loans::OutstandingPolicy;
use fac_schemas::{
    ApprovalStatus, Employee, FinanceError, Money, NewInstallment, NewProfile, NewRepayment,
    NewWithdrawal, Principal, ProfileStatus, Role,
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

async fn pool() -> anyhow::Result<Option<PgPool>> {
    let url = match std::env::var(fac_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("skipping: {} not set", fac_db::ENV_DB_URL);
            return Ok(None);
        }
    };
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await?;
    fac_db::migrate(&pool).await?;
    Ok(Some(pool))
}

fn console(pool: &PgPool) -> Console {
    Console::new(
        Arc::new(PgStore::new(pool.clone())),
        OutstandingPolicy::ApprovedOnly,
        None,
    )
}

fn m(s: &str) -> Money {
    Money::parse(s).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
}

fn as_role(role: Role) -> Principal {
    Principal::new(Uuid::new_v4(), role.as_str(), role)
}

fn case(owed: &str) -> NewProfile {
    NewProfile {
        case_number: format!("PG-{}", Uuid::new_v4().simple()),
        employee_id: Uuid::new_v4(),
        creditor_name: "Harbor Credit".into(),
        court_district: "Northern".into(),
        law_firm: "Lee Legal".into(),
        total_amount_owed: m(owed),
        notes: None,
        document_ref: None,
    }
}

fn pay(amount: &str, d: u32) -> NewInstallment {
    NewInstallment {
        amount: m(amount),
        payroll_date: day(d),
        check_number: Some(format!("CHK-{d}")),
        notes: None,
        document_ref: None,
    }
}

#[tokio::test]
async fn migrate_is_idempotent_and_status_reports_schema() -> anyhow::Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    fac_db::migrate(&pool).await?;
    let st = fac_db::status(&pool).await?;
    assert!(st.ok);
    assert!(st.has_profiles_table);
    Ok(())
}

#[tokio::test]
async fn thousand_owed_round_trips_through_postgres() -> anyhow::Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let c = console(&pool);
    let g = &c.garnishments;
    let editor = as_role(Role::Editor);

    let p = g.create_profile(&editor, case("1000.00")).await?;
    g.create_installment(&editor, p.id, pay("300.00", 2)).await?;
    let err = g
        .create_installment(&editor, p.id, pay("800.00", 16))
        .await
        .unwrap_err();
    assert!(matches!(err, FinanceError::Validation(_)));
    g.create_installment(&editor, p.id, pay("700.00", 16)).await?;

    let agg = g.get_profile(p.id).await?;
    assert_eq!(agg.profile.balance_remaining, Money::ZERO);
    assert_eq!(agg.profile.version, 3);
    assert_eq!(agg.installments.len(), 2);
    assert!(g.check_profile(p.id).await?.is_clean());

    g.change_profile_status(&editor, p.id, ProfileStatus::Completed)
        .await?;
    let hist = g.audit_history("garnishment_profiles", p.id).await?;
    assert_eq!(hist.len(), 4);
    Ok(())
}

#[tokio::test]
async fn independent_writers_cannot_double_book_a_payroll_date() -> anyhow::Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let a = console(&pool);
    let b = console(&pool);
    let p = a
        .garnishments
        .create_profile(&as_role(Role::Editor), case("1000.00"))
        .await?;

    let ga = a.garnishments.clone();
    let gb = b.garnishments.clone();
    let (ra, rb) = tokio::join!(
        async move { ga.create_installment(&as_role(Role::Editor), p.id, pay("50.00", 9)).await },
        async move { gb.create_installment(&as_role(Role::Editor), p.id, pay("50.00", 9)).await },
    );
    assert_eq!([ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(), 1);

    let agg = a.garnishments.get_profile(p.id).await?;
    assert_eq!(agg.installments.len(), 1);
    assert_eq!(agg.profile.balance_remaining, m("950.00"));
    Ok(())
}

#[tokio::test]
async fn loan_ledger_version_serializes_repayments() -> anyhow::Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let employee = Employee {
        id: Uuid::new_v4(),
        full_name: "Sam Rivera".into(),
        active: true,
    };
    fac_db::upsert_employee(&pool, &employee).await?;

    let a = console(&pool);
    let b = console(&pool);
    let w = a
        .loans
        .record_withdrawal(
            &as_role(Role::Editor),
            employee.id,
            NewWithdrawal {
                amount: m("100.00"),
                withdrawal_date: day(1),
                due_date: day(30),
                notes: None,
            },
        )
        .await?;
    a.loans
        .change_withdrawal_status(&as_role(Role::Manager), w.id, ApprovalStatus::ApprovedManager)
        .await?;
    assert_eq!(a.loans.outstanding_balance(employee.id).await?, m("100.00"));

    let repay = || NewRepayment {
        amount: m("60.00"),
        payroll_date: day(15),
        notes: None,
    };
    let la = a.loans.clone();
    let lb = b.loans.clone();
    let id = employee.id;
    let (ra, rb) = tokio::join!(
        async move { la.record_repayment(&as_role(Role::Editor), id, repay()).await },
        async move { lb.record_repayment(&as_role(Role::Editor), id, repay()).await },
    );
    assert_eq!([ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(a.loans.outstanding_balance(id).await?, m("40.00"));
    Ok(())
}

#[tokio::test]
async fn schema_rejects_a_broken_balance_identity() -> anyhow::Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let now = Utc::now();
    let err = sqlx::query(
        r#"
        insert into garnishment_profiles (
          id, case_number, employee_id, creditor_name, total_amount_owed_cents,
          amount_paid_so_far_cents, balance_remaining_cents, status, version,
          created_at, updated_at
        ) values ($1, $2, $3, 'x', 10000, 3000, 9000, 'active', 1, $4, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(format!("BAD-{}", Uuid::new_v4().simple()))
    .bind(Uuid::new_v4())
    .bind(now)
    .execute(&pool)
    .await
    .unwrap_err();
    assert!(is_check_violation(&err), "expected check violation, got {err}");

    let err = sqlx::query(
        r#"
        insert into garnishment_profiles (
          id, case_number, employee_id, creditor_name, total_amount_owed_cents,
          amount_paid_so_far_cents, balance_remaining_cents, status, version,
          created_at, updated_at
        ) values ($1, $2, $3, 'x', 100, 0, 100, 'closed', 1, $4, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(format!("BAD-{}", Uuid::new_v4().simple()))
    .bind(Uuid::new_v4())
    .bind(now)
    .execute(&pool)
    .await
    .unwrap_err();
    assert!(is_check_violation(&err));
    Ok(())
}
