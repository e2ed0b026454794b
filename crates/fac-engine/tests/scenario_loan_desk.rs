//! Loan desk over the in-memory store.

use chrono::NaiveDate;
use fac_engine::{Console, MemStore};
use fac_loans::OutstandingPolicy;
use fac_schemas::{
    ApprovalStatus, Employee, FinanceError, LoanWithdrawal, Money, NewLoanRequest, NewRepayment,
    NewWithdrawal, Principal, Role,
};
use std::sync::Arc;
use uuid::Uuid;

fn m(s: &str) -> Money {
    Money::parse(s).unwrap()
}

fn date(month: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, d).unwrap()
}

fn as_role(role: Role) -> Principal {
    Principal::new(Uuid::new_v4(), role.as_str(), role)
}

async fn setup(policy: OutstandingPolicy) -> (Console, Arc<MemStore>, Uuid) {
    let (c, store) = Console::in_memory(policy);
    let employee = Employee {
        id: Uuid::new_v4(),
        full_name: "Jordan Avery".into(),
        active: true,
    };
    let id = employee.id;
    store.add_employee(employee).await;
    (c, store, id)
}

async fn approved(c: &Console, employee: Uuid, amount: &str, month: u32) {
    let w = c
        .loans
        .record_withdrawal(
            &as_role(Role::Editor),
            employee,
            NewWithdrawal {
                amount: m(amount),
                withdrawal_date: date(month, 1),
                due_date: date(month, 28),
                notes: None,
            },
        )
        .await
        .unwrap();
    c.loans
        .change_withdrawal_status(&as_role(Role::Manager), w.id, ApprovalStatus::ApprovedManager)
        .await
        .unwrap();
    c.loans
        .change_withdrawal_status(&as_role(Role::Admin), w.id, ApprovalStatus::ApprovedAdmin)
        .await
        .unwrap();
}

fn repayment(amount: &str) -> NewRepayment {
    NewRepayment {
        amount: m(amount),
        payroll_date: date(6, 30),
        notes: None,
    }
}

#[tokio::test]
async fn nine_hundred_out_three_hundred_back() {
    let (c, _store, emp) = setup(OutstandingPolicy::ApprovedOnly).await;
    approved(&c, emp, "900.00", 1).await;
    c.loans
        .record_repayment(&as_role(Role::Editor), emp, repayment("300.00"))
        .await
        .unwrap();
    assert_eq!(c.loans.outstanding_balance(emp).await.unwrap(), m("600.00"));

    let err = c
        .loans
        .record_repayment(&as_role(Role::Editor), emp, repayment("700.00"))
        .await
        .unwrap_err();
    assert!(matches!(err, FinanceError::Validation(_)));

    c.loans
        .record_repayment(&as_role(Role::Editor), emp, repayment("600.00"))
        .await
        .unwrap();
    assert_eq!(c.loans.outstanding_balance(emp).await.unwrap(), Money::ZERO);
}

#[tokio::test]
async fn evaluation_threshold() {
    let (c, _store, emp) = setup(OutstandingPolicy::ApprovedOnly).await;
    approved(&c, emp, "600.00", 1).await;
    let e = c.loans.evaluate_withdrawal(emp, m("500.00")).await.unwrap();
    assert_eq!(e.total_outstanding_at_time, m("600.00"));
    assert!(e.requires_interest);

    let (c, _store, emp) = setup(OutstandingPolicy::ApprovedOnly).await;
    approved(&c, emp, "200.00", 1).await;
    assert!(!c.loans.evaluate_withdrawal(emp, m("500.00")).await.unwrap().requires_interest);
}

#[tokio::test]
async fn pending_counts_under_non_rejected_policy() {
    let (c, _store, emp) = setup(OutstandingPolicy::NonRejected).await;
    c.loans
        .record_withdrawal(
            &as_role(Role::Editor),
            emp,
            NewWithdrawal {
                amount: m("250.00"),
                withdrawal_date: date(2, 1),
                due_date: date(2, 20),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(c.loans.outstanding_balance(emp).await.unwrap(), m("250.00"));
}

#[tokio::test]
async fn unknown_employee_is_not_found() {
    let (c, _store, _emp) = setup(OutstandingPolicy::ApprovedOnly).await;
    let err = c.loans.outstanding_balance(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, FinanceError::NotFound { .. }));
}

#[tokio::test]
async fn rejected_is_terminal() {
    let (c, _store, emp) = setup(OutstandingPolicy::ApprovedOnly).await;
    let w = c
        .loans
        .record_withdrawal(
            &as_role(Role::Editor),
            emp,
            NewWithdrawal {
                amount: m("10.00"),
                withdrawal_date: date(3, 1),
                due_date: date(3, 2),
                notes: None,
            },
        )
        .await
        .unwrap();
    c.loans
        .change_withdrawal_status(&as_role(Role::Manager), w.id, ApprovalStatus::Rejected)
        .await
        .unwrap();
    let err = c
        .loans
        .change_withdrawal_status(&as_role(Role::Admin), w.id, ApprovalStatus::ApprovedManager)
        .await
        .unwrap_err();
    assert!(matches!(err, FinanceError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn request_flow() {
    let (c, _store, emp) = setup(OutstandingPolicy::ApprovedOnly).await;
    approved(&c, emp, "800.00", 1).await;

    let req = c
        .loans
        .submit_request(
            &as_role(Role::Editor),
            emp,
            NewLoanRequest {
                requested_amount: m("300.00"),
                purpose: "school fees".into(),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(req.status, ApprovalStatus::Pending);
    assert!(req.notes.as_deref().unwrap_or_default().contains("1100.00"));

    let req = c
        .loans
        .change_request_status(&as_role(Role::Manager), req.id, ApprovalStatus::ApprovedManager)
        .await
        .unwrap();
    assert_eq!(req.status, ApprovalStatus::ApprovedManager);
    assert_eq!(c.loans.list_requests(emp).await.unwrap().len(), 1);

    let err = c
        .loans
        .change_request_status(&as_role(Role::Admin), req.id, ApprovalStatus::Rejected)
        .await
        .unwrap_err();
    assert!(matches!(err, FinanceError::InvalidStateTransition { .. }));

    let other = c
        .loans
        .submit_request(
            &as_role(Role::Editor),
            emp,
            NewLoanRequest {
                requested_amount: m("50.00"),
                purpose: "bus pass".into(),
                notes: None,
            },
        )
        .await
        .unwrap();
    let err = c
        .loans
        .change_request_status(&as_role(Role::Editor), other.id, ApprovalStatus::Rejected)
        .await
        .unwrap_err();
    assert!(matches!(err, FinanceError::Forbidden(_)));
}

async fn recorded(c: &Console, employee: Uuid, amount: &str) -> LoanWithdrawal {
    c.loans
        .record_withdrawal(
            &as_role(Role::Editor),
            employee,
            NewWithdrawal {
                amount: m(amount),
                withdrawal_date: date(4, 1),
                due_date: date(4, 30),
                notes: None,
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn repaid_withdrawal_cannot_be_rejected_under_approved_only() {
    let (c, _store, emp) = setup(OutstandingPolicy::ApprovedOnly).await;
    let w = recorded(&c, emp, "500.00").await;
    c.loans
        .change_withdrawal_status(&as_role(Role::Manager), w.id, ApprovalStatus::ApprovedManager)
        .await
        .unwrap();
    c.loans
        .record_repayment(&as_role(Role::Editor), emp, repayment("500.00"))
        .await
        .unwrap();
    assert_eq!(c.loans.outstanding_balance(emp).await.unwrap(), Money::ZERO);

    for role in [Role::Manager, Role::Admin] {
        let err = c
            .loans
            .change_withdrawal_status(&as_role(role), w.id, ApprovalStatus::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, FinanceError::InvalidStateTransition { .. }), "{err:?}");
        assert_eq!(c.loans.outstanding_balance(emp).await.unwrap(), Money::ZERO);
    }

    c.loans
        .change_withdrawal_status(&as_role(Role::Admin), w.id, ApprovalStatus::ApprovedAdmin)
        .await
        .unwrap();
    let err = c
        .loans
        .change_withdrawal_status(&as_role(Role::Admin), w.id, ApprovalStatus::Rejected)
        .await
        .unwrap_err();
    assert!(matches!(err, FinanceError::InvalidStateTransition { .. }), "{err:?}");
    assert_eq!(c.loans.outstanding_balance(emp).await.unwrap(), Money::ZERO);

    let e = c.loans.evaluate_withdrawal(emp, m("100.00")).await.unwrap();
    assert_eq!(e.total_outstanding_at_time, Money::ZERO);
}

#[tokio::test]
async fn repaid_withdrawal_cannot_be_rejected_under_non_rejected() {
    let (c, _store, emp) = setup(OutstandingPolicy::NonRejected).await;
    let w = recorded(&c, emp, "500.00").await;
    c.loans
        .record_repayment(&as_role(Role::Editor), emp, repayment("500.00"))
        .await
        .unwrap();
    assert_eq!(c.loans.outstanding_balance(emp).await.unwrap(), Money::ZERO);

    let err = c
        .loans
        .change_withdrawal_status(&as_role(Role::Manager), w.id, ApprovalStatus::Rejected)
        .await
        .unwrap_err();
    assert!(matches!(err, FinanceError::Validation(_)), "{err:?}");
    assert_eq!(c.loans.outstanding_balance(emp).await.unwrap(), Money::ZERO);

    let ledger = c.loans.ledger(emp).await.unwrap();
    assert_eq!(ledger.withdrawals[0].status, ApprovalStatus::Pending);
    assert!(!c
        .loans
        .evaluate_withdrawal(emp, m("100.00"))
        .await
        .unwrap()
        .total_outstanding_at_time
        .is_negative());
}

#[tokio::test]
async fn rejection_allowed_while_other_withdrawals_cover_repayments() {
    for policy in [OutstandingPolicy::ApprovedOnly, OutstandingPolicy::NonRejected] {
        let (c, _store, emp) = setup(policy).await;
        approved(&c, emp, "300.00", 1).await;
        let pending = recorded(&c, emp, "200.00").await;
        c.loans
            .record_repayment(&as_role(Role::Editor), emp, repayment("300.00"))
            .await
            .unwrap();

        let w = c
            .loans
            .change_withdrawal_status(&as_role(Role::Manager), pending.id, ApprovalStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(w.status, ApprovalStatus::Rejected);
        assert_eq!(c.loans.outstanding_balance(emp).await.unwrap(), Money::ZERO);
    }
}

#[tokio::test]
async fn concurrent_repayments_cannot_exceed_outstanding() {
    let (c, _store, emp) = setup(OutstandingPolicy::ApprovedOnly).await;
    approved(&c, emp, "100.00", 1).await;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let loans = c.loans.clone();
        tasks.push(tokio::spawn(async move {
            loans
                .record_repayment(&as_role(Role::Editor), emp, repayment("40.00"))
                .await
        }));
    }
    let mut ok = 0;
    for t in tasks {
        if t.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 2);
    assert_eq!(c.loans.outstanding_balance(emp).await.unwrap(), m("20.00"));
}
