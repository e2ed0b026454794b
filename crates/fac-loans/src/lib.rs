//! fac-loans
//!
//! Loan Obligation Tracker.
//!
//! - Outstanding balance = Σ counted withdrawals − Σ repayments, where
//!   [`OutstandingPolicy`] decides which withdrawal statuses count.
//! - A new withdrawal snapshots the outstanding balance and the interest flag
//!   (`outstanding + amount > INTEREST_THRESHOLD`) once, at creation.
//! - Repayments may never exceed what is outstanding.
//!
//! Deterministic, pure logic. No IO.

mod plan;
mod policy;
mod tracker;

pub use plan::{
    plan_repayment, plan_request, plan_request_status, plan_withdrawal, plan_withdrawal_status,
    LoanPlan,
};
pub use policy::{OutstandingPolicy, INTEREST_THRESHOLD};
pub use tracker::{
    evaluate_withdrawal, outstanding_balance, request_annotation, validate_new_request,
    validate_new_withdrawal, validate_repayment, validate_withdrawal_status_change, LoanLedger,
    WithdrawalEvaluation,
};
