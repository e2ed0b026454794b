use fac_ledger::{compute_balance, compute_balance_filtered};
use fac_schemas::{
    FinanceError, FinanceResult, LoanRepayment, LoanWithdrawal, Money, NewLoanRequest,
    NewWithdrawal,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{OutstandingPolicy, INTEREST_THRESHOLD};

/// One employee's pooled loan ledger, read in one consistent snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanLedger {
    pub employee_id: Uuid,
    pub withdrawals: Vec<LoanWithdrawal>,
    pub repayments: Vec<LoanRepayment>,
    /// Serialization counter; every ledger write is conditional on it.
    pub version: i64,
}

impl LoanLedger {
    pub fn empty(employee_id: Uuid) -> Self {
        Self {
            employee_id,
            withdrawals: Vec::new(),
            repayments: Vec::new(),
            version: 0,
        }
    }

    pub fn outstanding(&self, policy: OutstandingPolicy) -> Money {
        outstanding_balance(policy, &self.withdrawals, &self.repayments)
    }
}

/// Σ counted withdrawals − Σ repayments.
pub fn outstanding_balance(
    policy: OutstandingPolicy,
    withdrawals: &[LoanWithdrawal],
    repayments: &[LoanRepayment],
) -> Money {
    let lent = compute_balance_filtered(withdrawals, |w| policy.counts(w.status));
    // repayments are debits, so their balance is already negative
    lent.saturating_add(compute_balance(repayments))
}

/// Snapshot stored verbatim on the new withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalEvaluation {
    pub total_outstanding_at_time: Money,
    pub requires_interest: bool,
}

pub fn evaluate_withdrawal(outstanding: Money, requested: Money) -> WithdrawalEvaluation {
    WithdrawalEvaluation {
        total_outstanding_at_time: outstanding,
        requires_interest: outstanding.saturating_add(requested) > INTEREST_THRESHOLD,
    }
}

pub fn validate_repayment(outstanding: Money, amount: Money) -> FinanceResult<()> {
    if !amount.is_positive() {
        return Err(FinanceError::validation(format!(
            "repayment amount must be greater than zero (got {amount})"
        )));
    }
    if amount > outstanding {
        return Err(FinanceError::validation(format!(
            "repayment {amount} exceeds the outstanding balance {outstanding}"
        )));
    }
    Ok(())
}

/// Outstanding recomputed with `changed` in place of its stored row must not
/// go below zero: repayments already recorded stay covered.
pub fn validate_withdrawal_status_change(
    policy: OutstandingPolicy,
    ledger: &LoanLedger,
    changed: &LoanWithdrawal,
) -> FinanceResult<()> {
    let rows = ledger
        .withdrawals
        .iter()
        .map(|w| if w.id == changed.id { changed } else { w });
    let lent = compute_balance_filtered(rows, |w: &LoanWithdrawal| policy.counts(w.status));
    let after = lent.saturating_add(compute_balance(&ledger.repayments));
    if after.is_negative() {
        return Err(FinanceError::validation(format!(
            "moving withdrawal {} to {} would leave outstanding at {after}; repayments exceed counted withdrawals",
            changed.id, changed.status
        )));
    }
    Ok(())
}

pub fn validate_new_withdrawal(draft: &NewWithdrawal) -> FinanceResult<()> {
    if !draft.amount.is_positive() {
        return Err(FinanceError::validation(format!(
            "withdrawal amount must be greater than zero (got {})",
            draft.amount
        )));
    }
    if draft.due_date < draft.withdrawal_date {
        return Err(FinanceError::validation(format!(
            "due date {} is before the withdrawal date {}",
            draft.due_date, draft.withdrawal_date
        )));
    }
    Ok(())
}

pub fn validate_new_request(draft: &NewLoanRequest) -> FinanceResult<()> {
    if !draft.requested_amount.is_positive() {
        return Err(FinanceError::validation(format!(
            "requested amount must be greater than zero (got {})",
            draft.requested_amount
        )));
    }
    if draft.purpose.trim().is_empty() {
        return Err(FinanceError::validation("loan purpose is required"));
    }
    Ok(())
}

/// Note attached to a request whose approval would cross the threshold.
pub fn request_annotation(outstanding: Money, requested: Money) -> Option<String> {
    let projected = outstanding.saturating_add(requested);
    (projected > INTEREST_THRESHOLD).then(|| {
        format!(
            "Projected outstanding balance {projected} exceeds the {INTEREST_THRESHOLD} interest threshold; interest applies if approved."
        )
    })
}
