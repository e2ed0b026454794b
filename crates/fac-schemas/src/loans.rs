use chrono::{DateTime, NaiveDate, Utc};
use fac_ledger::{AsMovement, Money, Movement};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ApprovalStatus;

/// Registry entry for an employee. Owned by the wider console; the core only
/// checks existence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub full_name: String,
    pub active: bool,
}

/// Money handed out to an employee against future repayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanWithdrawal {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub amount: Money,
    pub withdrawal_date: NaiveDate,
    pub due_date: NaiveDate,
    pub approved_by: Option<Uuid>,
    pub notes: Option<String>,
    pub status: ApprovalStatus,
    /// Outstanding balance immediately before this withdrawal. Write-once.
    pub total_outstanding_at_time: Money,
    /// Write-once interest flag decided at creation time.
    pub requires_interest: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AsMovement for LoanWithdrawal {
    fn movement(&self) -> Movement {
        Movement::credit(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWithdrawal {
    pub amount: Money,
    pub withdrawal_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Payroll deduction repaying an employee's pooled loan balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRepayment {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub amount: Money,
    pub payroll_date: NaiveDate,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl AsMovement for LoanRepayment {
    fn movement(&self) -> Movement {
        Movement::debit(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRepayment {
    pub amount: Money,
    pub payroll_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// An employee's ask for a loan, before any money moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub requested_amount: Money,
    pub purpose: String,
    pub status: ApprovalStatus,
    pub notes: Option<String>,
    pub requested_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLoanRequest {
    pub requested_amount: Money,
    pub purpose: String,
    #[serde(default)]
    pub notes: Option<String>,
}
