use chrono::{DateTime, NaiveDate, Utc};
use fac_ledger::{AsMovement, Money, Movement};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProfileStatus;

/// A garnishment case against one employee.
///
/// `amount_paid_so_far` and `balance_remaining` are derived from the
/// profile's installments and only ever written by the reconciliation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationProfile {
    pub id: Uuid,
    pub case_number: String,
    pub employee_id: Uuid,
    pub creditor_name: String,
    pub court_district: String,
    pub law_firm: String,
    pub total_amount_owed: Money,
    pub amount_paid_so_far: Money,
    pub balance_remaining: Money,
    pub status: ProfileStatus,
    pub notes: Option<String>,
    /// Object-storage reference for the court order.
    pub document_ref: Option<String>,
    /// Bumped on every committed mutation; commits are conditional on it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ObligationProfile {
    /// Fully paid.
    pub fn is_settled(&self) -> bool {
        self.balance_remaining.is_zero()
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProfileStatus::Completed
    }
}

/// Input for a new garnishment case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub case_number: String,
    pub employee_id: Uuid,
    pub creditor_name: String,
    pub court_district: String,
    pub law_firm: String,
    pub total_amount_owed: Money,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub document_ref: Option<String>,
}

/// One payment applied against a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub installment_number: i32,
    pub amount: Money,
    pub payroll_date: NaiveDate,
    pub check_number: Option<String>,
    pub notes: Option<String>,
    pub document_ref: Option<String>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AsMovement for Installment {
    /// Installments pay the obligation down.
    fn movement(&self) -> Movement {
        Movement::debit(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInstallment {
    pub amount: Money,
    pub payroll_date: NaiveDate,
    #[serde(default)]
    pub check_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub document_ref: Option<String>,
}

/// Edit of an existing installment. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPatch {
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub payroll_date: Option<NaiveDate>,
    #[serde(default)]
    pub check_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub document_ref: Option<String>,
}

impl InstallmentPatch {
    pub fn amount(amount: Money) -> Self {
        Self {
            amount: Some(amount),
            ..Self::default()
        }
    }
}
