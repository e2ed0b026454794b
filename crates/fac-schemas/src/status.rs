use std::fmt;

use serde::{Deserialize, Serialize};

use crate::FinanceError;

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// Every persisted record type the core touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ObligationProfile,
    Installment,
    LoanWithdrawal,
    LoanRepayment,
    LoanRequest,
    Employee,
}

impl EntityKind {
    /// Storage table the records live in; also the `table_name` of audit entries.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::ObligationProfile => "garnishment_profiles",
            EntityKind::Installment => "garnishment_installments",
            EntityKind::LoanWithdrawal => "loan_withdrawals",
            EntityKind::LoanRepayment => "loan_repayments",
            EntityKind::LoanRequest => "loan_requests",
            EntityKind::Employee => "employees",
        }
    }

    pub fn from_table_name(table: &str) -> Option<Self> {
        [
            EntityKind::ObligationProfile,
            EntityKind::Installment,
            EntityKind::LoanWithdrawal,
            EntityKind::LoanRepayment,
            EntityKind::LoanRequest,
            EntityKind::Employee,
        ]
        .into_iter()
        .find(|k| k.table_name() == table)
    }

    fn label(&self) -> &'static str {
        match self {
            EntityKind::ObligationProfile => "obligation profile",
            EntityKind::Installment => "installment",
            EntityKind::LoanWithdrawal => "loan withdrawal",
            EntityKind::LoanRepayment => "loan repayment",
            EntityKind::LoanRequest => "loan request",
            EntityKind::Employee => "employee",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// ProfileStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a garnishment case.  `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    Active,
    Suspended,
    Completed,
}

impl ProfileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileStatus::Active => "active",
            ProfileStatus::Suspended => "suspended",
            ProfileStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, FinanceError> {
        match s {
            "active" => Ok(ProfileStatus::Active),
            "suspended" => Ok(ProfileStatus::Suspended),
            "completed" => Ok(ProfileStatus::Completed),
            other => Err(FinanceError::validation(format!(
                "invalid profile status: {other}"
            ))),
        }
    }
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ApprovalStatus
// ---------------------------------------------------------------------------

/// Approval chain shared by loan withdrawals and loan requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    ApprovedManager,
    ApprovedAdmin,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::ApprovedManager => "approved_manager",
            ApprovalStatus::ApprovedAdmin => "approved_admin",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self, FinanceError> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved_manager" => Ok(ApprovalStatus::ApprovedManager),
            "approved_admin" => Ok(ApprovalStatus::ApprovedAdmin),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(FinanceError::validation(format!(
                "invalid approval status: {other}"
            ))),
        }
    }

    /// Approved at either level.
    pub fn is_approved(&self) -> bool {
        matches!(
            self,
            ApprovalStatus::ApprovedManager | ApprovalStatus::ApprovedAdmin
        )
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
