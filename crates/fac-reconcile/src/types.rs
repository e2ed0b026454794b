use chrono::NaiveDate;
use fac_audit::AuditEntry;
use fac_schemas::{Installment, Money, ObligationProfile};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Totals derived from a profile's installments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTotals {
    pub paid: Money,
    pub balance: Money,
}

/// Everything an installment create/update commits in one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallmentPlan {
    pub installment: Installment,
    /// Profile with recomputed totals, `version + 1` and a fresh `updated_at`.
    pub profile: ObligationProfile,
    /// Profile version the plan was validated against.
    pub expected_version: i64,
    pub audit: Vec<AuditEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusPlan {
    pub profile: ObligationProfile,
    pub expected_version: i64,
    pub audit: Vec<AuditEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletePlan {
    pub profile_id: Uuid,
    pub expected_version: i64,
    pub audit: Vec<AuditEntry>,
}

// ---------------------------------------------------------------------------
// Consistency report
// ---------------------------------------------------------------------------

/// One broken invariant. Ordering is stable so reports compare cleanly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// Stored `amount_paid_so_far` differs from Σ installments.
    PaidDrift { stored: Money, derived: Money },
    /// Stored `balance_remaining` differs from owed − Σ installments.
    BalanceDrift { stored: Money, derived: Money },
    /// Stored row breaks `balance == owed − paid`.
    BalanceIdentity {
        owed: Money,
        paid: Money,
        balance: Money,
    },
    /// Σ installments exceeds the amount owed.
    Overdrawn { owed: Money, paid: Money },
    /// Installment numbers are not exactly 1..=n.
    NumberingGap { expected: i32, found: i32 },
    DuplicatePayrollDate { payroll_date: NaiveDate, count: usize },
    NonPositiveAmount { installment_id: Uuid, amount: Money },
    /// Installment row that points at another profile.
    ForeignInstallment { installment_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub profile_id: Uuid,
    pub derived: ProfileTotals,
    pub findings: Vec<Finding>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}
