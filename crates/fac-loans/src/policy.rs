use std::fmt;

use fac_schemas::{ApprovalStatus, FinanceError, Money};
use serde::{Deserialize, Serialize};

/// Outstanding + new amount strictly above this flags the loan as
/// interest-bearing. Company policy, identical for every employee.
pub const INTEREST_THRESHOLD: Money = Money::from_cents(100_000);

/// Which withdrawals count toward an employee's outstanding balance.
/// Repayments always count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutstandingPolicy {
    /// `approved_manager` and `approved_admin` only.
    #[default]
    ApprovedOnly,
    /// Everything except `rejected` (pending money counts as owed).
    NonRejected,
}

impl OutstandingPolicy {
    pub fn counts(&self, status: ApprovalStatus) -> bool {
        match self {
            OutstandingPolicy::ApprovedOnly => status.is_approved(),
            OutstandingPolicy::NonRejected => status != ApprovalStatus::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutstandingPolicy::ApprovedOnly => "approved_only",
            OutstandingPolicy::NonRejected => "non_rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self, FinanceError> {
        match s.trim() {
            "approved_only" => Ok(OutstandingPolicy::ApprovedOnly),
            "non_rejected" => Ok(OutstandingPolicy::NonRejected),
            other => Err(FinanceError::validation(format!(
                "unknown outstanding policy: {other} (expected approved_only|non_rejected)"
            ))),
        }
    }
}

impl fmt::Display for OutstandingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_one_thousand() {
        assert_eq!(INTEREST_THRESHOLD.to_string(), "1000.00");
    }

    #[test]
    fn pending_counts_only_under_non_rejected() {
        assert!(!OutstandingPolicy::ApprovedOnly.counts(ApprovalStatus::Pending));
        assert!(OutstandingPolicy::NonRejected.counts(ApprovalStatus::Pending));
        for p in [OutstandingPolicy::ApprovedOnly, OutstandingPolicy::NonRejected] {
            assert!(!p.counts(ApprovalStatus::Rejected));
            assert!(p.counts(ApprovalStatus::ApprovedManager));
            assert!(p.counts(ApprovalStatus::ApprovedAdmin));
        }
    }

    #[test]
    fn parse_round_trips() {
        for p in [OutstandingPolicy::ApprovedOnly, OutstandingPolicy::NonRejected] {
            assert_eq!(OutstandingPolicy::parse(p.as_str()).unwrap(), p);
        }
        assert!(OutstandingPolicy::parse("all").is_err());
    }
}
