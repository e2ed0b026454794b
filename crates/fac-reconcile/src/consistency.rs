use std::collections::BTreeMap;

use chrono::NaiveDate;
use fac_schemas::{Installment, ObligationProfile};

use crate::{derive_totals, ConsistencyReport, Finding};

/// Check a stored profile and its installments against every invariant the
/// write path maintains. Deterministic: findings are sorted.
pub fn check_consistency(
    profile: &ObligationProfile,
    installments: &[Installment],
) -> ConsistencyReport {
    let mut findings = Vec::new();

    let mut own: Vec<Installment> = Vec::with_capacity(installments.len());
    for i in installments {
        if i.profile_id == profile.id {
            own.push(i.clone());
        } else {
            findings.push(Finding::ForeignInstallment {
                installment_id: i.id,
            });
        }
    }

    let derived = derive_totals(profile.total_amount_owed, &own);

    // 1) Stored totals vs installments
    if profile.amount_paid_so_far != derived.paid {
        findings.push(Finding::PaidDrift {
            stored: profile.amount_paid_so_far,
            derived: derived.paid,
        });
    }
    if profile.balance_remaining != derived.balance {
        findings.push(Finding::BalanceDrift {
            stored: profile.balance_remaining,
            derived: derived.balance,
        });
    }

    // 2) Row-level identity
    if profile.total_amount_owed.saturating_sub(profile.amount_paid_so_far)
        != profile.balance_remaining
    {
        findings.push(Finding::BalanceIdentity {
            owed: profile.total_amount_owed,
            paid: profile.amount_paid_so_far,
            balance: profile.balance_remaining,
        });
    }

    // 3) Overdraw
    if derived.paid > profile.total_amount_owed {
        findings.push(Finding::Overdrawn {
            owed: profile.total_amount_owed,
            paid: derived.paid,
        });
    }

    // 4) Amounts
    for i in &own {
        if !i.amount.is_positive() {
            findings.push(Finding::NonPositiveAmount {
                installment_id: i.id,
                amount: i.amount,
            });
        }
    }

    // 5) Numbering must be exactly 1..=n
    let mut numbers: Vec<i32> = own.iter().map(|i| i.installment_number).collect();
    numbers.sort_unstable();
    for (idx, found) in numbers.iter().enumerate() {
        let expected = idx as i32 + 1;
        if *found != expected {
            findings.push(Finding::NumberingGap {
                expected,
                found: *found,
            });
            break;
        }
    }

    // 6) Payroll dates
    let mut by_date: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for i in &own {
        *by_date.entry(i.payroll_date).or_default() += 1;
    }
    for (payroll_date, count) in by_date {
        if count > 1 {
            findings.push(Finding::DuplicatePayrollDate {
                payroll_date,
                count,
            });
        }
    }

    findings.sort();

    ConsistencyReport {
        profile_id: profile.id,
        derived,
        findings,
    }
}
