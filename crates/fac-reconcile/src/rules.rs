use chrono::{DateTime, Utc};
use fac_audit::AuditEntry;
use fac_ledger::compute_breakdown_filtered;
use fac_lifecycle::authorize_transition;
use fac_schemas::{
    EntityKind, FinanceError, FinanceResult, Installment, InstallmentPatch, Money,
    NewInstallment, NewProfile, ObligationProfile, Principal, ProfileStatus,
};
use uuid::Uuid;

use crate::{DeletePlan, InstallmentPlan, ProfileTotals, StatusPlan};

const PROFILE: EntityKind = EntityKind::ObligationProfile;
const INSTALLMENT: EntityKind = EntityKind::Installment;

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// paid = Σ amounts, balance = owed − paid.
pub fn derive_totals(owed: Money, installments: &[Installment]) -> ProfileTotals {
    let b = compute_breakdown_filtered(installments, |_| true);
    ProfileTotals {
        paid: b.debits,
        balance: owed.saturating_sub(b.debits),
    }
}

/// Profile as it looks after a committed mutation.
fn advance(profile: &ObligationProfile, totals: ProfileTotals, now: DateTime<Utc>) -> ObligationProfile {
    let mut next = profile.clone();
    next.amount_paid_so_far = totals.paid;
    next.balance_remaining = totals.balance;
    next.version = profile.version + 1;
    next.updated_at = now;
    next
}

fn ensure_open(profile: &ObligationProfile) -> FinanceResult<()> {
    if profile.is_completed() {
        return Err(FinanceError::validation(format!(
            "garnishment case {} is completed; installments can no longer be recorded or edited",
            profile.case_number
        )));
    }
    Ok(())
}

fn ensure_positive(amount: Money) -> FinanceResult<()> {
    if !amount.is_positive() {
        return Err(FinanceError::validation(format!(
            "installment amount must be greater than zero (got {amount})"
        )));
    }
    Ok(())
}

fn ensure_not_blank(field: &str, value: &str) -> FinanceResult<()> {
    if value.trim().is_empty() {
        return Err(FinanceError::validation(format!("{field} is required")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Profile creation
// ---------------------------------------------------------------------------

/// New `active` profile with nothing paid, plus its insert audit entry.
pub fn plan_new_profile(
    draft: &NewProfile,
    actor: &Principal,
    now: DateTime<Utc>,
) -> FinanceResult<(ObligationProfile, AuditEntry)> {
    ensure_not_blank("case number", &draft.case_number)?;
    ensure_not_blank("creditor name", &draft.creditor_name)?;
    if draft.total_amount_owed.is_negative() {
        return Err(FinanceError::validation(format!(
            "total amount owed cannot be negative (got {})",
            draft.total_amount_owed
        )));
    }

    let profile = ObligationProfile {
        id: Uuid::new_v4(),
        case_number: draft.case_number.trim().to_string(),
        employee_id: draft.employee_id,
        creditor_name: draft.creditor_name.trim().to_string(),
        court_district: draft.court_district.clone(),
        law_firm: draft.law_firm.clone(),
        total_amount_owed: draft.total_amount_owed,
        amount_paid_so_far: Money::ZERO,
        balance_remaining: draft.total_amount_owed,
        status: ProfileStatus::Active,
        notes: draft.notes.clone(),
        document_ref: draft.document_ref.clone(),
        version: 1,
        created_at: now,
        updated_at: now,
    };
    let audit = AuditEntry::insert(PROFILE, profile.id, &profile, actor, now)?;
    Ok((profile, audit))
}

// ---------------------------------------------------------------------------
// Installments
// ---------------------------------------------------------------------------

/// Validate and plan a new installment against the profile's current state.
///
/// `installments` must be every installment of `profile`, as read together
/// with it.
pub fn plan_create_installment(
    profile: &ObligationProfile,
    installments: &[Installment],
    draft: &NewInstallment,
    actor: &Principal,
    now: DateTime<Utc>,
) -> FinanceResult<InstallmentPlan> {
    ensure_open(profile)?;
    ensure_positive(draft.amount)?;

    let before = derive_totals(profile.total_amount_owed, installments);
    if draft.amount > before.balance {
        return Err(FinanceError::validation(format!(
            "installment amount {} exceeds the remaining balance {}",
            draft.amount, before.balance
        )));
    }

    if installments.iter().any(|i| i.payroll_date == draft.payroll_date) {
        return Err(FinanceError::validation(format!(
            "an installment for payroll date {} already exists on case {}",
            draft.payroll_date, profile.case_number
        )));
    }

    let installment_number = i32::try_from(installments.len() + 1)
        .map_err(|_| FinanceError::validation("too many installments on one profile"))?;

    let installment = Installment {
        id: Uuid::new_v4(),
        profile_id: profile.id,
        installment_number,
        amount: draft.amount,
        payroll_date: draft.payroll_date,
        check_number: draft.check_number.clone(),
        notes: draft.notes.clone(),
        document_ref: draft.document_ref.clone(),
        recorded_by: actor.id,
        created_at: now,
        updated_at: now,
    };

    let after = ProfileTotals {
        paid: before.paid.saturating_add(draft.amount),
        balance: before.balance.saturating_sub(draft.amount),
    };
    let next = advance(profile, after, now);

    let mut audit = vec![AuditEntry::insert(
        INSTALLMENT,
        installment.id,
        &installment,
        actor,
        now,
    )?];
    audit.extend(AuditEntry::update(PROFILE, profile.id, profile, &next, actor, now)?);

    Ok(InstallmentPlan {
        installment,
        profile: next,
        expected_version: profile.version,
        audit,
    })
}

/// Validate and plan an edit of an existing installment.
///
/// The new amount is checked against owed − Σ(other installments), i.e. the
/// profile balance with the old amount added back.
pub fn plan_update_installment(
    profile: &ObligationProfile,
    installments: &[Installment],
    installment_id: Uuid,
    patch: &InstallmentPatch,
    actor: &Principal,
    now: DateTime<Utc>,
) -> FinanceResult<InstallmentPlan> {
    let existing = installments
        .iter()
        .find(|i| i.id == installment_id)
        .ok_or_else(|| FinanceError::not_found(INSTALLMENT, installment_id))?;

    ensure_open(profile)?;

    let new_amount = patch.amount.unwrap_or(existing.amount);
    ensure_positive(new_amount)?;

    let others = compute_breakdown_filtered(installments, |i| i.id != installment_id).debits;
    let paid_after = others.saturating_add(new_amount);
    let balance_after = profile.total_amount_owed.saturating_sub(paid_after);
    if balance_after.is_negative() {
        let available = profile.total_amount_owed.saturating_sub(others);
        return Err(FinanceError::validation(format!(
            "installment amount {new_amount} exceeds the remaining balance {available}"
        )));
    }

    let new_date = patch.payroll_date.unwrap_or(existing.payroll_date);
    if new_date != existing.payroll_date
        && installments
            .iter()
            .any(|i| i.id != installment_id && i.payroll_date == new_date)
    {
        return Err(FinanceError::validation(format!(
            "an installment for payroll date {new_date} already exists on case {}",
            profile.case_number
        )));
    }

    let mut updated = existing.clone();
    updated.amount = new_amount;
    updated.payroll_date = new_date;
    if let Some(v) = &patch.check_number {
        updated.check_number = Some(v.clone());
    }
    if let Some(v) = &patch.notes {
        updated.notes = Some(v.clone());
    }
    if let Some(v) = &patch.document_ref {
        updated.document_ref = Some(v.clone());
    }
    updated.updated_at = now;

    let next = advance(
        profile,
        ProfileTotals {
            paid: paid_after,
            balance: balance_after,
        },
        now,
    );

    let mut audit = Vec::new();
    audit.extend(AuditEntry::update(
        INSTALLMENT,
        updated.id,
        existing,
        &updated,
        actor,
        now,
    )?);
    audit.extend(AuditEntry::update(PROFILE, profile.id, profile, &next, actor, now)?);

    Ok(InstallmentPlan {
        installment: updated,
        profile: next,
        expected_version: profile.version,
        audit,
    })
}

// ---------------------------------------------------------------------------
// Status and deletion
// ---------------------------------------------------------------------------

/// Guarded status change. Totals are carried over untouched.
pub fn plan_status_change(
    profile: &ObligationProfile,
    target: ProfileStatus,
    actor: &Principal,
    now: DateTime<Utc>,
) -> FinanceResult<StatusPlan> {
    authorize_transition(actor, PROFILE, profile.status.as_str(), target.as_str())?;

    let mut next = profile.clone();
    next.status = target;
    next.version = profile.version + 1;
    next.updated_at = now;

    let audit = vec![AuditEntry::status_change(
        PROFILE,
        profile.id,
        profile.status.as_str(),
        target.as_str(),
        actor,
        now,
    )];

    Ok(StatusPlan {
        profile: next,
        expected_version: profile.version,
        audit,
    })
}

/// Delete entries for the profile and every installment it owns.
pub fn plan_delete_profile(
    profile: &ObligationProfile,
    installments: &[Installment],
    actor: &Principal,
    now: DateTime<Utc>,
) -> FinanceResult<DeletePlan> {
    let mut audit = Vec::with_capacity(installments.len() + 1);
    for i in installments {
        audit.push(AuditEntry::delete(INSTALLMENT, i.id, i, actor, now)?);
    }
    audit.push(AuditEntry::delete(PROFILE, profile.id, profile, actor, now)?);

    Ok(DeletePlan {
        profile_id: profile.id,
        expected_version: profile.version,
        audit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fac_schemas::Role;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn clerk() -> Principal {
        Principal::new(Uuid::new_v4(), "clerk", Role::Editor)
    }

    fn profile(owed: &str) -> ObligationProfile {
        let draft = NewProfile {
            case_number: "GC-2024-001".into(),
            employee_id: Uuid::new_v4(),
            creditor_name: "Acme Credit".into(),
            court_district: "District 4".into(),
            law_firm: "Smith & Co".into(),
            total_amount_owed: m(owed),
            notes: None,
            document_ref: None,
        };
        plan_new_profile(&draft, &clerk(), Utc::now()).unwrap().0
    }

    fn draft(amount: &str, day: u32) -> NewInstallment {
        NewInstallment {
            amount: m(amount),
            payroll_date: d(day),
            check_number: None,
            notes: None,
            document_ref: None,
        }
    }

    #[test]
    fn new_profile_starts_unpaid_and_active() {
        let p = profile("1000.00");
        assert_eq!(p.amount_paid_so_far, Money::ZERO);
        assert_eq!(p.balance_remaining, m("1000.00"));
        assert_eq!(p.status, ProfileStatus::Active);
        assert_eq!(p.version, 1);
    }

    #[test]
    fn create_numbers_and_recomputes() {
        let p = profile("1000.00");
        let plan = plan_create_installment(&p, &[], &draft("300.00", 1), &clerk(), Utc::now())
            .unwrap();
        assert_eq!(plan.installment.installment_number, 1);
        assert_eq!(plan.profile.amount_paid_so_far, m("300.00"));
        assert_eq!(plan.profile.balance_remaining, m("700.00"));
        assert_eq!(plan.profile.version, 2);
        assert_eq!(plan.expected_version, 1);
        // installment insert + profile totals update
        assert_eq!(plan.audit.len(), 2);
    }

    #[test]
    fn create_rejects_zero_and_negative() {
        let p = profile("1000.00");
        for amt in ["0.00", "-5.00"] {
            let err = plan_create_installment(&p, &[], &draft(amt, 1), &clerk(), Utc::now())
                .unwrap_err();
            assert!(matches!(err, FinanceError::Validation(_)));
        }
    }

    #[test]
    fn create_rejects_on_completed_profile() {
        let mut p = profile("1000.00");
        p.status = ProfileStatus::Completed;
        let err = plan_create_installment(&p, &[], &draft("1.00", 1), &clerk(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, FinanceError::Validation(_)));
    }

    #[test]
    fn exact_payoff_allowed() {
        let p = profile("250.00");
        let plan = plan_create_installment(&p, &[], &draft("250.00", 1), &clerk(), Utc::now())
            .unwrap();
        assert!(plan.profile.is_settled());
        // settling does not complete the case
        assert_eq!(plan.profile.status, ProfileStatus::Active);
    }

    #[test]
    fn update_unknown_installment_is_not_found() {
        let p = profile("100.00");
        let err = plan_update_installment(
            &p,
            &[],
            Uuid::new_v4(),
            &InstallmentPatch::amount(m("1.00")),
            &clerk(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, FinanceError::NotFound { .. }));
    }

    #[test]
    fn status_change_carries_totals() {
        let p = profile("1000.00");
        let plan = plan_status_change(&p, ProfileStatus::Suspended, &clerk(), Utc::now()).unwrap();
        assert_eq!(plan.profile.status, ProfileStatus::Suspended);
        assert_eq!(plan.profile.balance_remaining, p.balance_remaining);
        assert_eq!(plan.audit.len(), 1);
    }

    #[test]
    fn viewer_cannot_change_status() {
        let p = profile("1000.00");
        let viewer = Principal::new(Uuid::new_v4(), "ro", Role::Viewer);
        let err = plan_status_change(&p, ProfileStatus::Suspended, &viewer, Utc::now()).unwrap_err();
        assert!(matches!(err, FinanceError::Forbidden(_)));
    }

    #[test]
    fn blank_case_number_rejected() {
        let draft = NewProfile {
            case_number: "  ".into(),
            employee_id: Uuid::new_v4(),
            creditor_name: "x".into(),
            court_district: String::new(),
            law_firm: String::new(),
            total_amount_owed: m("1.00"),
            notes: None,
            document_ref: None,
        };
        assert!(plan_new_profile(&draft, &clerk(), Utc::now()).is_err());
    }
}
