//! Shared fixtures for cross-crate scenario tests.
//!
//! Builds an in-memory [`Console`] with a principal per role, plus draft
//! builders and an invariant checker that inspects a profile aggregate
//! directly (independent of `fac-reconcile`'s own consistency check).

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use fac_audit::AuditWriter;
use fac_engine::{AuditMirror, Console, MemStore, ProfileAggregate};
use fac_ledger::sum_amounts;
use fac_loans::OutstandingPolicy;
use fac_schemas::{
    ApprovalStatus, Employee, Money, NewInstallment, NewProfile, NewRepayment, NewWithdrawal,
    Principal, Role,
};
use uuid::Uuid;

pub fn money(s: &str) -> Money {
    match Money::parse(s) {
        Ok(m) => m,
        Err(e) => panic!("fixture amount {s:?}: {e}"),
    }
}

/// Payroll dates are days of July 2024.
pub fn payroll_day(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, day).unwrap_or_else(|| panic!("bad fixture day {day}"))
}

pub struct Fixture {
    pub console: Console,
    pub store: Arc<MemStore>,
    pub viewer: Principal,
    pub editor: Principal,
    pub manager: Principal,
    pub admin: Principal,
    /// Present when built with [`Fixture::with_mirror`].
    pub mirror_path: Option<std::path::PathBuf>,
    _dir: Option<tempfile::TempDir>,
}

impl Fixture {
    pub fn new(policy: OutstandingPolicy) -> Self {
        let (console, store) = Console::in_memory(policy);
        Self::assemble(console, store, None, None)
    }

    /// Console whose committed audit entries are mirrored to a hash-chained
    /// JSONL file in a temp dir owned by the fixture.
    pub fn with_mirror(policy: OutstandingPolicy) -> Result<Self> {
        let dir = tempfile::tempdir().context("create fixture temp dir")?;
        let path = dir.path().join("audit.jsonl");
        let mirror = AuditMirror::new(AuditWriter::open(&path, true)?);
        let store = Arc::new(MemStore::new());
        let console = Console::new(Arc::clone(&store), policy, Some(mirror));
        Ok(Self::assemble(console, store, Some(path), Some(dir)))
    }

    fn assemble(
        console: Console,
        store: Arc<MemStore>,
        mirror_path: Option<std::path::PathBuf>,
        dir: Option<tempfile::TempDir>,
    ) -> Self {
        let p = |name: &str, role| Principal::new(Uuid::new_v4(), name, role);
        Self {
            console,
            store,
            viewer: p("auditor", Role::Viewer),
            editor: p("payroll clerk", Role::Editor),
            manager: p("finance manager", Role::Manager),
            admin: p("controller", Role::Admin),
            mirror_path,
            _dir: dir,
        }
    }

    pub async fn employee(&self, full_name: &str) -> Uuid {
        let e = Employee {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            active: true,
        };
        let id = e.id;
        self.store.add_employee(e).await;
        id
    }

    /// Record a withdrawal and walk it through both approvals.
    pub async fn approved_withdrawal(&self, employee_id: Uuid, amount: &str) -> Result<Uuid> {
        let loans = &self.console.loans;
        let w = loans
            .record_withdrawal(&self.editor, employee_id, withdrawal(amount))
            .await?;
        loans
            .change_withdrawal_status(&self.manager, w.id, ApprovalStatus::ApprovedManager)
            .await?;
        loans
            .change_withdrawal_status(&self.admin, w.id, ApprovalStatus::ApprovedAdmin)
            .await?;
        Ok(w.id)
    }
}

pub fn case(owed: &str) -> NewProfile {
    NewProfile {
        case_number: format!("GC-{}", Uuid::new_v4().simple()),
        employee_id: Uuid::new_v4(),
        creditor_name: "Midland Credit".into(),
        court_district: "Northern District".into(),
        law_firm: "Hale & Byrne".into(),
        total_amount_owed: money(owed),
        notes: None,
        document_ref: None,
    }
}

pub fn installment(amount: &str, day: u32) -> NewInstallment {
    NewInstallment {
        amount: money(amount),
        payroll_date: payroll_day(day),
        check_number: Some(format!("CHK-{day:04}")),
        notes: None,
        document_ref: None,
    }
}

pub fn withdrawal(amount: &str) -> NewWithdrawal {
    NewWithdrawal {
        amount: money(amount),
        withdrawal_date: payroll_day(1),
        due_date: payroll_day(31),
        notes: None,
    }
}

pub fn repayment(amount: &str, day: u32) -> NewRepayment {
    NewRepayment {
        amount: money(amount),
        payroll_date: payroll_day(day),
        notes: None,
    }
}

/// Balance identity, no overdraw, dense numbering, unique payroll dates.
pub fn assert_profile_invariants(agg: &ProfileAggregate) -> Result<()> {
    let p = &agg.profile;
    let paid = sum_amounts(agg.installments.iter().map(|i| i.amount));

    if p.amount_paid_so_far != paid {
        bail!("paid drift: stored {} derived {}", p.amount_paid_so_far, paid);
    }
    if p.balance_remaining != p.total_amount_owed - paid {
        bail!(
            "balance identity broken: owed {} paid {} balance {}",
            p.total_amount_owed,
            paid,
            p.balance_remaining
        );
    }
    if p.balance_remaining.is_negative() {
        bail!("overdrawn: balance {}", p.balance_remaining);
    }

    let mut numbers: Vec<i32> = agg.installments.iter().map(|i| i.installment_number).collect();
    numbers.sort_unstable();
    let expected: Vec<i32> = (1..=numbers.len() as i32).collect();
    if numbers != expected {
        bail!("numbering not dense: {numbers:?}");
    }

    let dates: BTreeSet<NaiveDate> = agg.installments.iter().map(|i| i.payroll_date).collect();
    if dates.len() != agg.installments.len() {
        bail!("duplicate payroll date among {} installments", agg.installments.len());
    }
    Ok(())
}

/// Deterministic xorshift stream for shuffled-order scenarios.
pub struct Shuffle(u64);

impl Shuffle {
    pub fn seeded(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = (self.next_u64() % (i as u64 + 1)) as usize;
            items.swap(i, j);
        }
    }
}
