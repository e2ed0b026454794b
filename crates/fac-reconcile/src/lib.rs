//! fac-reconcile
//!
//! Garnishment reconciliation rules.
//!
//! - Profile totals are always derived from installments, never edited.
//! - Every write is planned here against a consistent read of the profile
//!   and its installments; the store commits the plan atomically, conditional
//!   on `expected_version`.
//! - [`check_consistency`] re-derives everything from stored rows and lists
//!   what does not add up.
//!
//! Deterministic, pure logic. No IO.

mod consistency;
mod rules;
mod types;

pub use consistency::check_consistency;
pub use rules::{
    derive_totals, plan_create_installment, plan_delete_profile, plan_new_profile,
    plan_status_change, plan_update_installment,
};
pub use types::*;
