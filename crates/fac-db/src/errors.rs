//! Mapping from `sqlx` failures onto `FinanceError`.
//!
//! Constraint names come from `migrations/0001_fac_init.sql`.

use fac_schemas::{EntityKind, FinanceError};
use tracing::error;

const UQ_CASE_NUMBER: &str = "uq_garnishment_case_number";
const UQ_INSTALLMENT_NUMBER: &str = "uq_installment_number";
const UQ_PAYROLL_DATE: &str = "uq_installment_payroll_date";

const PG_UNIQUE_VIOLATION: &str = "23505";
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";
const PG_CHECK_VIOLATION: &str = "23514";
const PG_SERIALIZATION_FAILURE: &str = "40001";
const PG_DEADLOCK_DETECTED: &str = "40P01";

/// True when `err` is a unique violation of `constraint_name`.
pub fn is_unique_constraint_violation(err: &sqlx::Error, constraint_name: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION)
                && db_err.constraint() == Some(constraint_name)
        }
        _ => false,
    }
}

pub fn is_check_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(PG_CHECK_VIOLATION),
        _ => false,
    }
}

/// Classify a driver error raised while running `op`.
///
/// Constraint rejections become `Validation`/`Conflict`; anything the caller
/// cannot fix by changing input is `CollaboratorUnavailable`.
pub fn classify(op: &'static str, err: sqlx::Error) -> FinanceError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code();
        let constraint = db_err.constraint();
        match (code.as_deref(), constraint) {
            (Some(PG_UNIQUE_VIOLATION), Some(UQ_CASE_NUMBER)) => {
                return FinanceError::validation("case number is already registered");
            }
            (Some(PG_UNIQUE_VIOLATION), Some(UQ_PAYROLL_DATE)) => {
                return FinanceError::validation(
                    "an installment for this payroll date already exists",
                );
            }
            (Some(PG_UNIQUE_VIOLATION), Some(UQ_INSTALLMENT_NUMBER)) => {
                return FinanceError::Conflict(format!(
                    "{op}: installment number taken by a concurrent writer"
                ));
            }
            (Some(PG_CHECK_VIOLATION), Some(name)) => {
                return FinanceError::validation(format!("{op}: rejected by {name}"));
            }
            (Some(PG_FOREIGN_KEY_VIOLATION), Some(name)) if name.ends_with("_employee") => {
                return FinanceError::not_found(EntityKind::Employee, "(referenced)");
            }
            (Some(PG_SERIALIZATION_FAILURE | PG_DEADLOCK_DETECTED), _) => {
                return FinanceError::Conflict(format!("{op}: {}", db_err.message()));
            }
            _ => {}
        }
    }
    error!(op, error = %err, "postgres call failed");
    FinanceError::unavailable(format!("{op}: {err}"))
}
