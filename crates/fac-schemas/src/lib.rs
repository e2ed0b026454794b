//! Record types shared by every fac-* crate.
//!
//! Plain data plus the status enums, the acting principal and the error
//! taxonomy.  No IO and no business rules beyond trivial accessors.

mod error;
mod garnishment;
mod loans;
mod principal;
mod status;

pub use error::{FinanceError, FinanceResult};
pub use garnishment::{InstallmentPatch, Installment, NewInstallment, NewProfile, ObligationProfile};
pub use loans::{
    Employee, LoanRepayment, LoanRequest, LoanWithdrawal, NewLoanRequest, NewRepayment,
    NewWithdrawal,
};
pub use principal::{Principal, Role};
pub use status::{ApprovalStatus, EntityKind, ProfileStatus};

pub use fac_ledger::Money;
