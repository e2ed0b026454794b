//! fac-ledger
//!
//! Money and balance folding for the finance console.
//! - `Money` is an exact two-decimal amount stored as integer cents
//! - `compute_balance` folds credit/debit movements into a net balance
//! - Every derived balance in the workspace (profile balance, loan
//!   outstanding) goes through this crate so filters and rounding agree
//! - Pure deterministic logic (no IO, no time)

mod aggregate;
mod money;

pub use aggregate::{
    compute_balance, compute_balance_filtered, compute_breakdown_filtered, sum_amounts,
    AsMovement, BalanceBreakdown, Direction, Movement,
};
pub use money::{Money, MoneyParseError, CENTS_PER_UNIT};
