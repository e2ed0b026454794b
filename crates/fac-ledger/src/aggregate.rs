//! Ledger aggregator: fold credit/debit movements into a net balance.
//!
//! # Contract
//!
//! - `net = Σ(credits) − Σ(debits)` over the items kept by the predicate.
//! - The filter runs before the fold; the fold is order-independent.
//! - Accumulation happens in `i128`, so no realistic input can overflow
//!   mid-sum; the final value saturates into the `Money` range.
//! - Inputs are borrowed and never mutated.  Empty input yields zero.
//!
//! Domain records (installments, withdrawals, repayments) implement
//! [`AsMovement`] in their own crates; this module knows nothing about them.

use crate::money::Money;

/// Which side of the balance a movement lands on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Increases the balance (amount owed, money withdrawn).
    Credit,
    /// Decreases the balance (amount paid, money repaid).
    Debit,
}

/// A single signed monetary movement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Movement {
    pub direction: Direction,
    pub amount: Money,
}

impl Movement {
    pub fn credit(amount: Money) -> Self {
        Self {
            direction: Direction::Credit,
            amount,
        }
    }

    pub fn debit(amount: Money) -> Self {
        Self {
            direction: Direction::Debit,
            amount,
        }
    }
}

/// Anything that can be viewed as a ledger movement.
pub trait AsMovement {
    fn movement(&self) -> Movement;
}

impl AsMovement for Movement {
    fn movement(&self) -> Movement {
        *self
    }
}

impl<T: AsMovement + ?Sized> AsMovement for &T {
    fn movement(&self) -> Movement {
        (**self).movement()
    }
}

/// Net balance over every item.
pub fn compute_balance<'a, T, I>(items: I) -> Money
where
    T: AsMovement + ?Sized + 'a,
    I: IntoIterator<Item = &'a T>,
{
    compute_balance_filtered(items, |_| true)
}

/// Net balance over the items for which `keep` returns `true`.
pub fn compute_balance_filtered<'a, T, I, F>(items: I, keep: F) -> Money
where
    T: AsMovement + ?Sized + 'a,
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T) -> bool,
{
    compute_breakdown_filtered(items, keep).net
}

/// Credits, debits and net for a filtered movement set.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceBreakdown {
    pub credits: Money,
    pub debits: Money,
    pub net: Money,
    /// Number of items that passed the filter.
    pub count: usize,
}

/// Same fold as [`compute_balance_filtered`], keeping the per-side totals.
pub fn compute_breakdown_filtered<'a, T, I, F>(items: I, keep: F) -> BalanceBreakdown
where
    T: AsMovement + ?Sized + 'a,
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T) -> bool,
{
    let mut credits: i128 = 0;
    let mut debits: i128 = 0;
    let mut count = 0usize;

    for item in items {
        if !keep(item) {
            continue;
        }
        let m = item.movement();
        let cents = m.amount.cents() as i128;
        match m.direction {
            Direction::Credit => credits += cents,
            Direction::Debit => debits += cents,
        }
        count += 1;
    }

    BalanceBreakdown {
        credits: Money::from_i128_saturating(credits),
        debits: Money::from_i128_saturating(debits),
        net: Money::from_i128_saturating(credits - debits),
        count,
    }
}

/// Plain Σ of amounts, overflow-safe.
pub fn sum_amounts<I>(amounts: I) -> Money
where
    I: IntoIterator<Item = Money>,
{
    let total: i128 = amounts.into_iter().map(|m| m.cents() as i128).sum();
    Money::from_i128_saturating(total)
}
