//! Scenario: aggregation is idempotent and order-independent.
//!
//! GREEN when:
//! - Folding the same unmodified input twice yields the same balance.
//! - Every rotation and the reversal of the input yield the same balance.
//! - Filtering happens before the fold (excluded items never contribute).
//! - Sums of many small cent amounts do not drift.

use fac_ledger::{
    compute_balance, compute_balance_filtered, AsMovement, Direction, Money, Movement,
};

#[derive(Debug, Clone)]
struct Row {
    amount: Money,
    repayment: bool,
    rejected: bool,
}

impl AsMovement for Row {
    fn movement(&self) -> Movement {
        if self.repayment {
            Movement::debit(self.amount)
        } else {
            Movement::credit(self.amount)
        }
    }
}

fn rows() -> Vec<Row> {
    vec![
        Row { amount: Money::parse("400.00").unwrap(), repayment: false, rejected: false },
        Row { amount: Money::parse("500.00").unwrap(), repayment: false, rejected: false },
        Row { amount: Money::parse("250.00").unwrap(), repayment: false, rejected: true },
        Row { amount: Money::parse("100.10").unwrap(), repayment: true, rejected: false },
        Row { amount: Money::parse("199.90").unwrap(), repayment: true, rejected: false },
    ]
}

#[test]
fn repeated_fold_is_stable() {
    let input = rows();
    let a = compute_balance_filtered(&input, |r| !r.rejected);
    let b = compute_balance_filtered(&input, |r| !r.rejected);
    assert_eq!(a, b);
    assert_eq!(a, Money::parse("600.00").unwrap());
}

#[test]
fn reordering_does_not_change_result() {
    let input = rows();
    let expected = compute_balance_filtered(&input, |r| !r.rejected);

    for shift in 0..input.len() {
        let mut rotated = input.clone();
        rotated.rotate_left(shift);
        assert_eq!(
            compute_balance_filtered(&rotated, |r| !r.rejected),
            expected,
            "rotation by {shift} changed the balance"
        );
    }

    let mut reversed = input.clone();
    reversed.reverse();
    assert_eq!(compute_balance_filtered(&reversed, |r| !r.rejected), expected);
}

#[test]
fn unfiltered_includes_everything() {
    let input = rows();
    assert_eq!(compute_balance(&input), Money::parse("850.00").unwrap());
}

#[test]
fn many_cent_installments_do_not_drift() {
    // 0.10 added 1000 times is exactly 100.00; a binary float sum is not.
    let dimes: Vec<Movement> = (0..1_000)
        .map(|_| Movement::credit(Money::parse("0.10").unwrap()))
        .collect();
    assert_eq!(compute_balance(&dimes), Money::parse("100.00").unwrap());
}

#[test]
fn direction_is_what_matters() {
    let m = Movement { direction: Direction::Debit, amount: Money::from_units(5) };
    assert_eq!(compute_balance(&[m]), Money::from_units(-5));
}
