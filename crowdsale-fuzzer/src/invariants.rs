//! Replica invariant checkers
//!
//! Run by the generator after every step, on the pre/post snapshots:
//! - No effect on revert (every field identical)
//! - Allowance never grows
//! - Token conservation (allowance + disbursed balances is constant)
//! - amountRaised never decreases within one sale lifetime
//! - Goal/cap flags never regress within one sale lifetime
//!
//! Each checker returns the list of violations, empty when the transition is
//! sound.

use crate::model::Snapshot;

/// Whether the step being checked deployed a new sale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Same sale contract before and after
    Same,
    /// `post` belongs to a freshly deployed sale
    Redeployed,
}

/// Check a reverted step left everything untouched
pub fn check_no_effect(pre: &Snapshot, post: &Snapshot) -> Vec<String> {
    let mut errors = Vec::new();

    if pre.sale != post.sale {
        errors.push("sale state changed on a reverted step".to_string());
    }
    if pre.ledger != post.ledger {
        errors.push("token ledger changed on a reverted step".to_string());
    }
    if pre.now != post.now {
        errors.push(format!(
            "clock moved on a reverted step: {} -> {}",
            pre.now, post.now
        ));
    }

    errors
}

/// Check a state-changing step against the monotonicity rules
pub fn check_transition(pre: &Snapshot, post: &Snapshot, lifetime: Lifetime) -> Vec<String> {
    let mut errors = Vec::new();

    let allowance_before = pre.ledger.crowdsale_allowance();
    let allowance_after = post.ledger.crowdsale_allowance();
    if allowance_after > allowance_before {
        errors.push(format!(
            "crowdsale allowance increased: {} -> {}",
            allowance_before, allowance_after
        ));
    }

    let total_before = allowance_before.checked_add(pre.ledger.total_disbursed());
    let total_after = allowance_after.checked_add(post.ledger.total_disbursed());
    if total_before != total_after {
        errors.push(format!(
            "tokens not conserved: {:?} -> {:?}",
            total_before, total_after
        ));
    }

    if lifetime == Lifetime::Same {
        if post.sale.amount_raised < pre.sale.amount_raised {
            errors.push(format!(
                "amountRaised decreased: {} -> {}",
                pre.sale.amount_raised, post.sale.amount_raised
            ));
        }
        if pre.sale.goal_reached && !post.sale.goal_reached {
            errors.push("goalReached regressed to false".to_string());
        }
        if pre.sale.cap_reached && !post.sale.cap_reached {
            errors.push("capReached regressed to false".to_string());
        }
    }

    errors
}
