//! Oracle: pre/post replica snapshots to expected-value assertions
//!
//! Success steps assert the exact post-state of every quantity the call can
//! touch. Reverting steps assert the same quantities are identical to their
//! pre-call value: no partial effects.

use crate::model::Snapshot;
use crate::step::{Assertion, Call, Expectation, Invocation, Observable, Outcome, Value, Verdict};

/// Read an observable from a snapshot
pub fn observe(snapshot: &Snapshot, observable: &Observable) -> Value {
    let sale = &snapshot.sale;
    match observable {
        Observable::TokenBalance(address) => Value::Amount(snapshot.ledger.balance_of(address)),
        Observable::SaleBalance(address) => Value::Amount(sale.contribution_of(address)),
        Observable::AmountRaised => Value::Amount(sale.amount_raised),
        Observable::CrowdsaleAllowance => Value::Amount(snapshot.ledger.crowdsale_allowance()),
        Observable::GoalReached => Value::Flag(sale.goal_reached),
        Observable::CapReached => Value::Flag(sale.cap_reached),
        Observable::Rate => Value::Amount(sale.rate),
        Observable::Paused => Value::Flag(sale.paused),
        Observable::SaleClosed => Value::Flag(sale.sale_closed),
        Observable::SaleEtherBalance => Value::Amount(sale.ether_balance),
        Observable::BeneficiaryEtherBalance => Value::Amount(sale.beneficiary_payouts),
        Observable::CurrentTime => Value::Time(snapshot.now),
    }
}

/// Quantities a call can change, in assertion order
pub fn affected_observables(invocation: &Invocation) -> Vec<Observable> {
    let purchase = |to: &crate::model::Address| {
        vec![
            Observable::TokenBalance(to.clone()),
            Observable::SaleBalance(to.clone()),
            Observable::CrowdsaleAllowance,
            Observable::AmountRaised,
            Observable::GoalReached,
            Observable::CapReached,
        ]
    };

    match &invocation.call {
        Call::Terminate => vec![Observable::SaleClosed],
        Call::SetRate { .. } => vec![Observable::Rate],
        Call::Pause { .. } => vec![Observable::Paused],
        Call::SetTime { .. } => vec![Observable::CurrentTime],
        Call::AllocateTokens { to, .. } => purchase(to),
        Call::Contribute { .. } => {
            let mut observables = purchase(&invocation.caller);
            observables.push(Observable::SaleEtherBalance);
            observables
        }
        Call::UnlockFunds => vec![Observable::SaleClosed, Observable::GoalReached],
        Call::SafeWithdrawal => vec![
            Observable::SaleEtherBalance,
            Observable::BeneficiaryEtherBalance,
        ],
        Call::Redeploy { .. } => vec![
            Observable::AmountRaised,
            Observable::CrowdsaleAllowance,
            Observable::GoalReached,
            Observable::CapReached,
            Observable::Rate,
            Observable::Paused,
            Observable::SaleClosed,
            Observable::SaleEtherBalance,
        ],
    }
}

/// Turns a step's snapshots into its expected outcome
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleRenderer;

impl OracleRenderer {
    /// Create a renderer
    pub fn new() -> Self {
        Self
    }

    /// Outcome of `invocation` given the replica before and after it
    ///
    /// For a revert `post` is ignored and every assertion is taken from `pre`.
    pub fn render(
        &self,
        pre: &Snapshot,
        post: &Snapshot,
        invocation: &Invocation,
        verdict: &Verdict,
    ) -> Outcome {
        // a successor contract has no "before" of its own
        let absolute_only = matches!(invocation.call, Call::Redeploy { .. });

        match verdict {
            Verdict::Succeeds => Outcome::Succeeds {
                assertions: affected_observables(invocation)
                    .into_iter()
                    .map(|observable| assertion_for(pre, post, observable, absolute_only))
                    .collect(),
            },
            Verdict::Reverts(reason) => Outcome::Reverts {
                reason: *reason,
                message: reason.message(invocation.operation()),
                assertions: affected_observables(invocation)
                    .into_iter()
                    .map(|observable| assertion_for(pre, pre, observable, absolute_only))
                    .collect(),
            },
        }
    }
}

fn assertion_for(
    pre: &Snapshot,
    post: &Snapshot,
    observable: Observable,
    absolute_only: bool,
) -> Assertion {
    let after = observe(post, &observable);
    let expect = if absolute_only || !observable.is_relative() {
        Expectation::Equals(after)
    } else {
        match (observe(pre, &observable), after) {
            (Value::Amount(before), Value::Amount(after)) if after > before => {
                Expectation::Increased(after - before)
            }
            (Value::Amount(before), Value::Amount(after)) if after < before => {
                Expectation::Decreased(before - after)
            }
            (before, after) if before == after => Expectation::Unchanged,
            (_, after) => Expectation::Equals(after),
        }
    };

    Assertion {
        observable,
        expect,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::amount::ETHER;
    use crate::catalog::FailureMode;
    use crate::model::{Accounts, Address, SaleParams, SaleState, TokenLedger, TokenParams};
    use crate::step::RevertReason;

    fn snapshot() -> Snapshot {
        let accounts = Accounts::default();
        let params = SaleParams::default();
        Snapshot::capture(
            &SaleState::new(&accounts, &params),
            &TokenLedger::new(&TokenParams::default()),
            params.start_time,
        )
    }

    fn find<'a>(outcome: &'a Outcome, observable: &Observable) -> &'a Expectation {
        &outcome
            .assertions()
            .iter()
            .find(|a| &a.observable == observable)
            .unwrap()
            .expect
    }

    #[test]
    fn test_contribution_deltas() {
        let pre = snapshot();
        let mut post = pre.clone();
        let user = Address::account("user2");
        post.sale
            .record_contribution(&mut post.ledger, &user, ETHER / 2)
            .unwrap();

        let invocation = Invocation::new(user.clone(), Call::Contribute { wei: ETHER / 2 });
        let outcome = OracleRenderer::new().render(&pre, &post, &invocation, &Verdict::Succeeds);

        let tokens = ETHER / 2 * 5_000;
        assert_eq!(
            find(&outcome, &Observable::TokenBalance(user.clone())),
            &Expectation::Increased(tokens)
        );
        assert_eq!(
            find(&outcome, &Observable::SaleBalance(user)),
            &Expectation::Increased(ETHER / 2)
        );
        assert_eq!(
            find(&outcome, &Observable::CrowdsaleAllowance),
            &Expectation::Decreased(tokens)
        );
        assert_eq!(
            find(&outcome, &Observable::AmountRaised),
            &Expectation::Increased(ETHER / 2)
        );
        assert_eq!(
            find(&outcome, &Observable::GoalReached),
            &Expectation::Equals(Value::Flag(false))
        );
        assert_eq!(
            find(&outcome, &Observable::SaleEtherBalance),
            &Expectation::Increased(ETHER / 2)
        );
    }

    #[test]
    fn test_revert_asserts_pre_state() {
        let pre = snapshot();
        let invocation = Invocation::new(Address::account("owner"), Call::SetRate { rate: 20_000 });
        let verdict = Verdict::Reverts(RevertReason::Injected(FailureMode::RateAbove));

        let outcome = OracleRenderer::new().render(&pre, &pre, &invocation, &verdict);
        match &outcome {
            Outcome::Reverts {
                message,
                assertions,
                ..
            } => {
                assert_eq!(message, "the new rate must be within the bounds");
                assert_eq!(assertions.len(), 1);
                assert_eq!(
                    assertions[0].expect,
                    Expectation::Equals(Value::Amount(5_000))
                );
            }
            other => panic!("expected revert, got {other:?}"),
        }
    }

    #[test]
    fn test_revert_relative_quantities_unchanged() {
        let pre = snapshot();
        let invocation = Invocation::new(
            Address::account("user2"),
            Call::AllocateTokens {
                to: Address::Zero,
                amount_wei: 1,
                amount_tokens: 1,
            },
        );
        let verdict = Verdict::Reverts(RevertReason::Injected(FailureMode::OnlyOwner));

        let outcome = OracleRenderer::new().render(&pre, &pre, &invocation, &verdict);
        assert_eq!(
            find(&outcome, &Observable::TokenBalance(Address::Zero)),
            &Expectation::Unchanged
        );
        assert_eq!(
            find(&outcome, &Observable::CrowdsaleAllowance),
            &Expectation::Unchanged
        );
    }

    #[test]
    fn test_redeploy_asserts_absolute_values() {
        let pre = snapshot();
        let mut post = pre.clone();
        post.sale.rate = 7_000;

        let invocation = Invocation::new(
            Address::account("owner"),
            Call::Redeploy {
                params: SaleParams::default(),
            },
        );
        let outcome = OracleRenderer::new().render(&pre, &post, &invocation, &Verdict::Succeeds);

        assert_eq!(
            find(&outcome, &Observable::AmountRaised),
            &Expectation::Equals(Value::Amount(0))
        );
        assert_eq!(
            find(&outcome, &Observable::CrowdsaleAllowance),
            &Expectation::Equals(Value::Amount(650_000_000 * ETHER))
        );
        assert_eq!(
            find(&outcome, &Observable::Rate),
            &Expectation::Equals(Value::Amount(7_000))
        );
    }
}
