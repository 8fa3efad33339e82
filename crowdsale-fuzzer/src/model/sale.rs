// File: crowdsale-fuzzer/src/model/sale.rs
//
// Sale contract replica
//
// Holds the subset of the sale contract's storage the oracle needs. The
// mutation helpers below are only called for steps that succeed; they keep
// the replica's arithmetic identical to the contract's and fail loudly when a
// monotonic quantity would move backwards.

use super::address::{Accounts, Address};
use super::token::TokenLedger;
use crate::amount::{self, ETHER};
use crate::error::{FuzzError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Constructor arguments of one sale contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleParams {
    /// Funding goal, in ether
    #[serde(with = "amount::string")]
    pub funding_goal_ether: u128,
    /// Funding cap, in ether
    #[serde(with = "amount::string")]
    pub funding_cap_ether: u128,
    /// Smallest accepted contribution, in wei
    #[serde(with = "amount::string")]
    pub min_contribution_wei: u128,
    /// First second contributions are accepted
    pub start_time: u64,
    /// Length of the contribution window
    pub duration_minutes: u64,
    /// Initial rate, token units per wei
    #[serde(with = "amount::string")]
    pub rate: u128,
    /// Lowest rate `setRate` accepts
    #[serde(with = "amount::string")]
    pub low_rate: u128,
    /// Highest rate `setRate` accepts
    #[serde(with = "amount::string")]
    pub high_rate: u128,
}

impl Default for SaleParams {
    fn default() -> Self {
        Self {
            funding_goal_ether: 10,
            funding_cap_ether: 20,
            min_contribution_wei: ETHER / 10,
            start_time: 1_000_000,
            duration_minutes: 60,
            rate: 5_000,
            low_rate: 5_000,
            high_rate: 10_000,
        }
    }
}

impl SaleParams {
    /// Last second contributions are accepted
    pub fn end_time(&self) -> u64 {
        self.start_time
            .saturating_add(self.duration_minutes.saturating_mul(60))
    }
}

/// Replica of one deployed sale contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleState {
    /// Only caller allowed to run admin operations
    pub owner: Address,
    /// Receiver of `safeWithdrawal` payouts
    pub beneficiary: Address,
    /// Token admin account
    pub token_admin: Address,
    /// Goal, in wei
    pub funding_goal: u128,
    /// Cap, in wei
    pub funding_cap: u128,
    /// Minimum single contribution, in wei
    pub min_contribution: u128,
    /// Window start
    pub start_time: u64,
    /// Window end, inclusive
    pub end_time: u64,
    /// Current rate
    pub rate: u128,
    /// Lower rate bound
    pub low_rate: u128,
    /// Upper rate bound
    pub high_rate: u128,
    /// Set by `terminate` and `unlockFunds`
    pub sale_closed: bool,
    /// Set and cleared by `pause`
    pub paused: bool,
    /// Wei raised over the lifetime of this contract
    pub amount_raised: u128,
    /// Wei credited per contributor (`sale.balanceOf`)
    pub contributions: BTreeMap<Address, u128>,
    /// `amount_raised >= funding_goal`
    pub goal_reached: bool,
    /// `amount_raised >= funding_cap`
    pub cap_reached: bool,
    /// Ether held by the contract
    pub ether_balance: u128,
    /// Wei forwarded to the beneficiary so far
    pub beneficiary_payouts: u128,
}

impl SaleState {
    /// Freshly deployed sale
    pub fn new(accounts: &Accounts, params: &SaleParams) -> Self {
        let mut sale = Self {
            owner: accounts.owner(),
            beneficiary: accounts.beneficiary(),
            token_admin: accounts.token_admin(),
            funding_goal: params.funding_goal_ether.saturating_mul(ETHER),
            funding_cap: params.funding_cap_ether.saturating_mul(ETHER),
            min_contribution: params.min_contribution_wei,
            start_time: params.start_time,
            end_time: params.end_time(),
            rate: params.rate,
            low_rate: params.low_rate,
            high_rate: params.high_rate,
            sale_closed: false,
            paused: false,
            amount_raised: 0,
            contributions: BTreeMap::new(),
            goal_reached: false,
            cap_reached: false,
            ether_balance: 0,
            beneficiary_payouts: 0,
        };
        // a zero goal is reached at deploy time
        sale.goal_reached = sale.amount_raised >= sale.funding_goal;
        sale.cap_reached = sale.amount_raised >= sale.funding_cap;
        sale
    }

    /// Length of the contribution window, in seconds
    pub fn duration(&self) -> u64 {
        self.end_time - self.start_time
    }

    /// Wei credited to `address` by this sale
    pub fn contribution_of(&self, address: &Address) -> u128 {
        self.contributions.get(address).copied().unwrap_or(0)
    }

    /// Whether a contribution sent at `now` can be accepted
    pub fn accepting_contributions(&self, now: u64) -> bool {
        !(self.cap_reached
            || self.sale_closed
            || self.paused
            || now < self.start_time
            || now > self.end_time)
    }

    /// Whether `setRate(rate)` passes the bounds check
    pub fn rate_in_bounds(&self, rate: u128) -> bool {
        self.low_rate <= rate && rate <= self.high_rate
    }

    /// Token units bought by `wei` at the current rate
    pub fn tokens_for(&self, wei: u128) -> Result<u128> {
        wei.checked_mul(self.rate).ok_or_else(|| {
            FuzzError::invariant(format!("{} wei at rate {} overflows", wei, self.rate))
        })
    }

    /// Credit a purchase: wei raised, sale balance, token disbursement
    pub fn record_purchase(
        &mut self,
        ledger: &mut TokenLedger,
        to: &Address,
        wei: u128,
        tokens: u128,
    ) -> Result<()> {
        let raised = self
            .amount_raised
            .checked_add(wei)
            .ok_or_else(|| FuzzError::invariant("amountRaised overflows"))?;
        let credited = self
            .contribution_of(to)
            .checked_add(wei)
            .ok_or_else(|| FuzzError::invariant(format!("sale balance of {} overflows", to)))?;

        ledger.disburse(to, tokens)?;
        self.amount_raised = raised;
        self.contributions.insert(to.clone(), credited);
        self.refresh_thresholds()
    }

    /// Credit a payable contribution from `from`
    pub fn record_contribution(
        &mut self,
        ledger: &mut TokenLedger,
        from: &Address,
        wei: u128,
    ) -> Result<()> {
        let tokens = self.tokens_for(wei)?;
        let held = self
            .ether_balance
            .checked_add(wei)
            .ok_or_else(|| FuzzError::invariant("sale ether balance overflows"))?;

        self.record_purchase(ledger, from, wei, tokens)?;
        self.ether_balance = held;
        Ok(())
    }

    /// Forward every held wei to the beneficiary
    pub fn withdraw_to_beneficiary(&mut self) -> Result<()> {
        self.beneficiary_payouts = self
            .beneficiary_payouts
            .checked_add(self.ether_balance)
            .ok_or_else(|| FuzzError::invariant("beneficiary payouts overflow"))?;
        self.ether_balance = 0;
        Ok(())
    }

    /// Recompute goal and cap flags after a state-changing success
    pub fn refresh_thresholds(&mut self) -> Result<()> {
        let goal = self.amount_raised >= self.funding_goal;
        let cap = self.amount_raised >= self.funding_cap;

        if self.goal_reached && !goal {
            return Err(FuzzError::invariant("goalReached regressed to false"));
        }
        if self.cap_reached && !cap {
            return Err(FuzzError::invariant("capReached regressed to false"));
        }

        self.goal_reached = goal;
        self.cap_reached = cap;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::model::token::TokenParams;

    fn fresh() -> (SaleState, TokenLedger) {
        (
            SaleState::new(&Accounts::default(), &SaleParams::default()),
            TokenLedger::new(&TokenParams::default()),
        )
    }

    #[test]
    fn test_new_sale_window() {
        let (sale, _) = fresh();
        assert_eq!(sale.end_time, sale.start_time + 3_600);
        assert_eq!(sale.duration(), 3_600);
        assert_eq!(sale.funding_goal, 10 * ETHER);
        assert!(!sale.goal_reached);
        assert!(!sale.cap_reached);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let (mut sale, _) = fresh();
        assert!(!sale.accepting_contributions(sale.start_time - 1));
        assert!(sale.accepting_contributions(sale.start_time));
        assert!(sale.accepting_contributions(sale.end_time));
        assert!(!sale.accepting_contributions(sale.end_time + 1));

        sale.paused = true;
        assert!(!sale.accepting_contributions(sale.start_time));
    }

    #[test]
    fn test_contribution_is_additive() {
        let (mut sale, mut ledger) = fresh();
        let user = Address::account("user2");
        let allowance = ledger.crowdsale_allowance();

        sale.record_contribution(&mut ledger, &user, ETHER).unwrap();

        assert_eq!(sale.amount_raised, ETHER);
        assert_eq!(sale.contribution_of(&user), ETHER);
        assert_eq!(sale.ether_balance, ETHER);
        assert_eq!(ledger.balance_of(&user), ETHER * 5_000);
        assert_eq!(ledger.crowdsale_allowance(), allowance - ETHER * 5_000);
    }

    #[test]
    fn test_thresholds_use_greater_or_equal() {
        let (mut sale, mut ledger) = fresh();
        let user = Address::account("user2");

        sale.record_purchase(&mut ledger, &user, 10 * ETHER, 0).unwrap();
        assert!(sale.goal_reached);
        assert!(!sale.cap_reached);

        sale.record_purchase(&mut ledger, &user, 10 * ETHER, 0).unwrap();
        assert!(sale.cap_reached);
    }

    #[test]
    fn test_threshold_regression_is_detected() {
        let (mut sale, _) = fresh();
        sale.goal_reached = true;
        let err = sale.refresh_thresholds().unwrap_err();
        assert!(matches!(err, FuzzError::InvariantViolation(_)));
    }

    #[test]
    fn test_withdrawal_empties_sale() {
        let (mut sale, mut ledger) = fresh();
        sale.record_contribution(&mut ledger, &Address::account("user3"), ETHER / 2)
            .unwrap();
        sale.withdraw_to_beneficiary().unwrap();

        assert_eq!(sale.ether_balance, 0);
        assert_eq!(sale.beneficiary_payouts, ETHER / 2);
        // raised amount is bookkeeping, not custody
        assert_eq!(sale.amount_raised, ETHER / 2);
    }
}
