// File: crowdsale-fuzzer/src/model/token.rs
//
// Token ledger replica
//
// Tracks only what the sale can observe or change: the supply split, the
// allowance granted to the sale, and the token balance of every credited
// address. The ledger outlives sale redeploys.

use super::address::Address;
use crate::amount::{self, ETHER};
use crate::error::{FuzzError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Initial token configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenParams {
    /// Total supply, in mini-token units
    #[serde(with = "amount::string")]
    pub total_supply: u128,
    /// Amount the sale may disburse on the token owner's behalf
    #[serde(with = "amount::string")]
    pub crowdsale_allowance: u128,
    /// Amount reserved for the token admin
    #[serde(with = "amount::string")]
    pub admin_allowance: u128,
}

impl Default for TokenParams {
    fn default() -> Self {
        Self {
            total_supply: 1_000_000_000 * ETHER,
            crowdsale_allowance: 650_000_000 * ETHER,
            admin_allowance: 350_000_000 * ETHER,
        }
    }
}

/// Replica of the token contract state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLedger {
    total_supply: u128,
    crowdsale_allowance: u128,
    admin_allowance: u128,
    balances: BTreeMap<Address, u128>,
}

impl TokenLedger {
    /// Fresh ledger, nothing disbursed yet
    pub fn new(params: &TokenParams) -> Self {
        Self {
            total_supply: params.total_supply,
            crowdsale_allowance: params.crowdsale_allowance,
            admin_allowance: params.admin_allowance,
            balances: BTreeMap::new(),
        }
    }

    /// Total token supply
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Remaining allowance of the sale contract
    pub fn crowdsale_allowance(&self) -> u128 {
        self.crowdsale_allowance
    }

    /// Allowance reserved for the token admin
    pub fn admin_allowance(&self) -> u128 {
        self.admin_allowance
    }

    /// Token balance of `address`, 0 when never credited
    pub fn balance_of(&self, address: &Address) -> u128 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Sum of every credited balance
    pub fn total_disbursed(&self) -> u128 {
        self.balances.values().sum()
    }

    /// Move `amount` out of the sale allowance into `to`'s balance
    ///
    /// Callers check the allowance before deciding a step succeeds, so an
    /// underflow here means the replica itself is broken.
    pub fn disburse(&mut self, to: &Address, amount: u128) -> Result<()> {
        let remaining = self.crowdsale_allowance.checked_sub(amount).ok_or_else(|| {
            FuzzError::invariant(format!(
                "crowdsale allowance would go negative: {} - {}",
                self.crowdsale_allowance, amount
            ))
        })?;
        let balance = self.balance_of(to).checked_add(amount).ok_or_else(|| {
            FuzzError::invariant(format!("token balance of {} overflows", to))
        })?;

        self.crowdsale_allowance = remaining;
        self.balances.insert(to.clone(), balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_default_supply_split() {
        let params = TokenParams::default();
        assert_eq!(
            params.crowdsale_allowance + params.admin_allowance,
            params.total_supply
        );
    }

    #[test]
    fn test_disburse_moves_allowance_to_balance() {
        let mut ledger = TokenLedger::new(&TokenParams::default());
        let user = Address::account("user2");
        let before = ledger.crowdsale_allowance();

        ledger.disburse(&user, 5_000 * ETHER).unwrap();
        ledger.disburse(&user, 1).unwrap();

        assert_eq!(ledger.balance_of(&user), 5_000 * ETHER + 1);
        assert_eq!(ledger.crowdsale_allowance(), before - 5_000 * ETHER - 1);
        assert_eq!(ledger.total_disbursed(), 5_000 * ETHER + 1);
    }

    #[test]
    fn test_disburse_past_allowance_is_invariant_violation() {
        let mut ledger = TokenLedger::new(&TokenParams {
            total_supply: 100,
            crowdsale_allowance: 10,
            admin_allowance: 90,
        });
        let user = Address::account("user3");

        let err = ledger.disburse(&user, 11).unwrap_err();
        assert!(matches!(err, FuzzError::InvariantViolation(_)));

        // untouched on failure
        assert_eq!(ledger.crowdsale_allowance(), 10);
        assert_eq!(ledger.balance_of(&user), 0);
    }
}
