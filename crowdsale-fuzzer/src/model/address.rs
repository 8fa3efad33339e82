// File: crowdsale-fuzzer/src/model/address.rs
//
// Addresses and the configured account roster

use serde::{Deserialize, Serialize};
use std::fmt;

/// An address the generated script can name
///
/// Externally-owned accounts are referenced by their harness variable name.
/// The remaining variants are addresses the harness resolves at run time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Address {
    /// Named externally-owned account (`owner`, `user2`, ...)
    Account(String),
    /// The sale contract itself
    SaleContract,
    /// The token contract
    TokenContract,
    /// Owner of the token contract
    TokenOwner,
    /// The zero address
    Zero,
}

impl Address {
    /// Account address by name
    pub fn account(name: impl Into<String>) -> Self {
        Address::Account(name.into())
    }

    /// Whether the address can sign a transaction
    pub fn can_sign(&self) -> bool {
        matches!(self, Address::Account(_) | Address::TokenOwner)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Account(name) => write!(f, "{}", name),
            Address::SaleContract => write!(f, "sale.address"),
            Address::TokenContract => write!(f, "token.address"),
            Address::TokenOwner => write!(f, "token.owner()"),
            Address::Zero => write!(f, "0x0"),
        }
    }
}

/// Accounts available to the harness and their roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Accounts {
    /// Every funded account, in harness order
    pub users: Vec<String>,
    /// Sale owner, the only caller allowed to run admin operations
    pub owner: String,
    /// Receiver of the raised funds
    pub beneficiary: String,
    /// Token admin, never a valid allocation target
    pub token_admin: String,
}

impl Default for Accounts {
    fn default() -> Self {
        Self {
            users: ["owner", "beneficiary", "admin", "user2", "user3"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            owner: "owner".to_string(),
            beneficiary: "beneficiary".to_string(),
            token_admin: "admin".to_string(),
        }
    }
}

impl Accounts {
    /// Owner address
    pub fn owner(&self) -> Address {
        Address::account(&self.owner)
    }

    /// Beneficiary address
    pub fn beneficiary(&self) -> Address {
        Address::account(&self.beneficiary)
    }

    /// Token admin address
    pub fn token_admin(&self) -> Address {
        Address::account(&self.token_admin)
    }

    /// Every account except the owner
    pub fn non_owner_users(&self) -> Vec<Address> {
        self.users
            .iter()
            .filter(|u| **u != self.owner)
            .map(Address::account)
            .collect()
    }

    /// Accounts with no role, the ones that contribute
    pub fn basic_users(&self) -> Vec<Address> {
        self.users
            .iter()
            .filter(|u| **u != self.owner && **u != self.beneficiary && **u != self.token_admin)
            .map(Address::account)
            .collect()
    }

    /// Legal recipients of an owner allocation
    pub fn valid_destinations(&self) -> Vec<Address> {
        self.users
            .iter()
            .filter(|u| **u != self.owner && **u != self.token_admin)
            .map(Address::account)
            .collect()
    }

    /// Addresses the sale refuses to credit
    pub fn disallowed_destinations(&self) -> Vec<Address> {
        vec![
            Address::SaleContract,
            Address::Zero,
            Address::TokenOwner,
            self.token_admin(),
            Address::TokenContract,
        ]
    }
}
