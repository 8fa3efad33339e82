// File: crowdsale-fuzzer/src/model/mod.rs
//
// Replica of the contracts under test

/// Addresses and account roles
pub mod address;
/// Sale contract replica
pub mod sale;
/// Token ledger replica
pub mod token;

pub use address::{Accounts, Address};
pub use sale::{SaleParams, SaleState};
pub use token::{TokenLedger, TokenParams};

/// Full replica state at one point of a run
///
/// Taken before and after every step; the oracle only ever compares two
/// snapshots, never the live replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Sale contract state
    pub sale: SaleState,
    /// Token ledger state
    pub ledger: TokenLedger,
    /// Logical time
    pub now: u64,
}

impl Snapshot {
    /// Capture the current replica
    pub fn capture(sale: &SaleState, ledger: &TokenLedger, now: u64) -> Self {
        Self {
            sale: sale.clone(),
            ledger: ledger.clone(),
            now,
        }
    }
}
