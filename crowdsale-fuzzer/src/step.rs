//! Structured generation output
//!
//! A [`Step`] is one call the generated script makes, the failure mode that
//! was injected into it, and what the script must observe afterwards. Steps
//! carry no output syntax; see [`crate::render`] for the text boundary.
//!
//! ## Example (JSON artifact form)
//!
//! ```json
//! {
//!   "index": 3,
//!   "invocation": {
//!     "caller": { "kind": "account", "name": "owner" },
//!     "call": { "operation": "setRate", "rate": "7311" }
//!   },
//!   "failure_mode": null,
//!   "outcome": {
//!     "status": "succeeds",
//!     "assertions": [
//!       { "observable": { "field": "rate" },
//!         "expect": { "check": "equals", "value": { "type": "amount", "value": "7311" } } }
//!     ]
//!   },
//!   "state": { "amount_raised": "0", "paused": false, "rate": "7311", ... }
//! }
//! ```

use crate::amount;
use crate::catalog::{FailureMode, Operation};
use crate::model::{Address, SaleParams, Snapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolved call and its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum Call {
    /// `terminate()`
    Terminate,
    /// `setRate(rate)`
    SetRate {
        /// New rate
        #[serde(with = "amount::string")]
        rate: u128,
    },
    /// `ownerAllocateTokens(to, amountWei, amountTokens)`
    AllocateTokens {
        /// Credited address
        to: Address,
        /// Wei recorded as raised
        #[serde(with = "amount::string")]
        amount_wei: u128,
        /// Token units disbursed
        #[serde(with = "amount::string")]
        amount_tokens: u128,
    },
    /// `ownerUnlockFund()`
    UnlockFunds,
    /// Payable fallback carrying `wei`
    Contribute {
        /// Value sent
        #[serde(with = "amount::string")]
        wei: u128,
    },
    /// `pause()` when `pause` is set, `unpause()` otherwise
    Pause {
        /// Direction
        pause: bool,
    },
    /// `ownerSafeWithdrawal()`
    SafeWithdrawal,
    /// `changeTime(timestamp)` on the mock sale
    SetTime {
        /// New logical time
        timestamp: u64,
    },
    /// Deploy a successor sale on the same token
    Redeploy {
        /// Constructor arguments
        params: SaleParams,
    },
}

impl Call {
    /// Catalog operation of this call
    pub fn operation(&self) -> Operation {
        match self {
            Call::Terminate => Operation::Terminate,
            Call::SetRate { .. } => Operation::SetRate,
            Call::AllocateTokens { .. } => Operation::AllocateTokens,
            Call::UnlockFunds => Operation::UnlockFunds,
            Call::Contribute { .. } => Operation::Contribute,
            Call::Pause { .. } => Operation::Pause,
            Call::SafeWithdrawal => Operation::SafeWithdrawal,
            Call::SetTime { .. } => Operation::SetTime,
            Call::Redeploy { .. } => Operation::Redeploy,
        }
    }
}

/// A call made by a given address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Transaction sender
    pub caller: Address,
    /// What is called
    pub call: Call,
    /// Time the harness moves the clock to right before the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_time: Option<u64>,
}

impl Invocation {
    /// Invocation at the current time
    pub fn new(caller: Address, call: Call) -> Self {
        Self {
            caller,
            call,
            at_time: None,
        }
    }

    /// Invocation preceded by a clock change
    pub fn at(mut self, timestamp: u64) -> Self {
        self.at_time = Some(timestamp);
        self
    }

    /// Catalog operation
    pub fn operation(&self) -> Operation {
        self.call.operation()
    }
}

/// Why a step is expected to revert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "mode", rename_all = "snake_case")]
pub enum RevertReason {
    /// The injected failure mode
    Injected(FailureMode),
    /// Contributions are closed: cap reached, closed, paused, or outside the window
    ContributionsClosed,
    /// The remaining allowance cannot cover the purchase
    AllowanceExhausted,
    /// `safeWithdrawal` before the goal is reached
    GoalNotReached,
    /// `unlockFunds` before the deadline
    DeadlineNotPassed,
    /// `pause` on a sale that is already paused
    AlreadyPaused,
    /// `unpause` on a sale that is not paused
    NotPaused,
}

impl RevertReason {
    /// Message the script reports when the call unexpectedly goes through
    pub fn message(&self, operation: Operation) -> String {
        use FailureMode::*;

        let text = match self {
            RevertReason::Injected(OnlyOwner) => match operation {
                Operation::Terminate => "only the owner can terminate the crowd sale",
                Operation::SetRate => "only the owner can set the rate",
                Operation::AllocateTokens => "only the owner can call ownerAllocateTokens",
                Operation::UnlockFunds => "only the owner can unlock funds from the crowd sale",
                Operation::Pause => "only the owner can pause or unpause the crowd sale",
                Operation::SafeWithdrawal => "only the owner can call ownerSafeWithdrawal",
                _ => "only the owner can make this call",
            },
            RevertReason::Injected(AfterDeadline) | RevertReason::DeadlineNotPassed => {
                "cannot unlock funds before the deadline"
            }
            RevertReason::Injected(BeforeDeadline) => "cannot contribute after the deadline",
            RevertReason::Injected(WhenNotPaused) => "cannot contribute while the sale is paused",
            RevertReason::Injected(SaleNotClosed) => "cannot contribute after the sale is closed",
            RevertReason::Injected(RateAbove) | RevertReason::Injected(RateBelow) => {
                "the new rate must be within the bounds"
            }
            RevertReason::Injected(ValidDestination) => match operation {
                Operation::Contribute => "the user is not allowed to purchase tokens",
                _ => "the to-address is not valid for allocating tokens",
            },
            RevertReason::Injected(ExceedAllowance) => {
                "the amount of tokens exceeds the crowdsale's allowance"
            }
            RevertReason::Injected(BelowMinContribution) => "cannot contribute below the minimum",
            RevertReason::ContributionsClosed => {
                "cannot contribute before the start or after the sale is closed, paused or finished"
            }
            RevertReason::AllowanceExhausted => "the crowdsale's allowance cannot cover the purchase",
            RevertReason::GoalNotReached => {
                "cannot call ownerSafeWithdrawal before the goal is reached"
            }
            RevertReason::AlreadyPaused => "cannot pause a sale that is already paused",
            RevertReason::NotPaused => "cannot unpause a sale that is not paused",
        };
        text.to_string()
    }
}

/// Decision of the injector for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The call goes through and the replica advances
    Succeeds,
    /// The call must revert and nothing changes
    Reverts(RevertReason),
}

impl Verdict {
    /// Whether the replica advances
    pub fn succeeds(&self) -> bool {
        matches!(self, Verdict::Succeeds)
    }
}

/// A quantity the script reads back from the contracts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "field", content = "of", rename_all = "snake_case")]
pub enum Observable {
    /// `token.balanceOf(address)`
    TokenBalance(Address),
    /// `sale.balanceOf(address)`
    SaleBalance(Address),
    /// `sale.amountRaised()`
    AmountRaised,
    /// `token.crowdSaleAllowance()`
    CrowdsaleAllowance,
    /// `sale.fundingGoalReached()`
    GoalReached,
    /// `sale.fundingCapReached()`
    CapReached,
    /// `sale.rate()`
    Rate,
    /// `sale.paused()`
    Paused,
    /// `sale.saleClosed()`
    SaleClosed,
    /// Ether balance of the sale contract
    SaleEtherBalance,
    /// Ether balance of the beneficiary
    BeneficiaryEtherBalance,
    /// `sale.currentTime()`
    CurrentTime,
}

impl Observable {
    /// Whether the script checks it against a value read right before the call
    ///
    /// Balances are relative: the live accounts may carry value the replica
    /// never saw (harness funding, earlier tests on the same deployment).
    pub fn is_relative(&self) -> bool {
        matches!(
            self,
            Observable::TokenBalance(_)
                | Observable::SaleBalance(_)
                | Observable::AmountRaised
                | Observable::CrowdsaleAllowance
                | Observable::SaleEtherBalance
                | Observable::BeneficiaryEtherBalance
        )
    }
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observable::TokenBalance(a) => write!(f, "token.balanceOf({})", a),
            Observable::SaleBalance(a) => write!(f, "sale.balanceOf({})", a),
            Observable::AmountRaised => write!(f, "sale.amountRaised()"),
            Observable::CrowdsaleAllowance => write!(f, "token.crowdSaleAllowance()"),
            Observable::GoalReached => write!(f, "sale.fundingGoalReached()"),
            Observable::CapReached => write!(f, "sale.fundingCapReached()"),
            Observable::Rate => write!(f, "sale.rate()"),
            Observable::Paused => write!(f, "sale.paused()"),
            Observable::SaleClosed => write!(f, "sale.saleClosed()"),
            Observable::SaleEtherBalance => write!(f, "eth.balance(sale.address)"),
            Observable::BeneficiaryEtherBalance => write!(f, "eth.balance(beneficiary)"),
            Observable::CurrentTime => write!(f, "sale.currentTime()"),
        }
    }
}

/// Value of an observable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Atomic amount (wei, token units, rate)
    Amount(#[serde(with = "amount::string")] u128),
    /// Boolean flag
    Flag(bool),
    /// Timestamp
    Time(u64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Amount(v) => write!(f, "{}", v),
            Value::Flag(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
        }
    }
}

/// Expected outcome of reading an observable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", content = "value", rename_all = "snake_case")]
pub enum Expectation {
    /// Absolute value
    Equals(Value),
    /// Grew by exactly this much since the pre-call read
    Increased(#[serde(with = "amount::string")] u128),
    /// Shrank by exactly this much since the pre-call read
    Decreased(#[serde(with = "amount::string")] u128),
    /// Identical to the pre-call read
    Unchanged,
}

/// One oracle check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    /// What is read
    pub observable: Observable,
    /// What it must be
    pub expect: Expectation,
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expect {
            Expectation::Equals(v) => write!(f, "{} == {}", self.observable, v),
            Expectation::Increased(d) => write!(f, "{} == before + {}", self.observable, d),
            Expectation::Decreased(d) => write!(f, "{} == before - {}", self.observable, d),
            Expectation::Unchanged => write!(f, "{} == before", self.observable),
        }
    }
}

/// What the script checks after the call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The call succeeds and every assertion holds
    Succeeds {
        /// Post-call checks
        assertions: Vec<Assertion>,
    },
    /// The call reverts and every assertion shows no effect
    Reverts {
        /// Why it reverts
        reason: RevertReason,
        /// Message reported if it does not revert
        message: String,
        /// Post-call checks
        assertions: Vec<Assertion>,
    },
}

impl Outcome {
    /// Assertions of either variant
    pub fn assertions(&self) -> &[Assertion] {
        match self {
            Outcome::Succeeds { assertions } | Outcome::Reverts { assertions, .. } => assertions,
        }
    }

    /// Whether the call is expected to revert
    pub fn reverts(&self) -> bool {
        matches!(self, Outcome::Reverts { .. })
    }
}

/// Sale getters as they read after a step
///
/// Not asserted; rendered on request to compare predicted and observed
/// state when a generated script fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReport {
    /// `sale.amountRaised()`
    #[serde(with = "amount::string")]
    pub amount_raised: u128,
    /// `sale.paused()`
    pub paused: bool,
    /// `sale.saleClosed()`
    pub sale_closed: bool,
    /// `sale.fundingGoalReached()`
    pub goal_reached: bool,
    /// `sale.fundingCapReached()`
    pub cap_reached: bool,
    /// `sale.rate()`
    #[serde(with = "amount::string")]
    pub rate: u128,
    /// `sale.startTime()`
    pub start_time: u64,
    /// `sale.currentTime()`
    pub current_time: u64,
    /// `sale.endTime()`
    pub end_time: u64,
}

impl StateReport {
    /// Report of the sale in `snapshot`
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let sale = &snapshot.sale;
        Self {
            amount_raised: sale.amount_raised,
            paused: sale.paused,
            sale_closed: sale.sale_closed,
            goal_reached: sale.goal_reached,
            cap_reached: sale.cap_reached,
            rate: sale.rate,
            start_time: sale.start_time,
            current_time: snapshot.now,
            end_time: sale.end_time,
        }
    }

    /// Current time inside the contribution window
    pub fn ongoing(&self) -> bool {
        self.start_time <= self.current_time && self.current_time <= self.end_time
    }
}

/// One generated test step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Position in the sequence
    pub index: usize,
    /// The call
    pub invocation: Invocation,
    /// Injected failure mode, `None` on the success path
    pub failure_mode: Option<FailureMode>,
    /// Expected outcome
    pub outcome: Outcome,
    /// Sale state after the step
    #[serde(default)]
    pub state: StateReport,
}

impl Step {
    /// Catalog operation of the step
    pub fn operation(&self) -> Operation {
        self.invocation.operation()
    }
}
