//! Operation and failure-mode catalog
//!
//! Static registry of every sale operation the generator can emit, with the
//! modifiers guarding it and the argument-domain failures it must reject.
//! A failure mode is injectable for an operation when it is one of its
//! required modifiers or extra failure modes; `None` (the success path) is
//! always injectable.
//!
//! | Operation        | Required modifiers                               | Extra failure modes                         |
//! |------------------|--------------------------------------------------|---------------------------------------------|
//! | `terminate`      | onlyOwner                                        |                                             |
//! | `setRate`        | onlyOwner                                        | rateAbove, rateBelow                        |
//! | `allocateTokens` | onlyOwner, validDestination                      | exceedAllowance                             |
//! | `unlockFunds`    | onlyOwner, afterDeadline                         |                                             |
//! | `contribute`     | whenNotPaused, beforeDeadline, saleNotClosed     | belowMinContribution, validDestination      |
//! | `pause`          | onlyOwner                                        |                                             |
//! | `safeWithdrawal` | onlyOwner                                        |                                             |
//! | `setTime`        |                                                  |                                             |
//! | `redeploy`       | explicit step only                               |                                             |

use crate::error::{FuzzError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Operations of the sale contract, plus the harness-level `setTime` and `redeploy`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Close the sale early
    Terminate,
    /// Change the exchange rate within its bounds
    SetRate,
    /// Credit tokens for an off-chain purchase
    AllocateTokens,
    /// Close the sale after the deadline so contributors can settle
    UnlockFunds,
    /// Payable fallback: buy tokens with ether
    #[strum(to_string = "contribute", serialize = "fallback")]
    Contribute,
    /// Pause or unpause contributions
    Pause,
    /// Forward raised ether to the beneficiary
    SafeWithdrawal,
    /// Move the mock contract clock
    SetTime,
    /// Deploy a successor sale on the same token
    Redeploy,
}

/// Named precondition or argument-domain violation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum FailureMode {
    /// Caller is not the owner
    OnlyOwner,
    /// Called before the deadline passed
    AfterDeadline,
    /// Called after the deadline
    BeforeDeadline,
    /// Called while the sale is paused
    WhenNotPaused,
    /// Called after the sale closed
    SaleNotClosed,
    /// Rate above the upper bound
    RateAbove,
    /// Rate below the lower bound
    RateBelow,
    /// Destination or sender is a disallowed address
    ValidDestination,
    /// Allocation larger than the remaining allowance
    ExceedAllowance,
    /// Contribution under the minimum
    BelowMinContribution,
}

/// Catalog entry for one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
    /// The operation
    pub operation: Operation,
    /// Modifiers guarding the entry point, in declaration order
    pub required_modifiers: Vec<FailureMode>,
    /// Argument-domain failures
    pub extra_failure_modes: Vec<FailureMode>,
    /// Whether the generator may draw it; explicit-only operations are not
    pub drawable: bool,
}

impl OperationSpec {
    fn new(operation: Operation, required: &[FailureMode], extra: &[FailureMode]) -> Self {
        Self {
            operation,
            required_modifiers: required.to_vec(),
            extra_failure_modes: extra.to_vec(),
            drawable: true,
        }
    }

    fn explicit_only(mut self) -> Self {
        self.drawable = false;
        self
    }

    /// Injectable modes: modifiers, then extras, then `None`
    ///
    /// A mode listed both as modifier and extra appears once.
    pub fn failure_modes(&self) -> Vec<Option<FailureMode>> {
        let mut modes: Vec<Option<FailureMode>> = Vec::new();
        for mode in self
            .required_modifiers
            .iter()
            .chain(self.extra_failure_modes.iter())
        {
            if !modes.contains(&Some(*mode)) {
                modes.push(Some(*mode));
            }
        }
        modes.push(None);
        modes
    }

    /// Whether `mode` may be injected into this operation
    pub fn supports(&self, mode: FailureMode) -> bool {
        self.required_modifiers.contains(&mode) || self.extra_failure_modes.contains(&mode)
    }
}

/// Registry of operation specs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationCatalog {
    specs: Vec<OperationSpec>,
}

impl Default for OperationCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl OperationCatalog {
    /// The full sale catalog
    pub fn standard() -> Self {
        use FailureMode::*;

        Self {
            specs: vec![
                OperationSpec::new(Operation::Terminate, &[OnlyOwner], &[]),
                OperationSpec::new(Operation::SetRate, &[OnlyOwner], &[RateAbove, RateBelow]),
                OperationSpec::new(
                    Operation::AllocateTokens,
                    &[OnlyOwner, ValidDestination],
                    &[ExceedAllowance],
                ),
                OperationSpec::new(Operation::UnlockFunds, &[OnlyOwner, AfterDeadline], &[]),
                OperationSpec::new(
                    Operation::Contribute,
                    &[WhenNotPaused, BeforeDeadline, SaleNotClosed],
                    &[BelowMinContribution, ValidDestination],
                ),
                OperationSpec::new(Operation::Pause, &[OnlyOwner], &[]),
                OperationSpec::new(Operation::SafeWithdrawal, &[OnlyOwner], &[]),
                OperationSpec::new(Operation::SetTime, &[], &[]),
                OperationSpec::new(Operation::Redeploy, &[], &[]).explicit_only(),
            ],
        }
    }

    /// Every spec, in catalog order
    pub fn list(&self) -> &[OperationSpec] {
        &self.specs
    }

    /// Spec of `operation`, if present
    pub fn spec(&self, operation: Operation) -> Option<&OperationSpec> {
        self.specs.iter().find(|s| s.operation == operation)
    }

    /// Injectable modes of `operation`; empty when it is not in the catalog
    pub fn failure_modes(&self, operation: Operation) -> Vec<Option<FailureMode>> {
        self.spec(operation)
            .map(OperationSpec::failure_modes)
            .unwrap_or_default()
    }

    /// Specs the generator may draw from
    pub fn drawable(&self) -> Vec<&OperationSpec> {
        self.specs.iter().filter(|s| s.drawable).collect()
    }

    /// Sub-catalog restricted to `operations`, catalog order kept
    ///
    /// The result may be empty; callers check before drawing.
    pub fn filtered(&self, operations: &[Operation]) -> Self {
        Self {
            specs: self
                .specs
                .iter()
                .filter(|s| operations.contains(&s.operation))
                .cloned()
                .collect(),
        }
    }

    /// Whether nothing can be drawn
    pub fn is_empty(&self) -> bool {
        self.drawable().is_empty()
    }
}

/// Parse operation names as written on the command line or in config
pub fn parse_operations<S: AsRef<str>>(names: &[S]) -> Result<Vec<Operation>> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            Operation::from_str(name.trim())
                .map_err(|_| FuzzError::UnknownOperation(name.to_string()))
        })
        .collect()
}

/// Every operation, in declaration order
pub fn all_operations() -> Vec<Operation> {
    Operation::iter().collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_standard_catalog_covers_every_operation() {
        let catalog = OperationCatalog::standard();
        for op in all_operations() {
            assert!(catalog.spec(op).is_some(), "{} missing from catalog", op);
        }
        assert_eq!(catalog.drawable().len(), all_operations().len() - 1);
        assert!(!catalog.spec(Operation::Redeploy).unwrap().drawable);
    }

    #[test]
    fn test_failure_modes_always_include_success_path() {
        let catalog = OperationCatalog::standard();
        for spec in catalog.list() {
            assert_eq!(spec.failure_modes().last(), Some(&None));
        }
    }

    #[test]
    fn test_contribute_modes() {
        let catalog = OperationCatalog::standard();
        let modes = catalog.failure_modes(Operation::Contribute);
        assert_eq!(
            modes,
            vec![
                Some(FailureMode::WhenNotPaused),
                Some(FailureMode::BeforeDeadline),
                Some(FailureMode::SaleNotClosed),
                Some(FailureMode::BelowMinContribution),
                Some(FailureMode::ValidDestination),
                None,
            ]
        );
    }

    #[test]
    fn test_set_rate_modes() {
        let catalog = OperationCatalog::standard();
        let spec = catalog.spec(Operation::SetRate).unwrap();
        assert!(spec.supports(FailureMode::RateAbove));
        assert!(spec.supports(FailureMode::RateBelow));
        assert!(!spec.supports(FailureMode::ExceedAllowance));
        assert_eq!(spec.failure_modes().len(), 4);
    }

    #[test]
    fn test_filter_is_pure_selection() {
        let catalog = OperationCatalog::standard();
        let only_rate = catalog.filtered(&[Operation::SetRate]);
        assert_eq!(only_rate.list().len(), 1);
        assert!(!only_rate.is_empty());

        let nothing = catalog.filtered(&[]);
        assert!(nothing.list().is_empty());
        assert!(nothing.is_empty());

        // explicit-only operations cannot be drawn
        assert!(catalog.filtered(&[Operation::Redeploy]).is_empty());

        // source catalog untouched
        assert_eq!(catalog, OperationCatalog::standard());
    }

    #[test]
    fn test_names_round_trip() {
        assert_eq!(Operation::SetRate.to_string(), "setRate");
        assert_eq!(Operation::Contribute.to_string(), "contribute");
        assert_eq!(FailureMode::BelowMinContribution.to_string(), "belowMinContribution");

        let parsed = parse_operations(&["setRate", "fallback", "safeWithdrawal"]).unwrap();
        assert_eq!(
            parsed,
            vec![
                Operation::SetRate,
                Operation::Contribute,
                Operation::SafeWithdrawal
            ]
        );
    }

    #[test]
    fn test_unknown_operation_name() {
        let err = parse_operations(&["mint"]).unwrap_err();
        assert!(matches!(err, FuzzError::UnknownOperation(name) if name == "mint"));
    }
}
