//! Failure injection and parameter synthesis
//!
//! Given an operation and a failure mode (or `None` for the success path),
//! draws concrete arguments that violate exactly that mode and keep every
//! other argument legal, then decides whether the call goes through.
//!
//! A mode whose domain is empty for the current configuration or replica
//! state (no non-owner account, `lowRate == 0` for `rateBelow`, a sale that is
//! not paused for `whenNotPaused`, ...) yields `Ok(None)` and the generator
//! redraws. Requesting a mode the operation does not declare is an error.
//!
//! Deadline convention: `beforeDeadline` holds while `now <= endTime`,
//! `afterDeadline` once `now > endTime`; contributions are accepted for
//! `startTime <= now <= endTime`.

use crate::amount::{BILLION, ETHER};
use crate::catalog::{FailureMode, Operation, OperationCatalog};
use crate::error::{FuzzError, Result};
use crate::model::{Accounts, Address, SaleState, TokenLedger};
use crate::orchestrator::FuzzEnv;
use crate::step::{Call, Invocation, RevertReason, Verdict};

/// Invocation plus the injector's decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesized {
    /// Call to emit
    pub invocation: Invocation,
    /// Whether it goes through
    pub verdict: Verdict,
}

/// Synthesizes constraint-satisfying invocations
///
/// Pure apart from RNG consumption: the replica is only read.
#[derive(Debug, Clone)]
pub struct FailureInjector {
    accounts: Accounts,
    catalog: OperationCatalog,
}

impl FailureInjector {
    /// Injector over the configured accounts and the full catalog
    pub fn new(accounts: Accounts) -> Self {
        Self {
            accounts,
            catalog: OperationCatalog::standard(),
        }
    }

    /// Accounts the injector draws callers from
    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// Synthesize `operation` under `mode`
    ///
    /// Returns `Ok(None)` when the mode cannot be expressed right now.
    pub fn synthesize(
        &self,
        operation: Operation,
        mode: Option<FailureMode>,
        sale: &SaleState,
        ledger: &TokenLedger,
        env: &mut FuzzEnv,
    ) -> Result<Option<Synthesized>> {
        if let Some(mode) = mode {
            let supported = self
                .catalog
                .spec(operation)
                .is_some_and(|spec| spec.supports(mode));
            if !supported {
                return Err(FuzzError::UnsupportedFailureMode { operation, mode });
            }
        }

        match operation {
            Operation::Terminate => Ok(self.owner_only(mode, env, Call::Terminate)),
            Operation::SetRate => Ok(self.set_rate(mode, sale, env)),
            Operation::AllocateTokens => Ok(self.allocate_tokens(mode, sale, ledger, env)),
            Operation::UnlockFunds => Ok(self.unlock_funds(mode, sale, env)),
            Operation::Contribute => self.contribute(mode, sale, ledger, env),
            Operation::Pause => Ok(self.pause(mode, sale, env)),
            Operation::SafeWithdrawal => Ok(self.safe_withdrawal(mode, sale, env)),
            Operation::SetTime => Ok(Some(self.set_time(sale, env))),
            Operation::Redeploy => Err(FuzzError::InvalidStep(
                "redeploy needs explicit sale parameters".to_string(),
            )),
        }
    }

    /// Owner, or a random non-owner when `onlyOwner` is injected
    fn pick_caller(&self, mode: Option<FailureMode>, env: &mut FuzzEnv) -> Option<Address> {
        if mode == Some(FailureMode::OnlyOwner) {
            let intruders = self.accounts.non_owner_users();
            env.rng.choose(&intruders).cloned()
        } else {
            Some(self.accounts.owner())
        }
    }

    fn owner_only(
        &self,
        mode: Option<FailureMode>,
        env: &mut FuzzEnv,
        call: Call,
    ) -> Option<Synthesized> {
        let caller = self.pick_caller(mode, env)?;
        Some(Synthesized {
            invocation: Invocation::new(caller, call),
            verdict: injected_or(mode, Verdict::Succeeds),
        })
    }

    fn pause(
        &self,
        mode: Option<FailureMode>,
        sale: &SaleState,
        env: &mut FuzzEnv,
    ) -> Option<Synthesized> {
        let pause: bool = env.rng.gen();
        let caller = self.pick_caller(mode, env)?;
        // pause is whenNotPaused, unpause is whenPaused
        let verdict = match (pause, sale.paused) {
            (true, true) => Verdict::Reverts(RevertReason::AlreadyPaused),
            (false, false) => Verdict::Reverts(RevertReason::NotPaused),
            _ => Verdict::Succeeds,
        };

        Some(Synthesized {
            invocation: Invocation::new(caller, Call::Pause { pause }),
            verdict: injected_or(mode, verdict),
        })
    }

    fn set_rate(
        &self,
        mode: Option<FailureMode>,
        sale: &SaleState,
        env: &mut FuzzEnv,
    ) -> Option<Synthesized> {
        let caller = self.pick_caller(mode, env)?;
        let rate = match mode {
            Some(FailureMode::RateAbove) => {
                if sale.high_rate >= BILLION {
                    return None;
                }
                env.rng.gen_range(sale.high_rate + 1..=BILLION)
            }
            Some(FailureMode::RateBelow) => {
                if sale.low_rate == 0 {
                    return None;
                }
                env.rng.gen_range(0..sale.low_rate)
            }
            _ => {
                if sale.low_rate > sale.high_rate {
                    return None;
                }
                env.rng.gen_range(sale.low_rate..=sale.high_rate)
            }
        };

        Some(Synthesized {
            invocation: Invocation::new(caller, Call::SetRate { rate }),
            verdict: injected_or(mode, Verdict::Succeeds),
        })
    }

    fn allocate_tokens(
        &self,
        mode: Option<FailureMode>,
        sale: &SaleState,
        ledger: &TokenLedger,
        env: &mut FuzzEnv,
    ) -> Option<Synthesized> {
        let caller = self.pick_caller(mode, env)?;
        let destinations = if mode == Some(FailureMode::ValidDestination) {
            self.accounts.disallowed_destinations()
        } else {
            self.accounts.valid_destinations()
        };
        let to = env.rng.choose(&destinations).cloned()?;

        let allowance = ledger.crowdsale_allowance();
        let amount_tokens = if mode == Some(FailureMode::ExceedAllowance) {
            allowance.checked_add(env.rng.gen_range(1..=BILLION))?
        } else {
            env.rng.gen_range(0..=allowance)
        };
        let amount_wei = env.rng.gen_range(0..=sale.funding_cap);

        Some(Synthesized {
            invocation: Invocation::new(
                caller,
                Call::AllocateTokens {
                    to,
                    amount_wei,
                    amount_tokens,
                },
            ),
            verdict: injected_or(mode, Verdict::Succeeds),
        })
    }

    fn unlock_funds(
        &self,
        mode: Option<FailureMode>,
        sale: &SaleState,
        env: &mut FuzzEnv,
    ) -> Option<Synthesized> {
        let caller = self.pick_caller(mode, env)?;
        let mut invocation = Invocation::new(caller, Call::UnlockFunds);

        if mode == Some(FailureMode::AfterDeadline) {
            let earliest = sale.start_time.saturating_sub(sale.duration());
            invocation = invocation.at(env.rng.gen_range(earliest..=sale.end_time));
        }

        let verdict = match mode {
            Some(mode) => Verdict::Reverts(RevertReason::Injected(mode)),
            None if env.clock.now() <= sale.end_time => {
                Verdict::Reverts(RevertReason::DeadlineNotPassed)
            }
            None => Verdict::Succeeds,
        };

        Some(Synthesized {
            invocation,
            verdict,
        })
    }

    fn contribute(
        &self,
        mode: Option<FailureMode>,
        sale: &SaleState,
        ledger: &TokenLedger,
        env: &mut FuzzEnv,
    ) -> Result<Option<Synthesized>> {
        // only reachable from a replica that already violates the modifier
        match mode {
            Some(FailureMode::WhenNotPaused) if !sale.paused => return Ok(None),
            Some(FailureMode::SaleNotClosed) if !sale.sale_closed => return Ok(None),
            _ => {}
        }

        let senders: Vec<Address> = if mode == Some(FailureMode::ValidDestination) {
            self.accounts
                .disallowed_destinations()
                .into_iter()
                .filter(Address::can_sign)
                .collect()
        } else {
            self.accounts.basic_users()
        };
        let Some(sender) = env.rng.choose(&senders).cloned() else {
            return Ok(None);
        };

        let wei = if mode == Some(FailureMode::BelowMinContribution) {
            if sale.min_contribution == 0 {
                return Ok(None);
            }
            env.rng.gen_range(0..sale.min_contribution)
        } else {
            if sale.min_contribution > ETHER {
                return Ok(None);
            }
            env.rng.gen_range(sale.min_contribution..=ETHER)
        };

        let mut invocation = Invocation::new(sender, Call::Contribute { wei });
        if mode == Some(FailureMode::BeforeDeadline) {
            let (Some(first), Some(last)) = (
                sale.end_time.checked_add(1),
                sale.end_time.checked_add(sale.duration()),
            ) else {
                return Ok(None);
            };
            if first > last {
                return Ok(None);
            }
            invocation = invocation.at(env.rng.gen_range(first..=last));
        }

        let verdict = match mode {
            Some(mode) => Verdict::Reverts(RevertReason::Injected(mode)),
            None if !sale.accepting_contributions(env.clock.now()) => {
                Verdict::Reverts(RevertReason::ContributionsClosed)
            }
            None if sale.tokens_for(wei)? > ledger.crowdsale_allowance() => {
                Verdict::Reverts(RevertReason::AllowanceExhausted)
            }
            None => Verdict::Succeeds,
        };

        Ok(Some(Synthesized {
            invocation,
            verdict,
        }))
    }

    fn safe_withdrawal(
        &self,
        mode: Option<FailureMode>,
        sale: &SaleState,
        env: &mut FuzzEnv,
    ) -> Option<Synthesized> {
        let caller = self.pick_caller(mode, env)?;
        let verdict = if sale.goal_reached {
            Verdict::Succeeds
        } else {
            Verdict::Reverts(RevertReason::GoalNotReached)
        };

        Some(Synthesized {
            invocation: Invocation::new(caller, Call::SafeWithdrawal),
            verdict: injected_or(mode, verdict),
        })
    }

    fn set_time(&self, sale: &SaleState, env: &mut FuzzEnv) -> Synthesized {
        let earliest = sale.start_time.saturating_sub(sale.duration());
        let latest = sale.end_time.saturating_add(sale.duration());
        let timestamp = env.rng.gen_range(earliest..=latest);

        Synthesized {
            invocation: Invocation::new(self.accounts.owner(), Call::SetTime { timestamp }),
            verdict: Verdict::Succeeds,
        }
    }
}

fn injected_or(mode: Option<FailureMode>, otherwise: Verdict) -> Verdict {
    match mode {
        Some(mode) => Verdict::Reverts(RevertReason::Injected(mode)),
        None => otherwise,
    }
}
