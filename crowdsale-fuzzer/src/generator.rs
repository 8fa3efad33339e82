//! Randomized sequence generator
//!
//! Owns the replica (sale + token ledger) and the deterministic environment
//! for one run. Each step:
//! 1. draws an operation uniformly from the drawable catalog
//! 2. draws a failure mode uniformly from its injectable modes (`None` included)
//! 3. synthesizes parameters; an empty domain means redraw
//! 4. applies the state update when the call succeeds
//! 5. checks the replica invariants on the pre/post snapshots
//! 6. renders the oracle assertions
//!
//! Any error aborts the run and is reported with the seed and step index.

use crate::catalog::{parse_operations, FailureMode, Operation, OperationCatalog};
use crate::config::{validate_config, FuzzConfig, RedeploySchedule};
use crate::error::{FuzzError, Result};
use crate::injector::FailureInjector;
use crate::invariants::{check_no_effect, check_transition, Lifetime};
use crate::model::{SaleParams, SaleState, Snapshot, TokenLedger};
use crate::oracle::OracleRenderer;
use crate::orchestrator::{rng::resolve_seed, FuzzEnv};
use crate::step::{Call, Invocation, StateReport, Step, Verdict};
use log::{debug, info, trace, warn};

/// Generates oracle-checked step sequences
///
/// # Examples
///
/// ```rust
/// use crowdsale_fuzzer::config::FuzzConfig;
/// use crowdsale_fuzzer::generator::SequenceGenerator;
/// use crowdsale_fuzzer::orchestrator::FuzzEnv;
///
/// let config = FuzzConfig::default();
/// let env = FuzzEnv::with_seed(0x1234, config.sale.start_time);
/// let mut generator = SequenceGenerator::new(&config, env).unwrap();
///
/// let steps = generator.generate(10).unwrap();
/// assert_eq!(steps.len(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    catalog: OperationCatalog,
    injector: FailureInjector,
    oracle: OracleRenderer,
    env: FuzzEnv,
    sale: SaleState,
    ledger: TokenLedger,
    history: Vec<Step>,
    max_redraws: usize,
    redeploy: Option<RedeploySchedule>,
}

impl SequenceGenerator {
    /// Generator over `config`, drawing from `env`
    ///
    /// Fails on configurations `validate_config` rejects.
    pub fn new(config: &FuzzConfig, env: FuzzEnv) -> Result<Self> {
        let only = parse_operations(&config.run.only)?;
        validate_config(config).map_err(|e| FuzzError::InvalidConfig(format!("{:#}", e)))?;
        let catalog = if only.is_empty() {
            OperationCatalog::standard()
        } else {
            OperationCatalog::standard().filtered(&only)
        };

        Ok(Self {
            catalog,
            injector: FailureInjector::new(config.accounts.clone()),
            oracle: OracleRenderer::new(),
            env,
            sale: SaleState::new(&config.accounts, &config.sale),
            ledger: TokenLedger::new(&config.token),
            history: Vec::new(),
            max_redraws: config.run.max_redraws.max(1),
            redeploy: config.run.redeploy.clone(),
        })
    }

    /// Generator seeded from the config, `CROWDSALE_FUZZ_SEED`, or randomly
    pub fn from_config(config: &FuzzConfig) -> Result<Self> {
        let seed = resolve_seed(config.run.seed);
        Self::new(config, FuzzEnv::with_seed(seed, config.sale.start_time))
    }

    /// Seed of the run
    pub fn seed(&self) -> u64 {
        self.env.seed()
    }

    /// Current logical time
    pub fn now(&self) -> u64 {
        self.env.clock.now()
    }

    /// Sale replica
    pub fn sale(&self) -> &SaleState {
        &self.sale
    }

    /// Token ledger replica
    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    /// Catalog the generator draws from
    pub fn catalog(&self) -> &OperationCatalog {
        &self.catalog
    }

    /// Every step emitted so far, including explicit ones
    pub fn history(&self) -> &[Step] {
        &self.history
    }

    /// Emit exactly `count` steps
    ///
    /// A scheduled redeploy counts as one of them.
    pub fn generate(&mut self, count: usize) -> Result<Vec<Step>> {
        if self.catalog.is_empty() {
            return Err(FuzzError::EmptyCatalog.abort(self.seed(), self.history.len()));
        }

        info!(
            "Generating {} steps (seed 0x{:016x}, {} operations)",
            count,
            self.seed(),
            self.catalog.drawable().len()
        );

        if let Some(schedule) = &self.redeploy {
            if schedule.after_steps >= self.history.len() + count {
                warn!(
                    "Redeploy scheduled after {} steps is not reached by this call ({} emitted, {} requested)",
                    schedule.after_steps,
                    self.history.len(),
                    count
                );
            }
        }

        let mut steps = Vec::with_capacity(count);
        while steps.len() < count {
            let step = match self.take_due_redeploy() {
                Some(params) => self.redeploy(params)?,
                None => self.next_step()?,
            };
            steps.push(step);
        }

        let reverts = steps.iter().filter(|s| s.outcome.reverts()).count();
        info!(
            "Generated {} steps: {} succeed, {} revert",
            steps.len(),
            steps.len() - reverts,
            reverts
        );

        Ok(steps)
    }

    /// Draw and emit one random step
    pub fn next_step(&mut self) -> Result<Step> {
        let (seed, index) = (self.seed(), self.history.len());
        self.draw_step().map_err(|e| e.abort(seed, index))
    }

    /// Emit `operation` under `mode`, bypassing the draw
    ///
    /// Returns `Ok(None)` when the mode cannot be synthesized from the
    /// current replica.
    pub fn forced_step(
        &mut self,
        operation: Operation,
        mode: Option<FailureMode>,
    ) -> Result<Option<Step>> {
        let (seed, index) = (self.seed(), self.history.len());
        let synthesized = self
            .injector
            .synthesize(operation, mode, &self.sale, &self.ledger, &mut self.env)
            .map_err(|e| e.abort(seed, index))?;

        match synthesized {
            Some(s) => self
                .execute(s.invocation, mode, s.verdict)
                .map(Some)
                .map_err(|e| e.abort(seed, index)),
            None => Ok(None),
        }
    }

    /// Deploy a successor sale; the token ledger carries over
    pub fn redeploy(&mut self, params: SaleParams) -> Result<Step> {
        let (seed, index) = (self.seed(), self.history.len());
        info!(
            "Redeploying sale at step {} (rate {}, window {}+{}m)",
            index, params.rate, params.start_time, params.duration_minutes
        );

        let invocation = Invocation::new(
            self.injector.accounts().owner(),
            Call::Redeploy { params },
        );
        self.execute(invocation, None, Verdict::Succeeds)
            .map_err(|e| e.abort(seed, index))
    }

    /// Move the contract clock to `timestamp`
    pub fn set_time(&mut self, timestamp: u64) -> Result<Step> {
        let (seed, index) = (self.seed(), self.history.len());
        let invocation = Invocation::new(
            self.injector.accounts().owner(),
            Call::SetTime { timestamp },
        );
        self.execute(invocation, None, Verdict::Succeeds)
            .map_err(|e| e.abort(seed, index))
    }

    fn take_due_redeploy(&mut self) -> Option<SaleParams> {
        let due = matches!(&self.redeploy, Some(s) if s.after_steps == self.history.len());
        if due {
            self.redeploy.take().map(|s| s.sale)
        } else {
            None
        }
    }

    fn draw_step(&mut self) -> Result<Step> {
        let drawable: Vec<Operation> = self
            .catalog
            .drawable()
            .iter()
            .map(|spec| spec.operation)
            .collect();

        for attempt in 0..self.max_redraws {
            let operation = *self
                .env
                .rng
                .choose(&drawable)
                .ok_or(FuzzError::EmptyCatalog)?;
            let modes = self.catalog.failure_modes(operation);
            let mode = self.env.rng.choose(&modes).copied().flatten();

            match self.injector.synthesize(
                operation,
                mode,
                &self.sale,
                &self.ledger,
                &mut self.env,
            )? {
                Some(s) => return self.execute(s.invocation, mode, s.verdict),
                None => trace!(
                    "Redraw {}: {} / {} has no valid parameters",
                    attempt,
                    operation,
                    mode_name(mode)
                ),
            }
        }

        Err(FuzzError::SynthesisExhausted {
            attempts: self.max_redraws,
        })
    }

    fn execute(
        &mut self,
        invocation: Invocation,
        failure_mode: Option<FailureMode>,
        verdict: Verdict,
    ) -> Result<Step> {
        if let Some(at) = invocation.at_time {
            self.env.clock.set(at);
        }

        let pre = self.snapshot();
        let lifetime = if verdict.succeeds() {
            self.apply(&invocation)?
        } else {
            Lifetime::Same
        };
        let post = self.snapshot();

        let violations = if verdict.succeeds() {
            check_transition(&pre, &post, lifetime)
        } else {
            check_no_effect(&pre, &post)
        };
        if !violations.is_empty() {
            return Err(FuzzError::invariant(violations.join("; ")));
        }

        let outcome = self.oracle.render(&pre, &post, &invocation, &verdict);
        let step = Step {
            index: self.history.len(),
            invocation,
            failure_mode,
            outcome,
            state: StateReport::from_snapshot(&post),
        };

        debug!(
            "Step {}: {} by {} [{}] -> {}",
            step.index,
            step.operation(),
            step.invocation.caller,
            mode_name(failure_mode),
            if step.outcome.reverts() { "revert" } else { "ok" }
        );

        self.history.push(step.clone());
        Ok(step)
    }

    fn apply(&mut self, invocation: &Invocation) -> Result<Lifetime> {
        match &invocation.call {
            Call::Terminate | Call::UnlockFunds => self.sale.sale_closed = true,
            Call::SetRate { rate } => {
                if !self.sale.rate_in_bounds(*rate) {
                    return Err(FuzzError::invariant(format!(
                        "rate {} accepted outside [{}, {}]",
                        rate, self.sale.low_rate, self.sale.high_rate
                    )));
                }
                self.sale.rate = *rate;
            }
            Call::Pause { pause } => self.sale.paused = *pause,
            Call::AllocateTokens {
                to,
                amount_wei,
                amount_tokens,
            } => self
                .sale
                .record_purchase(&mut self.ledger, to, *amount_wei, *amount_tokens)?,
            Call::Contribute { wei } => {
                self.sale
                    .record_contribution(&mut self.ledger, &invocation.caller, *wei)?
            }
            Call::SafeWithdrawal => self.sale.withdraw_to_beneficiary()?,
            Call::SetTime { timestamp } => self.env.clock.set(*timestamp),
            Call::Redeploy { params } => {
                self.sale = SaleState::new(self.injector.accounts(), params);
                return Ok(Lifetime::Redeployed);
            }
        }
        Ok(Lifetime::Same)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.sale, &self.ledger, self.env.clock.now())
    }
}

fn mode_name(mode: Option<FailureMode>) -> String {
    mode.map(|m| m.to_string())
        .unwrap_or_else(|| "none".to_string())
}
