// File: crowdsale-fuzzer/src/render.rs
//
// Step renderers
//
// The generator produces structured steps; this is the only place they
// become text. `TextRenderer` writes a readable test script outline,
// `JsonLinesRenderer` writes one JSON document per step for tooling.

use crate::model::SaleParams;
use crate::step::{Call, Invocation, Outcome, StateReport, Step};
use anyhow::{Context, Result};
use std::fmt::Write;

/// Turns generated steps into an output format
pub trait StepRenderer {
    /// Render one step
    fn render_step(&self, step: &Step) -> Result<String>;

    /// Render a whole sequence, one step after the other
    fn render(&self, steps: &[Step]) -> Result<String> {
        let mut out = String::new();
        for step in steps {
            out.push_str(&self.render_step(step)?);
        }
        Ok(out)
    }
}

/// Plain-text script outline
///
/// ```text
/// step 3: sale.setRate(20000) from owner  [rateAbove]
///   expect revert: the new rate must be within the bounds
///   check sale.rate() == 5000
/// ```
///
/// With [`TextRenderer::with_parameters`] each call is preceded by its
/// resolved arguments; with [`TextRenderer::with_state_dump`] each step is
/// followed by the sale getters the replica predicts:
///
/// ```text
/// step 3: about to call setRate with parameters: from=owner, rate=20000
/// step 3: sale.setRate(20000) from owner  [rateAbove]
///   expect revert: the new rate must be within the bounds
///   check sale.rate() == 5000
///   state:
///     amountRaised = 0
///     ...
///     crowdsaleOngoing = true
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TextRenderer {
    show_failure_modes: bool,
    show_parameters: bool,
    show_state: bool,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self {
            show_failure_modes: true,
            show_parameters: false,
            show_state: false,
        }
    }
}

impl TextRenderer {
    /// Renderer annotating each step with its injected failure mode
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the failure mode annotation
    pub fn without_failure_modes(mut self) -> Self {
        self.show_failure_modes = false;
        self
    }

    /// Announce every call with its resolved parameters
    pub fn with_parameters(mut self) -> Self {
        self.show_parameters = true;
        self
    }

    /// Dump the predicted sale state after every step
    pub fn with_state_dump(mut self) -> Self {
        self.show_state = true;
        self
    }
}

fn write_state(out: &mut String, state: &StateReport) -> std::fmt::Result {
    writeln!(out, "  state:")?;
    writeln!(out, "    amountRaised = {}", state.amount_raised)?;
    writeln!(out, "    paused = {}", state.paused)?;
    writeln!(out, "    saleClosed = {}", state.sale_closed)?;
    writeln!(out, "    fundingGoalReached = {}", state.goal_reached)?;
    writeln!(out, "    fundingCapReached = {}", state.cap_reached)?;
    writeln!(out, "    rate = {}", state.rate)?;
    writeln!(out, "    startTime = {}", state.start_time)?;
    writeln!(out, "    currentTime = {}", state.current_time)?;
    writeln!(out, "    endTime = {}", state.end_time)?;
    writeln!(out, "    crowdsaleOngoing = {}", state.ongoing())
}

impl StepRenderer for TextRenderer {
    fn render_step(&self, step: &Step) -> Result<String> {
        let mut out = String::new();

        if let Some(at) = step.invocation.at_time {
            writeln!(out, "step {}: sale.changeTime({})", step.index, at)?;
        }
        if self.show_parameters {
            let parameters = call_parameters(&step.invocation)
                .into_iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(
                out,
                "step {}: about to call {} with parameters: {}",
                step.index,
                step.operation(),
                parameters
            )?;
        }
        write!(
            out,
            "step {}: {}",
            step.index,
            describe_invocation(&step.invocation)
        )?;
        if self.show_failure_modes {
            if let Some(mode) = step.failure_mode {
                write!(out, "  [{}]", mode)?;
            }
        }
        out.push('\n');

        match &step.outcome {
            Outcome::Succeeds { .. } => {}
            Outcome::Reverts { message, .. } => writeln!(out, "  expect revert: {}", message)?,
        }
        for assertion in step.outcome.assertions() {
            writeln!(out, "  check {}", assertion)?;
        }
        if self.show_state {
            write_state(&mut out, &step.state)?;
        }

        Ok(out)
    }
}

/// One JSON document per line, in the artifact's step schema
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesRenderer;

impl StepRenderer for JsonLinesRenderer {
    fn render_step(&self, step: &Step) -> Result<String> {
        let mut line = serde_json::to_string(step)
            .with_context(|| format!("Failed to serialize step {}", step.index))?;
        line.push('\n');
        Ok(line)
    }
}

/// Contract-level call, sender included
pub fn describe_invocation(invocation: &Invocation) -> String {
    let caller = &invocation.caller;
    match &invocation.call {
        Call::Terminate => format!("sale.terminate() from {}", caller),
        Call::SetRate { rate } => format!("sale.setRate({}) from {}", rate, caller),
        Call::AllocateTokens {
            to,
            amount_wei,
            amount_tokens,
        } => format!(
            "sale.ownerAllocateTokens({}, {}, {}) from {}",
            to, amount_wei, amount_tokens, caller
        ),
        Call::UnlockFunds => format!("sale.ownerUnlockFund() from {}", caller),
        Call::Contribute { wei } => format!("send {} wei to sale.address from {}", wei, caller),
        Call::Pause { pause: true } => format!("sale.pause() from {}", caller),
        Call::Pause { pause: false } => format!("sale.unpause() from {}", caller),
        Call::SafeWithdrawal => format!("sale.ownerSafeWithdrawal() from {}", caller),
        Call::SetTime { timestamp } => format!("sale.changeTime({}) from {}", timestamp, caller),
        Call::Redeploy { params } => format!("deploy {} from {}", describe_deploy(params), caller),
    }
}

/// Named arguments of a call, sender first
pub fn call_parameters(invocation: &Invocation) -> Vec<(&'static str, String)> {
    let mut parameters = vec![("from", invocation.caller.to_string())];
    match &invocation.call {
        Call::Terminate | Call::UnlockFunds | Call::SafeWithdrawal => {}
        Call::SetRate { rate } => parameters.push(("rate", rate.to_string())),
        Call::AllocateTokens {
            to,
            amount_wei,
            amount_tokens,
        } => {
            parameters.push(("to", to.to_string()));
            parameters.push(("amountWei", amount_wei.to_string()));
            parameters.push(("amountTokens", amount_tokens.to_string()));
        }
        Call::Contribute { wei } => parameters.push(("value", wei.to_string())),
        Call::Pause { pause } => parameters.push(("pause", pause.to_string())),
        Call::SetTime { timestamp } => parameters.push(("timestamp", timestamp.to_string())),
        Call::Redeploy { params } => {
            parameters.push(("rate", params.rate.to_string()));
            parameters.push(("startTime", params.start_time.to_string()));
            parameters.push(("durationMinutes", params.duration_minutes.to_string()));
        }
    }
    if let Some(at) = invocation.at_time {
        parameters.push(("time", at.to_string()));
    }
    parameters
}

fn describe_deploy(params: &SaleParams) -> String {
    format!(
        "QuantstampSale(beneficiary, {}, {}, {}, {}, {}, {}, {}, {}, token.address)",
        params.funding_goal_ether,
        params.funding_cap_ether,
        params.min_contribution_wei,
        params.start_time,
        params.duration_minutes,
        params.rate,
        params.low_rate,
        params.high_rate
    )
}
