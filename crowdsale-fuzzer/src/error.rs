// File: crowdsale-fuzzer/src/error.rs
//
// Generation Errors
//
// Every error here is fatal for the current run. Empty synthesis domains are
// not errors: the injector reports them as `Ok(None)` and the generator redraws.

use crate::catalog::{FailureMode, Operation};
use thiserror::Error;

/// Errors raised while generating a step sequence
#[derive(Debug, Error)]
pub enum FuzzError {
    /// The replica reached a state the target contract can never be in
    #[error("model invariant violated: {0}")]
    InvariantViolation(String),

    /// A failure mode was requested for an operation that does not declare it
    #[error("failure mode `{mode}` is not supported by `{operation}`")]
    UnsupportedFailureMode {
        /// Operation being synthesized
        operation: Operation,
        /// Requested failure mode
        mode: FailureMode,
    },

    /// Too many consecutive draws hit an empty parameter domain
    #[error("no synthesizable step after {attempts} consecutive draws")]
    SynthesisExhausted {
        /// Number of draws attempted
        attempts: usize,
    },

    /// The operation filter left nothing to draw from
    #[error("operation catalog is empty, nothing to draw")]
    EmptyCatalog,

    /// Unknown operation name (CLI filter, config)
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    /// The configuration fails validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Explicit steps were asked to do something the model cannot express
    #[error("invalid explicit step: {0}")]
    InvalidStep(String),

    /// Run aborted; carries everything needed to reproduce it
    #[error("generation aborted at step {step} (seed 0x{seed:016x}): {source}")]
    Aborted {
        /// Seed of the aborted run
        seed: u64,
        /// Index of the step being generated
        step: usize,
        /// Underlying failure
        #[source]
        source: Box<FuzzError>,
    },
}

impl FuzzError {
    /// Shorthand for invariant violations
    pub fn invariant(message: impl Into<String>) -> Self {
        FuzzError::InvariantViolation(message.into())
    }

    /// Wrap the error with the seed and step index of the run, once
    pub fn abort(self, seed: u64, step: usize) -> Self {
        match self {
            aborted @ FuzzError::Aborted { .. } => aborted,
            other => FuzzError::Aborted {
                seed,
                step,
                source: Box::new(other),
            },
        }
    }
}

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, FuzzError>;
