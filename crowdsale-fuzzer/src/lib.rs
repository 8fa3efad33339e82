//! # Crowdsale Fuzzer
//!
//! Model-based test-oracle generator for a token crowdsale (sale contract
//! plus the token it sells from).
//!
//! ## Architecture Overview
//!
//! One run keeps a replica of both contracts and emits a sequence of steps:
//! - **catalog**: operations, their guarding modifiers and argument-domain failures
//! - **injector**: draws arguments that violate exactly one failure mode (or none)
//! - **generator**: draws op + mode, applies successes to the replica, checks invariants
//! - **oracle**: pre/post snapshots to expected-value assertions
//! - **render**: the only text boundary
//!
//! ## Quick Start
//!
//! ```rust
//! use crowdsale_fuzzer::config::FuzzConfig;
//! use crowdsale_fuzzer::render::{StepRenderer, TextRenderer};
//! use crowdsale_fuzzer::{FuzzEnv, SequenceGenerator};
//!
//! let config = FuzzConfig::default();
//! let env = FuzzEnv::with_seed(0xa3f5c8e1b2d94706, config.sale.start_time);
//! let mut generator = SequenceGenerator::new(&config, env).unwrap();
//!
//! let steps = generator.generate(25).unwrap();
//! let script = TextRenderer::new().render(&steps).unwrap();
//! assert!(script.starts_with("step 0: "));
//! ```
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: logical clock + seeded RNG, same seed same sequence
//! 2. **No partial effects**: a reverting step leaves the replica untouched
//! 3. **Fail loudly**: invariant violations abort with seed and step index

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Token amount parsing and string serialization
pub mod amount;

/// Run artifacts (JSON, one per run)
pub mod artifacts;

/// Operation catalog
pub mod catalog;

/// YAML configuration
pub mod config;

/// Error taxonomy
pub mod error;

/// Sequence generator
pub mod generator;

/// Failure injection and parameter synthesis
pub mod injector;

/// Replica invariant checkers
pub mod invariants;

/// Contract replicas
pub mod model;

/// Assertion derivation
pub mod oracle;

/// Deterministic environment: clock and seeded RNG
pub mod orchestrator;

/// Output formats
pub mod render;

/// Artifact replay
pub mod replay;

/// Structured step output
pub mod step;

pub use error::{FuzzError, Result};
pub use generator::SequenceGenerator;
pub use orchestrator::{ChainClock, FuzzEnv, FuzzRng};

/// Generator version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
