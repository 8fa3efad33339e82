// File: crowdsale-fuzzer/src/orchestrator/mod.rs
//
// Orchestrator Module - deterministic generation context
//
// Randomness and time are the only sources of variation in a run. Both live in
// an explicit FuzzEnv that is passed to the injector and owned by the
// generator, so independent runs never share state.

/// Logical chain clock driven by set-time steps
pub mod clock;
/// Seeded random number generation for replayable runs
pub mod rng;

pub use clock::ChainClock;
pub use rng::FuzzRng;

/// Complete deterministic generation environment
///
/// Two environments built from the same seed and start time make identical
/// decisions for identical replica states.
///
/// # Examples
///
/// ```rust
/// use crowdsale_fuzzer::orchestrator::FuzzEnv;
///
/// let mut env = FuzzEnv::with_seed(0x1234, 1_000);
/// assert_eq!(env.seed(), 0x1234);
/// assert_eq!(env.clock.now(), 1_000);
///
/// let pick: u64 = env.rng.gen_range(0..10);
/// assert!(pick < 10);
/// ```
#[derive(Debug, Clone)]
pub struct FuzzEnv {
    /// Logical time seen by the target contract
    pub clock: ChainClock,
    /// Random source for every decision of the run
    pub rng: FuzzRng,
}

impl FuzzEnv {
    /// Environment with an explicit seed, clock positioned at `start_time`
    pub fn with_seed(seed: u64, start_time: u64) -> Self {
        Self {
            clock: ChainClock::starting_at(start_time),
            rng: FuzzRng::with_seed(seed),
        }
    }

    /// Seed of the run
    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }
}
