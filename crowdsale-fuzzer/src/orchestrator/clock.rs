// File: crowdsale-fuzzer/src/orchestrator/clock.rs
//
// Logical chain clock
//
// The target contract reads time from a mock hook (`changeTime`), so the
// generator never looks at wall-clock time. Time only moves through explicit
// set-time steps.

use serde::{Deserialize, Serialize};

/// Logical block timestamp, in seconds
///
/// # Examples
///
/// ```rust
/// use crowdsale_fuzzer::orchestrator::clock::ChainClock;
///
/// let mut clock = ChainClock::starting_at(1_000);
/// assert_eq!(clock.now(), 1_000);
///
/// clock.set(600);
/// assert_eq!(clock.now(), 600);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainClock {
    now: u64,
}

impl ChainClock {
    /// Clock positioned at `now`
    pub fn starting_at(now: u64) -> Self {
        Self { now }
    }

    /// Current logical timestamp
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Move the clock to `timestamp`
    ///
    /// The mock contract accepts any timestamp, including one in the past.
    pub fn set(&mut self, timestamp: u64) {
        self.now = timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_moves_both_ways() {
        let mut clock = ChainClock::starting_at(100);
        clock.set(5_000);
        assert_eq!(clock.now(), 5_000);
        clock.set(0);
        assert_eq!(clock.now(), 0);
    }
}
