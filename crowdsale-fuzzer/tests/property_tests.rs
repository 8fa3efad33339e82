//! Property-based tests over generation runs
//!
//! Every property is checked over arbitrary seeds and step counts. A failing
//! case prints the seed; replay it with `CROWDSALE_FUZZ_SEED=<seed>`.
//!
//! # Properties Tested
//!
//! 1. **Determinism**: same (seed, count, config) gives the same steps
//! 2. **Oracle consistency**: relative assertions add up to the replica's deltas
//! 3. **Revert shape**: reverting steps assert only pre-state values
//! 4. **Rate bounds**: the replica rate never leaves `[lowRate, highRate]`

#![allow(clippy::unwrap_used)]

use crowdsale_fuzzer::config::FuzzConfig;
use crowdsale_fuzzer::step::{Call, Expectation, Observable, Outcome};
use crowdsale_fuzzer::{FuzzEnv, SequenceGenerator};
use proptest::prelude::*;

fn generator(seed: u64, config: &FuzzConfig) -> SequenceGenerator {
    SequenceGenerator::new(config, FuzzEnv::with_seed(seed, config.sale.start_time)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Same seed, same sequence
    #[test]
    fn prop_generation_is_deterministic(seed in any::<u64>(), count in 0usize..80) {
        let config = FuzzConfig::default();
        let first = generator(seed, &config).generate(count).unwrap();
        let second = generator(seed, &config).generate(count).unwrap();
        prop_assert_eq!(first.len(), count);
        prop_assert_eq!(first, second);
    }

    /// Reverting steps never describe a change
    #[test]
    fn prop_reverts_assert_no_change(seed in any::<u64>()) {
        let steps = generator(seed, &FuzzConfig::default()).generate(60).unwrap();
        for step in steps.iter().filter(|s| s.outcome.reverts()) {
            for assertion in step.outcome.assertions() {
                prop_assert!(
                    !matches!(
                        assertion.expect,
                        Expectation::Increased(_) | Expectation::Decreased(_)
                    ),
                    "step {} asserts {}",
                    step.index,
                    assertion
                );
            }
        }
    }

    /// Token deltas asserted on success match the rate
    #[test]
    fn prop_contribution_deltas_match_rate(seed in any::<u64>()) {
        let mut config = FuzzConfig::default();
        config.run.only = vec!["contribute".into(), "setRate".into(), "setTime".into()];
        let mut gen = generator(seed, &config);

        for _ in 0..60 {
            let rate = gen.sale().rate;
            let step = gen.next_step().unwrap();
            let (Call::Contribute { wei }, Outcome::Succeeds { assertions }) =
                (&step.invocation.call, &step.outcome)
            else {
                continue;
            };

            let tokens = wei * rate;
            let caller_tokens = Observable::TokenBalance(step.invocation.caller.clone());
            for assertion in assertions {
                match &assertion.observable {
                    o if o == &caller_tokens => {
                        prop_assert_eq!(assertion.expect, Expectation::Increased(tokens))
                    }
                    Observable::CrowdsaleAllowance => {
                        prop_assert_eq!(assertion.expect, Expectation::Decreased(tokens))
                    }
                    Observable::AmountRaised | Observable::SaleEtherBalance => {
                        prop_assert_eq!(assertion.expect, Expectation::Increased(*wei))
                    }
                    _ => {}
                }
            }
        }
    }

    /// The replica rate stays within its bounds
    #[test]
    fn prop_rate_stays_in_bounds(seed in any::<u64>(), count in 1usize..120) {
        let mut gen = generator(seed, &FuzzConfig::default());
        gen.generate(count).unwrap();
        prop_assert!(gen.sale().rate_in_bounds(gen.sale().rate));
    }

    /// Allowance never grows and tokens are conserved
    #[test]
    fn prop_tokens_conserved(seed in any::<u64>(), count in 1usize..120) {
        let mut gen = generator(seed, &FuzzConfig::default());
        let initial = gen.ledger().crowdsale_allowance();
        gen.generate(count).unwrap();

        prop_assert!(gen.ledger().crowdsale_allowance() <= initial);
        prop_assert_eq!(
            gen.ledger().crowdsale_allowance() + gen.ledger().total_disbursed(),
            initial
        );
    }
}
