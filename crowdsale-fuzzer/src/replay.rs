// File: crowdsale-fuzzer/src/replay.rs
//
// Artifact Replay Utilities
//
// Loading, inspecting and re-running saved generation artifacts. A replay
// regenerates the run from the stored config and seed and compares it step
// by step with what the artifact recorded.

use crate::artifacts::{ArtifactWriter, GenerationArtifact};
use crate::config::FuzzConfig;
use crate::generator::SequenceGenerator;
use crate::orchestrator::rng::SEED_ENV_VAR;
use crate::orchestrator::FuzzEnv;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

/// Load an artifact from disk
pub async fn load_artifact(filepath: impl AsRef<Path>) -> Result<GenerationArtifact> {
    ArtifactWriter::load(filepath).await
}

/// Print an artifact summary to stdout
pub fn print_artifact_summary(artifact: &GenerationArtifact) {
    let metadata = &artifact.metadata;
    let reverts = artifact.steps.iter().filter(|s| s.outcome.reverts()).count();

    println!("╔════════════════════════════════════════════════════════════════╗");
    println!("║              CROWDSALE GENERATION ARTIFACT                     ║");
    println!("╠════════════════════════════════════════════════════════════════╣");
    println!("║ Version:       {:47} ║", metadata.generator_version);
    println!("║ Timestamp:     {:47} ║", metadata.timestamp);
    println!(
        "║ Duration:      {:47} ║",
        format!("{} ms", metadata.duration_ms)
    );
    println!("║ Seed:          {:47} ║", format!("0x{:016x}", metadata.seed));
    println!(
        "║ Steps:         {:47} ║",
        format!(
            "{} of {} ({} revert)",
            artifact.steps.len(),
            metadata.step_count,
            reverts
        )
    );

    println!("╠════════════════════════════════════════════════════════════════╣");
    println!("║ OPERATIONS:                                                    ║");
    for line in textwrap::wrap(&metadata.operations.join(", "), 62) {
        println!("║ {:62} ║", line);
    }

    if let Some(ref reason) = metadata.failure_reason {
        println!("╠════════════════════════════════════════════════════════════════╣");
        match metadata.failed_step {
            Some(step) => println!("║ FAILURE AT STEP {:<46} ║", step),
            None => println!("║ FAILURE:                                                       ║"),
        }
        for line in textwrap::wrap(reason, 62) {
            println!("║ {:62} ║", line);
        }
    }

    println!("╠════════════════════════════════════════════════════════════════╣");
    println!("║ REPLAY COMMAND:                                                ║");
    let command = replay_command(artifact)
        .unwrap_or_else(|| "crowdsale-fuzzer replay <this artifact>".to_string());
    for line in textwrap::wrap(&command, 62) {
        println!("║ {:62} ║", line);
    }
    println!("╚════════════════════════════════════════════════════════════════╝");
}

/// Shell command that regenerates the artifact's run
///
/// `None` when the run used a custom configuration that was not loaded from
/// a file; only `crowdsale-fuzzer replay <artifact>` reproduces it then.
pub fn replay_command(artifact: &GenerationArtifact) -> Option<String> {
    let metadata = &artifact.metadata;
    if metadata.config_file.is_none() && !has_default_setup(&artifact.config) {
        return None;
    }

    let mut command = format!(
        "{}=0x{:016x} crowdsale-fuzzer generate --steps {}",
        SEED_ENV_VAR, metadata.seed, metadata.step_count
    );
    if let Some(path) = &metadata.config_file {
        command.push_str(" --config ");
        command.push_str(path);
    }
    if !artifact.config.run.only.is_empty() {
        command.push_str(" --only ");
        command.push_str(&artifact.config.run.only.join(","));
    }
    Some(command)
}

// Everything the generate flags cannot override is at its default
fn has_default_setup(config: &FuzzConfig) -> bool {
    let default = FuzzConfig::default();
    config.accounts == default.accounts
        && config.token == default.token
        && config.sale == default.sale
        && config.run.max_redraws == default.run.max_redraws
        && config.run.redeploy.is_none()
}

/// Check an artifact is internally consistent
pub fn validate_artifact(artifact: &GenerationArtifact) -> Result<()> {
    let metadata = &artifact.metadata;

    chrono::DateTime::parse_from_rfc3339(&metadata.timestamp)
        .map_err(|e| anyhow::anyhow!("Artifact timestamp is not RFC 3339: {}", e))?;

    if artifact.config.run.seed != Some(metadata.seed) {
        anyhow::bail!(
            "Config seed {:?} does not match metadata seed 0x{:016x}",
            artifact.config.run.seed,
            metadata.seed
        );
    }

    if artifact.steps.len() > metadata.step_count {
        anyhow::bail!(
            "More steps ({}) than requested ({})",
            artifact.steps.len(),
            metadata.step_count
        );
    }

    for (position, step) in artifact.steps.iter().enumerate() {
        if step.index != position {
            anyhow::bail!("Step at position {} has index {}", position, step.index);
        }
    }

    match (&metadata.failure_reason, metadata.failed_step) {
        (None, Some(step)) => anyhow::bail!("Failed step {} recorded without a reason", step),
        (None, None) if artifact.steps.len() != metadata.step_count => anyhow::bail!(
            "Complete run holds {} steps, expected {}",
            artifact.steps.len(),
            metadata.step_count
        ),
        _ => {}
    }

    Ok(())
}

/// Result of replaying an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Seed the run was regenerated from
    pub seed: u64,
    /// Steps recorded in the artifact
    pub recorded_steps: usize,
    /// Steps the replay produced
    pub replayed_steps: usize,
    /// First index where recorded and replayed steps differ
    pub first_divergence: Option<usize>,
    /// Failure the replay hit, if any
    pub replay_failure: Option<String>,
    /// Whether the artifact recorded a failure
    pub recorded_failure: bool,
}

impl ReplayReport {
    /// Replay produced the same steps and ended the same way
    pub fn is_faithful(&self) -> bool {
        self.first_divergence.is_none()
            && self.replay_failure.is_some() == self.recorded_failure
    }
}

/// Regenerate the artifact's run and compare it with the recording
pub fn verify_replay(artifact: &GenerationArtifact) -> Result<ReplayReport> {
    validate_artifact(artifact)?;

    let seed = artifact.metadata.seed;
    let env = FuzzEnv::with_seed(seed, artifact.config.sale.start_time);
    let mut generator = SequenceGenerator::new(&artifact.config, env)?;

    let replay_failure = generator
        .generate(artifact.metadata.step_count)
        .err()
        .map(|e| e.to_string());
    let replayed = generator.history();

    let first_divergence = artifact
        .steps
        .iter()
        .zip(replayed)
        .position(|(recorded, replayed)| recorded != replayed)
        .or_else(|| {
            (artifact.steps.len() != replayed.len())
                .then(|| artifact.steps.len().min(replayed.len()))
        });

    let report = ReplayReport {
        seed,
        recorded_steps: artifact.steps.len(),
        replayed_steps: replayed.len(),
        first_divergence,
        replay_failure,
        recorded_failure: artifact.metadata.failure_reason.is_some(),
    };

    if report.is_faithful() {
        log::info!("Replay of seed 0x{:016x} matches the artifact", seed);
    } else {
        log::warn!(
            "Replay of seed 0x{:016x} diverges at step {:?}",
            seed,
            report.first_divergence
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn recorded(seed: u64, steps: usize) -> GenerationArtifact {
        let config = FuzzConfig::default();
        let mut generator =
            SequenceGenerator::new(&config, FuzzEnv::with_seed(seed, config.sale.start_time))
                .unwrap();
        let generated = generator.generate(steps).unwrap();

        let mut writer = ArtifactWriter::new(&config, seed, steps);
        writer.record_steps(&generated);
        writer.artifact()
    }

    #[test]
    fn test_replay_command() {
        let mut artifact = recorded(0xdeadbeefcafebabe, 3);
        assert_eq!(
            replay_command(&artifact).unwrap(),
            "CROWDSALE_FUZZ_SEED=0xdeadbeefcafebabe crowdsale-fuzzer generate --steps 3"
        );

        artifact.config.run.only = vec!["setRate".to_string(), "pause".to_string()];
        assert!(replay_command(&artifact)
            .unwrap()
            .ends_with("--only setRate,pause"));
    }

    #[test]
    fn test_replay_command_with_custom_config() {
        let mut artifact = recorded(0x42, 3);
        artifact.config.sale.rate = 7_000;
        assert!(replay_command(&artifact).is_none());

        artifact.metadata.config_file = Some("fuzz.yaml".to_string());
        assert_eq!(
            replay_command(&artifact).unwrap(),
            "CROWDSALE_FUZZ_SEED=0x0000000000000042 crowdsale-fuzzer generate --steps 3 --config fuzz.yaml"
        );
    }

    #[test]
    fn test_config_file_is_recorded() {
        let config = FuzzConfig::default();
        let writer = ArtifactWriter::new(&config, 9, 0).with_config_file("configs/fuzz.yaml");
        assert_eq!(
            writer.artifact().metadata.config_file.as_deref(),
            Some("configs/fuzz.yaml")
        );
    }

    #[test]
    fn test_validate_artifact_success() {
        assert!(validate_artifact(&recorded(1, 5)).is_ok());
    }

    #[test]
    fn test_validate_artifact_bad_indices() {
        let mut artifact = recorded(1, 5);
        artifact.steps.swap(1, 2);
        let err = validate_artifact(&artifact).unwrap_err();
        assert!(err.to_string().contains("has index"));
    }

    #[test]
    fn test_validate_artifact_truncated_success() {
        let mut artifact = recorded(1, 5);
        artifact.steps.pop();
        assert!(validate_artifact(&artifact).is_err());
    }

    #[test]
    fn test_verify_replay_faithful() {
        let report = verify_replay(&recorded(0xabc, 30)).unwrap();
        assert!(report.is_faithful());
        assert_eq!(report.replayed_steps, 30);
    }

    #[test]
    fn test_verify_replay_detects_tampering() {
        let mut artifact = recorded(0xabc, 30);
        artifact.steps[7].failure_mode = None;
        artifact.steps[7].outcome = crate::step::Outcome::Succeeds { assertions: vec![] };

        let report = verify_replay(&artifact).unwrap();
        assert!(!report.is_faithful());
        assert_eq!(report.first_divergence, Some(7));
    }

    #[test]
    fn test_print_artifact_summary() {
        let mut artifact = recorded(0xabcd1234, 4);
        artifact.metadata.failure_reason = Some("model invariant violated".to_string());
        artifact.metadata.failed_step = Some(3);
        print_artifact_summary(&artifact);
    }
}
