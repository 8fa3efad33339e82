// File: crowdsale-fuzzer/src/artifacts.rs
//
// Generation Artifacts
//
// Every run can be persisted as one JSON document: the resolved config, the
// seed, the emitted steps and, when the run aborted, the failure and the step
// it happened at. Loading an artifact is enough to replay the run.

use crate::config::FuzzConfig;
use crate::error::FuzzError;
use crate::step::Step;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Complete record of one generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationArtifact {
    /// Run metadata
    pub metadata: RunMetadata,
    /// Resolved configuration, seed included
    pub config: FuzzConfig,
    /// Steps emitted before the run ended
    pub steps: Vec<Step>,
}

/// Metadata for reproduction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Version of the generator that wrote the artifact
    pub generator_version: String,
    /// RNG seed of the run
    pub seed: u64,
    /// Number of steps requested
    pub step_count: usize,
    /// Operations the generator drew from
    pub operations: Vec<String>,
    /// When the run started (RFC 3339)
    pub timestamp: String,
    /// Run duration (milliseconds)
    pub duration_ms: u64,
    /// Failure reason, if the run aborted
    pub failure_reason: Option<String>,
    /// Index of the step that failed, if known
    pub failed_step: Option<usize>,
    /// YAML file the configuration was loaded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
}

/// Collects a run and writes it to disk
///
/// # Examples
///
/// ```rust,ignore
/// use crowdsale_fuzzer::artifacts::ArtifactWriter;
///
/// let mut writer = ArtifactWriter::new(&config, generator.seed(), 50);
/// if let Err(e) = generator.generate(50) {
///     writer.record_steps(generator.history());
///     writer.set_failure(&e);
///     let path = writer.save("./artifacts/").await?;
///     println!("Artifact saved to: {}", path.display());
/// }
/// ```
pub struct ArtifactWriter {
    metadata: RunMetadata,
    config: FuzzConfig,
    steps: Vec<Step>,
    start_time: std::time::Instant,
}

impl ArtifactWriter {
    /// Start recording a run of `step_count` steps from `seed`
    ///
    /// The seed is written back into the stored config so the artifact
    /// replays without the environment that produced it.
    pub fn new(config: &FuzzConfig, seed: u64, step_count: usize) -> Self {
        let mut config = config.clone();
        config.run.seed = Some(seed);
        config.run.steps = step_count;

        let operations = config
            .operations()
            .ok()
            .filter(|ops| !ops.is_empty())
            .unwrap_or_else(crate::catalog::all_operations)
            .into_iter()
            .map(|op| op.to_string())
            .collect();

        Self {
            metadata: RunMetadata {
                generator_version: crate::VERSION.to_string(),
                seed,
                step_count,
                operations,
                timestamp: chrono::Utc::now().to_rfc3339(),
                duration_ms: 0,
                failure_reason: None,
                failed_step: None,
                config_file: None,
            },
            config,
            steps: Vec::new(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Remember the YAML file the configuration came from
    pub fn with_config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.metadata.config_file = Some(path.as_ref().display().to_string());
        self
    }

    /// Replace the recorded steps
    pub fn record_steps(&mut self, steps: &[Step]) {
        self.steps = steps.to_vec();
    }

    /// Record why the run aborted
    pub fn set_failure(&mut self, error: &FuzzError) {
        if let FuzzError::Aborted { step, .. } = error {
            self.metadata.failed_step = Some(*step);
        }
        self.metadata.failure_reason = Some(error.to_string());
    }

    /// Snapshot of what has been recorded so far
    pub fn artifact(&self) -> GenerationArtifact {
        let mut metadata = self.metadata.clone();
        metadata.duration_ms = self.start_time.elapsed().as_millis() as u64;

        GenerationArtifact {
            metadata,
            config: self.config.clone(),
            steps: self.steps.clone(),
        }
    }

    /// Save the artifact under `output_dir`
    ///
    /// The filename carries the seed and a timestamp; the full path is
    /// returned.
    pub async fn save(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let artifact = self.artifact();

        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)
            .await
            .context("Failed to create artifact directory")?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let outcome = if artifact.metadata.failure_reason.is_some() {
            "failed"
        } else {
            "ok"
        };
        let filename = format!(
            "crowdsale_{:016x}_{}_{}.json",
            artifact.metadata.seed, outcome, timestamp
        );
        let filepath = output_dir.join(filename);

        let json =
            serde_json::to_string_pretty(&artifact).context("Failed to serialize artifact")?;

        let mut file = fs::File::create(&filepath)
            .await
            .context("Failed to create artifact file")?;
        file.write_all(json.as_bytes())
            .await
            .context("Failed to write artifact data")?;
        file.flush()
            .await
            .context("Failed to flush artifact file")?;

        log::info!("Artifact saved to {}", filepath.display());
        Ok(filepath)
    }

    /// Load an artifact from disk
    pub async fn load(filepath: impl AsRef<Path>) -> Result<GenerationArtifact> {
        let filepath = filepath.as_ref();
        let content = fs::read_to_string(filepath)
            .await
            .with_context(|| format!("Failed to read artifact file {}", filepath.display()))?;

        let artifact: GenerationArtifact =
            serde_json::from_str(&content).context("Failed to parse artifact JSON")?;

        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::generator::SequenceGenerator;
    use crate::orchestrator::FuzzEnv;

    #[test]
    fn test_writer_pins_seed() {
        let config = FuzzConfig::default();
        let writer = ArtifactWriter::new(&config, 0xdeadbeef, 12);
        let artifact = writer.artifact();

        assert_eq!(artifact.metadata.seed, 0xdeadbeef);
        assert_eq!(artifact.config.run.seed, Some(0xdeadbeef));
        assert_eq!(artifact.config.run.steps, 12);
        assert_eq!(artifact.metadata.operations.len(), 9);
        assert!(artifact.metadata.failure_reason.is_none());
    }

    #[test]
    fn test_set_failure_records_step() {
        let mut writer = ArtifactWriter::new(&FuzzConfig::default(), 7, 10);
        let error = FuzzError::SynthesisExhausted { attempts: 3 }.abort(7, 4);
        writer.set_failure(&error);

        let artifact = writer.artifact();
        assert_eq!(artifact.metadata.failed_step, Some(4));
        assert!(artifact
            .metadata
            .failure_reason
            .unwrap()
            .contains("no synthesizable step"));
    }

    #[tokio::test]
    async fn test_save_and_load_artifact() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let config = FuzzConfig::default();
        let mut generator =
            SequenceGenerator::new(&config, FuzzEnv::with_seed(0x5eed, config.sale.start_time))?;
        let steps = generator.generate(15)?;

        let mut writer = ArtifactWriter::new(&config, generator.seed(), 15);
        writer.record_steps(&steps);
        let filepath = writer.save(temp_dir.path()).await?;
        assert!(filepath.exists());
        assert!(filepath
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("crowdsale_0000000000005eed_ok_"));

        let loaded = ArtifactWriter::load(&filepath).await?;
        assert_eq!(loaded.metadata.seed, 0x5eed);
        assert_eq!(loaded.steps, steps);
        assert_eq!(loaded.config.run.seed, Some(0x5eed));

        Ok(())
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = ArtifactWriter::load(temp_dir.path().join("missing.json")).await;
        assert!(result.is_err());
    }
}
