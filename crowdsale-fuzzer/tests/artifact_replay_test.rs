// Config loading, artifact persistence and replay, end to end

#![allow(clippy::unwrap_used)]

use crowdsale_fuzzer::artifacts::ArtifactWriter;
use crowdsale_fuzzer::config::load_config;
use crowdsale_fuzzer::replay::{load_artifact, validate_artifact, verify_replay};
use crowdsale_fuzzer::{FuzzEnv, FuzzError, SequenceGenerator};

const RUN_CONFIG: &str = r#"
accounts:
  users: ["owner", "beneficiary", "admin", "alice", "bob", "carol"]
sale:
  funding_goal_ether: 5
  funding_cap_ether: 8
  min_contribution_wei: "50_000_000_000_000_000"
run:
  steps: 40
  seed: "0xc0ffee"
"#;

// Only role accounts: every contribution path but the disallowed-sender one
// has an empty domain.
const STARVED_CONFIG: &str = r#"
accounts:
  users: ["owner", "beneficiary", "admin"]
run:
  steps: 50
  seed: 77
  only: ["contribute"]
  max_redraws: 3
"#;

#[tokio::test]
async fn test_generate_save_and_replay() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("fuzz.yaml");
    tokio::fs::write(&config_path, RUN_CONFIG).await.unwrap();

    let config = load_config(&config_path).await.unwrap();
    assert_eq!(config.run.seed, Some(0xc0ffee));
    assert_eq!(config.accounts.users.len(), 6);

    let seed = config.run.seed.unwrap();
    let mut generator =
        SequenceGenerator::new(&config, FuzzEnv::with_seed(seed, config.sale.start_time)).unwrap();
    let steps = generator.generate(config.run.steps).unwrap();

    let mut writer = ArtifactWriter::new(&config, seed, config.run.steps);
    writer.record_steps(&steps);
    let path = writer.save(temp_dir.path().join("artifacts")).await.unwrap();

    let artifact = load_artifact(&path).await.unwrap();
    validate_artifact(&artifact).unwrap();
    assert_eq!(artifact.steps, steps);

    let report = verify_replay(&artifact).unwrap();
    assert!(report.is_faithful());
    assert_eq!(report.replayed_steps, 40);
    assert!(report.replay_failure.is_none());
}

#[tokio::test]
async fn test_failed_run_replays_to_same_failure() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("starved.yaml");
    tokio::fs::write(&config_path, STARVED_CONFIG).await.unwrap();

    let config = load_config(&config_path).await.unwrap();
    let seed = config.run.seed.unwrap();
    let mut generator =
        SequenceGenerator::new(&config, FuzzEnv::with_seed(seed, config.sale.start_time)).unwrap();

    let err = generator.generate(config.run.steps).unwrap_err();
    let failed_at = match &err {
        FuzzError::Aborted { seed: s, step, source } => {
            assert_eq!(*s, 77);
            assert!(matches!(**source, FuzzError::SynthesisExhausted { attempts: 3 }));
            *step
        }
        other => panic!("expected Aborted, got {other:?}"),
    };
    assert_eq!(generator.history().len(), failed_at);

    let mut writer = ArtifactWriter::new(&config, seed, config.run.steps);
    writer.record_steps(generator.history());
    writer.set_failure(&err);
    let path = writer.save(temp_dir.path()).await.unwrap();
    assert!(path.to_string_lossy().contains("_failed_"));

    let artifact = load_artifact(&path).await.unwrap();
    assert_eq!(artifact.metadata.failed_step, Some(failed_at));

    let report = verify_replay(&artifact).unwrap();
    assert!(report.is_faithful());
    assert_eq!(report.replayed_steps, failed_at);
}

#[tokio::test]
async fn test_invalid_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("bad.yaml");
    tokio::fs::write(&config_path, "sale:\n  low_rate: 9000\n  rate: 5000\n")
        .await
        .unwrap();

    assert!(load_config(&config_path).await.is_err());
    assert!(load_config(temp_dir.path().join("missing.yaml")).await.is_err());
}
