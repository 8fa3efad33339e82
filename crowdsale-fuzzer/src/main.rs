// Crowdsale Test-Oracle Generator
//
// Purpose: Generate randomized, replayable call sequences against the crowdsale
// and token contracts, each step annotated with the exact state the test
// script must observe afterwards.
//
// Features:
// - Seeded generation, replay via CROWDSALE_FUZZ_SEED or --seed
// - YAML configuration of accounts, token, sale and run parameters
// - Text or JSON-lines output, optionally with call parameters and state dumps
// - JSON artifact on abort (or on request) with the seed and failing step
//
// Usage:
//   crowdsale-fuzzer generate --steps 50 --config fuzz.yaml
//   crowdsale-fuzzer catalog
//   crowdsale-fuzzer replay artifacts/crowdsale_00000000deadbeef_failed_20260101_120000.json

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn};
use std::path::PathBuf;

use crowdsale_fuzzer::artifacts::ArtifactWriter;
use crowdsale_fuzzer::catalog::{FailureMode, OperationCatalog};
use crowdsale_fuzzer::config::{load_config, validate_config, FuzzConfig};
use crowdsale_fuzzer::orchestrator::rng::{parse_seed, resolve_seed};
use crowdsale_fuzzer::render::{JsonLinesRenderer, StepRenderer, TextRenderer};
use crowdsale_fuzzer::replay::{load_artifact, print_artifact_summary, verify_replay};
use crowdsale_fuzzer::{FuzzEnv, SequenceGenerator};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "crowdsale-fuzzer")]
#[command(about = "Generate model-checked test sequences for the crowdsale contracts", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a step sequence
    Generate(GenerateArgs),
    /// List operations and their injectable failure modes
    Catalog,
    /// Inspect a saved artifact and check it replays identically
    Replay {
        /// Artifact JSON file
        artifact: PathBuf,

        /// Print the summary without regenerating
        #[arg(long, default_value_t = false)]
        summary_only: bool,
    },
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed (hex, 0x prefix optional); overrides config and environment
    #[arg(short, long, value_parser = seed_arg)]
    seed: Option<u64>,

    /// Number of steps; overrides config
    #[arg(short = 'n', long)]
    steps: Option<usize>,

    /// Restrict drawing to these operations (comma separated)
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Text format: announce each call with its resolved parameters
    #[arg(long, default_value_t = false)]
    show_parameters: bool,

    /// Text format: dump the predicted sale state after each step
    #[arg(long, default_value_t = false)]
    dump_state: bool,

    /// Write the sequence here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also save an artifact for successful runs
    #[arg(long, default_value_t = false)]
    save_artifact: bool,

    /// Where artifacts go
    #[arg(long, default_value = "./artifacts")]
    artifact_dir: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Text,
    Json,
}

fn seed_arg(raw: &str) -> Result<u64, String> {
    parse_seed(raw).ok_or_else(|| format!("invalid seed `{}`, expected hex", raw))
}

// ============================================================================
// Commands
// ============================================================================

async fn generate(args: GenerateArgs) -> Result<bool> {
    let mut config = match &args.config {
        Some(path) => load_config(path).await?,
        None => FuzzConfig::default(),
    };
    if let Some(steps) = args.steps {
        config.run.steps = steps;
    }
    if !args.only.is_empty() {
        config.run.only = args.only.clone();
    }
    if args.seed.is_some() {
        config.run.seed = args.seed;
    }
    validate_config(&config)?;

    let seed = resolve_seed(config.run.seed);
    let steps = config.run.steps;

    info!("Crowdsale Test-Oracle Generator");
    info!("===============================");
    info!("Configuration:");
    info!("  Steps:        {}", steps);
    info!("  Seed:         0x{:016x}", seed);
    info!(
        "  Operations:   {}",
        if config.run.only.is_empty() {
            "all".to_string()
        } else {
            config.run.only.join(", ")
        }
    );
    info!("  Max redraws:  {}", config.run.max_redraws);
    if let Some(redeploy) = &config.run.redeploy {
        info!("  Redeploy at:  step {}", redeploy.after_steps);
    }
    info!("");

    let env = FuzzEnv::with_seed(seed, config.sale.start_time);
    let mut generator = SequenceGenerator::new(&config, env)?;
    let mut writer = ArtifactWriter::new(&config, seed, steps);
    if let Some(path) = &args.config {
        writer = writer.with_config_file(path);
    }

    match generator.generate(steps) {
        Ok(generated) => {
            let rendered = match args.format {
                Format::Text => {
                    let mut renderer = TextRenderer::new();
                    if args.show_parameters {
                        renderer = renderer.with_parameters();
                    }
                    if args.dump_state {
                        renderer = renderer.with_state_dump();
                    }
                    renderer.render(&generated)?
                }
                Format::Json => JsonLinesRenderer.render(&generated)?,
            };
            match &args.output {
                Some(path) => {
                    tokio::fs::write(path, rendered)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Sequence written to {}", path.display());
                }
                None => print!("{}", rendered),
            }

            if args.save_artifact {
                writer.record_steps(&generated);
                writer.save(&args.artifact_dir).await?;
            }
            Ok(true)
        }
        Err(e) => {
            error!("{}", e);
            writer.record_steps(generator.history());
            writer.set_failure(&e);
            let path = writer.save(&args.artifact_dir).await?;
            print_artifact_summary(&writer.artifact());
            warn!("Failure artifact: {}", path.display());
            Ok(false)
        }
    }
}

fn catalog() {
    let catalog = OperationCatalog::standard();
    println!("{:<16} {:<45} {}", "OPERATION", "MODIFIERS", "EXTRA FAILURE MODES");
    for spec in catalog.list() {
        let mut name = spec.operation.to_string();
        if !spec.drawable {
            name.push('*');
        }
        println!(
            "{:<16} {:<45} {}",
            name,
            join_modes(&spec.required_modifiers),
            join_modes(&spec.extra_failure_modes)
        );
    }
    println!();
    println!("* explicit only, never drawn");
}

fn join_modes(modes: &[FailureMode]) -> String {
    if modes.is_empty() {
        return "-".to_string();
    }
    modes
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

async fn replay(artifact: PathBuf, summary_only: bool) -> Result<bool> {
    let artifact = load_artifact(&artifact).await?;
    print_artifact_summary(&artifact);
    if summary_only {
        return Ok(true);
    }

    let report = verify_replay(&artifact)?;
    info!(
        "Replayed {} of {} recorded steps",
        report.replayed_steps, report.recorded_steps
    );
    if let Some(failure) = &report.replay_failure {
        info!("Replay ended with: {}", failure);
    }
    if report.is_faithful() {
        info!("Replay matches the artifact");
        Ok(true)
    } else {
        error!(
            "Replay diverges from the artifact at step {:?}",
            report.first_divergence
        );
        Ok(false)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let ok = match args.command {
        Command::Generate(generate_args) => generate(generate_args).await?,
        Command::Catalog => {
            catalog();
            true
        }
        Command::Replay {
            artifact,
            summary_only,
        } => replay(artifact, summary_only).await?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
