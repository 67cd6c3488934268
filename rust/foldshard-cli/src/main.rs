// rust/foldshard-cli/src/main.rs

//! foldshard command-line front-end
//!
//! Splits clustered amino-acid records into train/validate/test sets and
//! writes each split as checksummed shard files.
//!
//! # Usage
//!
//! ```bash
//! # Split clusters and write the assignment file
//! foldshard --config foldshard.toml split
//!
//! # Write shards and the manifest from the assignment file
//! foldshard --config foldshard.toml write --workers 16
//!
//! # Both, followed by verification
//! foldshard --config foldshard.toml run --verify
//!
//! # Re-check an existing output directory
//! foldshard verify --output ./shards
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foldshard_core::{Pipeline, PipelineConfig};

/// Cluster-aware dataset splitting and sharding
#[derive(Parser, Debug)]
#[command(name = "foldshard")]
#[command(about = "Cluster-aware train/validate/test splitting and sharded serialization")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Settings that take precedence over the config file and environment.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Split seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Worker threads per split
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Maximum records per shard
    #[arg(long, global = true)]
    shard_limit: Option<usize>,

    /// Output directory
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

impl Overrides {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(seed) = self.seed {
            config.split.seed = seed;
        }
        if let Some(workers) = self.workers {
            config.writer.worker_count = Some(workers);
        }
        if let Some(limit) = self.shard_limit {
            config.writer.shard_record_limit = limit;
        }
        if let Some(output) = &self.output {
            config.writer.output_dir = output.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split clusters and write the split assignment file
    Split,

    /// Write shards and the manifest from the split assignment file
    Write,

    /// Split, then write shards and the manifest
    Run {
        /// Verify record counts after writing
        #[arg(long)]
        verify: bool,
    },

    /// Verify an output directory against its manifest
    Verify,
}

fn load_config(cli: &Cli) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides();
    cli.overrides.apply(&mut config);
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&cli)?;
    tracing::info!("Starting foldshard {:?}", cli.command);
    tracing::info!("  Base path: {}", config.storage.base_path.display());
    tracing::info!("  Output: {}", config.writer.output_dir.display());

    let pipeline = Pipeline::from_config(config)?;

    match cli.command {
        Command::Split => {
            let outcome = pipeline.split()?;
            print!("{}", outcome.report);
        }
        Command::Write => {
            let manifest = pipeline.write_from_assignment()?;
            println!(
                "wrote {} records to {}",
                manifest.total_records,
                pipeline.config().writer.output_dir.display()
            );
        }
        Command::Run { verify } => {
            let build = pipeline.run(verify)?;
            print!("{}", build.report);
            if let Some(verification) = build.verification {
                print!("{verification}");
            }
        }
        Command::Verify => {
            let report = pipeline.verify()?;
            print!("{report}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "foldshard",
            "run",
            "--verify",
            "--seed",
            "42",
            "--workers",
            "4",
            "--shard-limit",
            "500",
            "--output",
            "/tmp/out",
        ]);
        assert!(matches!(cli.command, Command::Run { verify: true }));

        let mut config = PipelineConfig::default();
        cli.overrides.apply(&mut config);
        assert_eq!(config.split.seed, 42);
        assert_eq!(config.writer.worker_count, Some(4));
        assert_eq!(config.writer.shard_record_limit, 500);
        assert_eq!(config.writer.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_overrides_keep_config_values() {
        let cli = Cli::parse_from(["foldshard", "--config", "f.toml", "split"]);
        assert_eq!(cli.config, Some(PathBuf::from("f.toml")));
        assert_eq!(cli.log_level, "info");

        let mut config = PipelineConfig::default();
        config.split.seed = 9;
        cli.overrides.apply(&mut config);
        assert_eq!(config.split.seed, 9);
        assert_eq!(config.writer.shard_record_limit, 1000);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
