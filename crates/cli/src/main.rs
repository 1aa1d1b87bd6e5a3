//! Sysguard CLI
//!
//! Offline operator tool for the telemetry anomaly detector: replay
//! recorded samples, inspect artifact bundles and write checksum manifests.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, manifest, replay};
use detector_lib::DetectorConfig;
use std::path::PathBuf;

/// Sysguard telemetry anomaly detector CLI
#[derive(Parser)]
#[command(name = "sysguard")]
#[command(author, version, about = "CLI for the Sysguard telemetry anomaly detector", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a newline-delimited JSON sample file through a detector
    Replay {
        /// Sample file, one JSON object per line
        input: PathBuf,

        /// Artifact bundle directory
        #[arg(long, short, env = "SYSGUARD_ARTIFACT_DIR", default_value = "./artifacts")]
        artifacts: PathBuf,

        /// EWMA smoothing factor, in (0, 1]
        #[arg(long)]
        alpha: Option<f64>,

        /// Require 3 of the last 5 decisions instead of 2 of 3
        #[arg(long)]
        strict: bool,

        /// Show only samples with a debounced anomaly
        #[arg(long)]
        anomalies_only: bool,
    },

    /// Validate and describe an artifact bundle
    Inspect {
        /// Artifact bundle directory
        #[arg(env = "SYSGUARD_ARTIFACT_DIR", default_value = "./artifacts")]
        dir: PathBuf,
    },

    /// Compute SHA256 checksums and write manifest.json
    Manifest {
        /// Artifact bundle directory
        #[arg(env = "SYSGUARD_ARTIFACT_DIR", default_value = "./artifacts")]
        dir: PathBuf,

        /// Training run id recorded in the manifest
        #[arg(long)]
        run_id: Option<String>,
    },
}

fn detector_config(alpha: Option<f64>, strict: bool) -> DetectorConfig {
    let config = if strict {
        DetectorConfig::strict_debounce()
    } else {
        DetectorConfig::default()
    };
    match alpha {
        Some(alpha) => config.with_alpha(alpha),
        None => config,
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Replay {
            input,
            artifacts,
            alpha,
            strict,
            anomalies_only,
        } => {
            let config = detector_config(alpha, strict);
            replay::replay(&artifacts, &input, config, anomalies_only, cli.format)?;
        }
        Commands::Inspect { dir } => {
            inspect::inspect(&dir, cli.format)?;
        }
        Commands::Manifest { dir, run_id } => {
            manifest::manifest(&dir, run_id, cli.format)?;
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_config_flags() {
        assert_eq!(detector_config(None, false), DetectorConfig::default());

        let strict = detector_config(Some(0.2), true);
        assert_eq!(strict.debounce_window, 5);
        assert_eq!(strict.debounce_required, 3);
        assert_eq!(strict.alpha, 0.2);
    }

    #[test]
    fn test_cli_parses_replay() {
        let cli = Cli::try_parse_from([
            "sysguard",
            "replay",
            "samples.ndjson",
            "--artifacts",
            "/tmp/bundle",
            "--strict",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.format, output::OutputFormat::Json);
        match cli.command {
            Commands::Replay {
                input,
                artifacts,
                strict,
                ..
            } => {
                assert_eq!(input, PathBuf::from("samples.ndjson"));
                assert_eq!(artifacts, PathBuf::from("/tmp/bundle"));
                assert!(strict);
            }
            _ => panic!("expected replay"),
        }
    }
}
