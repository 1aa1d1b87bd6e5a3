//! Inspect an artifact bundle

use anyhow::{Context, Result};
use colored::Colorize;
use detector_lib::{ArtifactBundle, FEATURE_NAMES, MANIFEST_FILE};
use tabled::Tabled;

use crate::output::{format_score, print_info, print_success, OutputFormat};
use std::path::Path;

/// Row for the scaler table
#[derive(Tabled)]
struct ScalerRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Scale")]
    scale: String,
}

/// Load, validate and describe the bundle in `dir`
pub fn inspect(dir: &Path, format: OutputFormat) -> Result<()> {
    let bundle = ArtifactBundle::load_dir(dir)
        .with_context(|| format!("Failed to load artifacts from {}", dir.display()))?;
    let summary = bundle.summary();

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summary)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Artifact Bundle".bold());
            println!("{}", "=".repeat(50));
            println!("Directory:        {}", dir.display().to_string().cyan());
            println!(
                "Run ID:           {}",
                summary.run_id.as_deref().unwrap_or("unversioned").cyan()
            );
            println!("Static threshold: {}", format_score(summary.static_threshold));
            println!("Trees:            {}", summary.trees);
            println!("Max samples:      {}", summary.max_samples);
            println!("Total nodes:      {}", summary.total_nodes);
            println!();

            let rows: Vec<ScalerRow> = FEATURE_NAMES
                .iter()
                .zip(summary.scaler_mean.iter().zip(&summary.scaler_scale))
                .map(|(name, (mean, scale))| ScalerRow {
                    feature: name.to_string(),
                    mean: format!("{:.4}", mean),
                    scale: format!("{:.4}", scale),
                })
                .collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!();

            if dir.join(MANIFEST_FILE).exists() {
                print_success("Checksums match manifest");
            } else {
                print_info("No manifest present, checksums not verified");
            }
            print_success("Artifacts are compatible");
        }
    }

    Ok(())
}
