//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use detector_lib::DetectorPhase;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format an outlier score or threshold
pub fn format_score(score: f64) -> String {
    format!("{:.4}", score)
}

/// Color phase based on value
pub fn color_phase(phase: DetectorPhase) -> String {
    match phase {
        DetectorPhase::Cold => phase.as_str().blue().to_string(),
        DetectorPhase::Warming => phase.as_str().yellow().to_string(),
        DetectorPhase::Steady => phase.as_str().green().to_string(),
    }
}

/// Render an anomaly flag, highlighting raised ones
pub fn color_flag(flag: bool) -> String {
    if flag {
        "yes".red().bold().to_string()
    } else {
        "no".to_string()
    }
}
