//! Replay a recorded sample file through a detector

use anyhow::{Context, Result};
use colored::Colorize;
use detector_lib::{
    apply_line, AnomalyEvent, ArtifactBundle, Detector, DetectorConfig, LineOutcome,
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

use crate::output::{
    color_flag, color_phase, format_score, print_info, print_success, print_table, print_warning,
    OutputFormat,
};

/// Row for the events table
#[derive(Tabled, Serialize)]
struct EventRow {
    #[tabled(rename = "Seq")]
    sequence: u64,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Threshold")]
    threshold: String,
    #[tabled(rename = "Raw")]
    raw: String,
    #[tabled(rename = "Anomaly")]
    anomaly: String,
}

/// Line that did not produce a decision
#[derive(Debug, Clone, Serialize)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: String,
}

/// Outcome of replaying one file
#[derive(Debug, Default, Serialize)]
pub struct ReplayReport {
    pub events: Vec<AnomalyEvent>,
    pub skipped: Vec<SkippedLine>,
    pub resets: usize,
}

impl ReplayReport {
    pub fn raw_anomalies(&self) -> usize {
        self.events.iter().filter(|e| e.raw_anomaly).count()
    }

    pub fn final_anomalies(&self) -> usize {
        self.events.iter().filter(|e| e.final_anomaly).count()
    }
}

/// Run every line of `reader` through `detector`
///
/// Malformed lines and rejected samples are recorded and skipped; a
/// `{"command": "reset"}` line resets the detector.
pub fn replay_lines<R: BufRead>(reader: R, detector: &mut Detector) -> Result<ReplayReport> {
    let mut report = ReplayReport::default();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_number))?;

        match apply_line(detector, &line) {
            LineOutcome::Blank => {}
            LineOutcome::Malformed(e) => report.skipped.push(SkippedLine {
                line: line_number,
                reason: format!("malformed line: {}", e),
            }),
            LineOutcome::Reset => report.resets += 1,
            LineOutcome::Decision { event, .. } => report.events.push(event),
            LineOutcome::Rejected(e) if !e.is_fatal() => report.skipped.push(SkippedLine {
                line: line_number,
                reason: e.to_string(),
            }),
            LineOutcome::Rejected(e) => return Err(e).context("Detector failed"),
        }
    }

    Ok(report)
}

/// Replay `input` through a detector built from the bundle in `artifact_dir`
pub fn replay(
    artifact_dir: &Path,
    input: &Path,
    config: DetectorConfig,
    anomalies_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let artifacts = ArtifactBundle::load_dir(artifact_dir).with_context(|| {
        format!("Failed to load artifacts from {}", artifact_dir.display())
    })?;
    let mut detector =
        Detector::new(Arc::new(artifacts), config).context("Failed to initialize detector")?;

    let file =
        File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let mut report = replay_lines(BufReader::new(file), &mut detector)?;
    if anomalies_only {
        report.events.retain(|e| e.final_anomaly);
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Replay".bold());
            println!("{}", "=".repeat(60));
            println!("Input:     {}", input.display().to_string().cyan());
            println!("Artifacts: {}", artifact_dir.display().to_string().cyan());
            println!();

            let rows: Vec<EventRow> = report
                .events
                .iter()
                .map(|e| EventRow {
                    sequence: e.sequence,
                    phase: color_phase(e.phase),
                    score: format_score(e.score),
                    threshold: format_score(e.threshold_used),
                    raw: color_flag(e.raw_anomaly),
                    anomaly: color_flag(e.final_anomaly),
                })
                .collect();
            print_table(&rows, OutputFormat::Table);

            println!();
            for skipped in &report.skipped {
                print_warning(&format!("line {}: {}", skipped.line, skipped.reason));
            }
            if report.resets > 0 {
                print_info(&format!("Detector reset {} time(s)", report.resets));
            }

            let message = format!(
                "{} decisions, {} raw anomalies, {} debounced anomalies",
                report.events.len(),
                report.raw_anomalies(),
                report.final_anomalies()
            );
            if report.final_anomalies() > 0 {
                print_warning(&message);
            } else {
                print_success(&message);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use detector_lib::{DetectorPhase, FeatureVector, Scorer};
    use std::io::Cursor;

    /// Score = -cpu / 100
    struct CpuScorer;

    impl Scorer for CpuScorer {
        fn score(&self, features: &FeatureVector) -> f64 {
            -features.cpu / 100.0
        }
    }

    fn detector() -> Detector {
        let config = DetectorConfig::default().with_alpha(1.0);
        Detector::with_scorer(Arc::new(CpuScorer), -0.5, config).unwrap()
    }

    fn sample_line(cpu: f64) -> String {
        format!(
            "{{\"cpu\":{},\"memory\":50,\"disk\":60,\"battery\":80,\"gpu\":0}}\n",
            cpu
        )
    }

    #[test]
    fn test_replay_counts_decisions() {
        let mut input = String::new();
        for _ in 0..10 {
            input.push_str(&sample_line(30.0));
        }
        input.push_str(&sample_line(90.0));
        input.push_str(&sample_line(90.0));
        input.push_str("not json\n\n");

        let report = replay_lines(Cursor::new(input), &mut detector()).unwrap();
        assert_eq!(report.events.len(), 12);
        assert_eq!(report.raw_anomalies(), 2);
        assert_eq!(report.final_anomalies(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].line, 13);
        assert_eq!(report.events[0].phase, DetectorPhase::Warming);
    }

    #[test]
    fn test_replay_honors_reset() {
        let mut input = String::new();
        input.push_str(&sample_line(30.0));
        input.push_str(&sample_line(30.0));
        input.push_str("{\"command\":\"reset\"}\n");
        input.push_str(&sample_line(30.0));

        let report = replay_lines(Cursor::new(input), &mut detector()).unwrap();
        assert_eq!(report.resets, 1);
        let sequences: Vec<u64> = report.events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 1]);
    }
}
