//! Newline-delimited JSON ingest loop
//!
//! Reads one JSON object per line, runs samples through a [`Detector`] and
//! writes one decision record per accepted sample. A line may instead carry
//! a control command (`{"command": "reset"}`). Malformed lines and rejected
//! samples are logged, counted and skipped.

use crate::anomaly::Detector;
use crate::error::DetectorError;
use crate::health::HealthRegistry;
use crate::models::{AnomalyEvent, DetectorPhase, MetricSample};
use crate::observability::{DetectorMetrics, StructuredLogger};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Control commands accepted on the input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    Reset,
}

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InputLine {
    Control { command: ControlCommand },
    Sample(MetricSample),
}

/// What one input line did to a detector
#[derive(Debug)]
pub enum LineOutcome {
    /// Empty or whitespace-only line, not counted
    Blank,
    Malformed(serde_json::Error),
    Reset,
    Decision {
        sample: MetricSample,
        event: AnomalyEvent,
    },
    /// Sample refused by the detector, whose state is unchanged
    Rejected(DetectorError),
}

/// Parse one NDJSON line and apply it to `detector`
pub fn apply_line(detector: &mut Detector, line: &str) -> LineOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineOutcome::Blank;
    }

    match serde_json::from_str(trimmed) {
        Err(e) => LineOutcome::Malformed(e),
        Ok(InputLine::Control {
            command: ControlCommand::Reset,
        }) => {
            detector.reset();
            LineOutcome::Reset
        }
        Ok(InputLine::Sample(sample)) => match detector.process(sample) {
            Ok(event) => LineOutcome::Decision { sample, event },
            Err(e) => LineOutcome::Rejected(e),
        },
    }
}

/// Decision written for every accepted sample
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub processed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AnomalyEvent,
}

/// Counters accumulated over one run of the loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: u64,
    pub processed: u64,
    pub rejected: u64,
    pub malformed: u64,
    pub resets: u64,
    pub final_anomalies: u64,
}

/// Drives a detector from an async line source
pub struct IngestLoop {
    detector: Detector,
    metrics: DetectorMetrics,
    health: HealthRegistry,
    logger: StructuredLogger,
    stats: IngestStats,
    signal_raised: bool,
    last_phase: DetectorPhase,
}

impl IngestLoop {
    pub fn new(
        detector: Detector,
        metrics: DetectorMetrics,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        let last_phase = detector.phase();
        Self {
            detector,
            metrics,
            health,
            logger,
            stats: IngestStats::default(),
            signal_raised: false,
            last_phase,
        }
    }

    /// Consume `reader` until EOF or shutdown, writing decisions to `writer`
    pub async fn run<R, W>(
        mut self,
        reader: R,
        mut writer: W,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<IngestStats>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Starting sample ingest loop");
        self.health.ingest_running().await;
        self.health.report_phase(self.last_phase).await;
        let mut lines = reader.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            info!(lines = self.stats.lines, "Input stream closed");
                            self.health.ingest_closed().await;
                            break;
                        }
                        Err(e) => {
                            self.health.ingest_failed(e.to_string()).await;
                            return Err(e).context("Failed to read input line");
                        }
                    };

                    if let Some(record) = self.handle_line(&line) {
                        let mut out = serde_json::to_vec(&record)
                            .context("Failed to serialize decision")?;
                        out.push(b'\n');
                        writer
                            .write_all(&out)
                            .await
                            .context("Failed to write decision")?;
                        writer.flush().await.context("Failed to flush decision")?;
                    }

                    let phase = self.detector.phase();
                    if phase != self.last_phase {
                        self.health.report_phase(phase).await;
                        self.last_phase = phase;
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down sample ingest loop");
                    break;
                }
            }
        }

        self.logger
            .log_shutdown("ingest finished", self.detector.samples_processed());
        Ok(self.stats)
    }

    /// Parse and apply one input line, returning the decision to emit
    pub fn handle_line(&mut self, line: &str) -> Option<DecisionRecord> {
        let start = Instant::now();
        let outcome = apply_line(&mut self.detector, line);
        if !matches!(outcome, LineOutcome::Blank) {
            self.stats.lines += 1;
        }

        match outcome {
            LineOutcome::Blank => None,
            LineOutcome::Malformed(e) => {
                self.stats.malformed += 1;
                self.metrics.inc_lines_malformed();
                self.logger
                    .log_rejected_sample(self.stats.lines, &format!("malformed line: {}", e));
                None
            }
            LineOutcome::Reset => {
                self.signal_raised = false;
                self.stats.resets += 1;
                self.metrics.set_history_length(0);
                info!(line = self.stats.lines, "Detector reset on request");
                None
            }
            LineOutcome::Rejected(e) => {
                if e.is_fatal() {
                    // construction-time errors cannot surface from `process`
                    warn!(error = %e, "Unexpected detector error");
                } else {
                    self.metrics.inc_samples_rejected();
                    self.logger.log_rejected_sample(self.stats.lines, &e.to_string());
                }
                self.stats.rejected += 1;
                None
            }
            LineOutcome::Decision { sample, event } => {
                self.stats.processed += 1;
                self.metrics.observe_event(
                    &event,
                    self.detector.history_len(),
                    start.elapsed().as_secs_f64(),
                );

                if event.final_anomaly {
                    self.stats.final_anomalies += 1;
                    if !self.signal_raised {
                        self.logger.log_anomaly(&sample, &event);
                    }
                } else if self.signal_raised {
                    self.logger.log_anomaly_cleared(&event);
                }
                if event.raw_anomaly && !event.final_anomaly {
                    debug!(
                        sequence = event.sequence,
                        score = event.score,
                        threshold = event.threshold_used,
                        "Raw anomaly suppressed by debouncer"
                    );
                }
                self.signal_raised = event.final_anomaly;

                Some(DecisionRecord {
                    processed_at: Utc::now(),
                    event,
                })
            }
        }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }
}
