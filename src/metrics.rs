//! Per-stage counters and pipeline statistics.

use crate::types::Severity;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Processing-time samples kept before the oldest half is discarded
const MAX_TIME_SAMPLES: usize = 10_000;

/// Pipeline stage owning a set of counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FraudDetection,
    ThreatResponse,
    CaseManager,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::FraudDetection, Stage::ThreatResponse, Stage::CaseManager];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::FraudDetection => "fraud_detection",
            Stage::ThreatResponse => "threat_response",
            Stage::CaseManager => "case_manager",
        }
    }
}

/// Monotonic counters of one stage
#[derive(Default)]
pub struct StageMetrics {
    processed: AtomicU64,
    errors: AtomicU64,
    last_activity: RwLock<Option<DateTime<Utc>>>,
}

impl StageMetrics {
    fn record(&self, failed: bool) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        *self.last_activity.write() = Some(Utc::now());
    }

    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_activity: *self.last_activity.read(),
        }
    }
}

/// Point-in-time copy of a stage's counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageSnapshot {
    pub processed: u64,
    pub errors: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

impl StageSnapshot {
    pub fn error_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.errors as f64 / self.processed as f64
        }
    }
}

/// Metrics shared by every worker and handler
pub struct PipelineMetrics {
    fraud_detection: StageMetrics,
    threat_response: StageMetrics,
    case_manager: StageMetrics,
    /// Alerts by severity
    alerts_by_severity: RwLock<BTreeMap<Severity, u64>>,
    /// Analysis times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Risk score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            fraud_detection: StageMetrics::default(),
            threat_response: StageMetrics::default(),
            case_manager: StageMetrics::default(),
            alerts_by_severity: RwLock::new(BTreeMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    pub fn stage(&self, stage: Stage) -> &StageMetrics {
        match stage {
            Stage::FraudDetection => &self.fraud_detection,
            Stage::ThreatResponse => &self.threat_response,
            Stage::CaseManager => &self.case_manager,
        }
    }

    /// Count a completed unit of work for `stage`
    pub fn record_success(&self, stage: Stage) {
        self.stage(stage).record(false);
    }

    /// Count a failed unit of work; it still counts as processed
    pub fn record_failure(&self, stage: Stage) {
        self.stage(stage).record(true);
    }

    /// Record an alert produced by the analysis stage
    pub fn record_alert(&self, severity: Severity, risk_score: f64, processing_time: Duration) {
        *self.alerts_by_severity.write().entry(severity).or_insert(0) += 1;

        let bucket = (risk_score.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        self.score_buckets.write()[bucket] += 1;

        let mut times = self.processing_times.write();
        times.push(processing_time.as_micros() as u64);
        if times.len() > MAX_TIME_SAMPLES {
            times.drain(0..MAX_TIME_SAMPLES / 2);
        }
    }

    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = self.processing_times.read().clone();
        if sorted.is_empty() {
            return ProcessingStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.50),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Analysed transactions per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.fraud_detection.processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        *self.score_buckets.read()
    }

    /// Alert counts for every tier, including empty ones
    pub fn get_alerts_by_severity(&self) -> BTreeMap<Severity, u64> {
        let recorded = self.alerts_by_severity.read();
        Severity::ALL
            .iter()
            .map(|s| (*s, recorded.get(s).copied().unwrap_or(0)))
            .collect()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            stages: Stage::ALL
                .iter()
                .map(|s| (*s, self.stage(*s).snapshot()))
                .collect(),
            alerts_by_severity: self.get_alerts_by_severity(),
            score_distribution: self.get_score_distribution(),
            processing: self.get_processing_stats(),
            throughput: self.get_throughput(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let detection = snapshot.stages[&Stage::FraudDetection];
        let response = snapshot.stages[&Stage::ThreatResponse];
        let cases = snapshot.stages[&Stage::CaseManager];

        info!(
            analysed = detection.processed,
            analysis_errors = detection.errors,
            responses = response.processed,
            response_errors = response.errors,
            investigations = cases.processed,
            throughput = format!("{:.1} tx/s", snapshot.throughput),
            "Pipeline metrics summary"
        );
        info!(
            mean_us = snapshot.processing.mean_us,
            p50_us = snapshot.processing.p50_us,
            p95_us = snapshot.processing.p95_us,
            p99_us = snapshot.processing.p99_us,
            max_us = snapshot.processing.max_us,
            "Analysis latency"
        );

        let total: u64 = snapshot.alerts_by_severity.values().sum();
        for (severity, count) in &snapshot.alerts_by_severity {
            let pct = if total > 0 {
                (*count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            info!(severity = %severity, count, pct = format!("{pct:.1}%"), "Alerts by severity");
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Everything the status and dashboard endpoints report
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub stages: BTreeMap<Stage, StageSnapshot>,
    pub alerts_by_severity: BTreeMap<Severity, u64>,
    pub score_distribution: [u64; 10],
    pub processing: ProcessingStats,
    pub throughput: f64,
    pub uptime_secs: u64,
}

/// Periodically logs a metrics summary until cancelled
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        // First tick completes immediately
        interval.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => self.metrics.print_summary(),
            }
        }
    }
}
