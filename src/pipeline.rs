//! Pipeline orchestration: two FIFO queues and the workers draining them.
//!
//! ```text
//! transaction -> ingestion queue -> [analysis] -> store + broadcast -> alert queue
//! alert queue -> [response] -> broadcast -> metrics
//! ```
//!
//! All shared state lives in one [`PipelineContext`] handed to every worker
//! and request handler. CPU-bound analysis and response work runs on the
//! blocking pool; a failure there (a panic surfacing as a join error) falls
//! back to the minimal rule set so callers always get a valid result.

use crate::analysis::{fallback_alert, DetectionEngine};
use crate::broadcast::Broadcaster;
use crate::case_manager::{
    CaseManager, InvestigationReport, InvestigationRequest, InvestigationStatus, RequestType,
};
use crate::metrics::{MetricsSnapshot, PipelineMetrics, Stage};
use crate::narrative::{narrate_or_sentinel, Narrator};
use crate::response::{response_prompt, ResponseExecutor};
use crate::store::AlertStore;
use crate::types::alert::CRITICAL_THRESHOLD;
use crate::types::{FraudAlert, Notification, ResponseStatus, ThreatResponse, TransactionRecord};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("alert {0} not found")]
    AlertNotFound(String),

    #[error("{0} queue is closed")]
    QueueClosed(&'static str),
}

/// Shared state of the running pipeline
pub struct PipelineContext {
    pub engine: DetectionEngine,
    pub executor: ResponseExecutor,
    pub narrator: Arc<dyn Narrator>,
    pub store: AlertStore,
    pub broadcaster: Broadcaster,
    pub case_manager: CaseManager,
    pub metrics: Arc<PipelineMetrics>,
}

impl PipelineContext {
    pub fn new(
        engine: DetectionEngine,
        executor: ResponseExecutor,
        narrator: Arc<dyn Narrator>,
        store: AlertStore,
        case_manager: CaseManager,
    ) -> Self {
        Self {
            engine,
            executor,
            narrator,
            store,
            broadcaster: Broadcaster::new(),
            case_manager,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Score a transaction and build its alert.
    async fn analyze(self: &Arc<Self>, record: &TransactionRecord) -> FraudAlert {
        let start = Instant::now();
        let ctx = Arc::clone(self);
        let input = record.clone();

        let alert = match tokio::task::spawn_blocking(move || ctx.engine.assess(&input)).await {
            Ok(assessment) => {
                let prompt = assessment.analysis_prompt(record);
                let narrative = narrate_or_sentinel(self.narrator.as_ref(), &prompt).await;
                self.metrics.record_success(Stage::FraudDetection);
                assessment.into_alert(narrative)
            }
            Err(e) => {
                error!(
                    transaction_id = %record.id,
                    error = %e,
                    "Analysis failed, using fallback rules"
                );
                self.metrics.record_failure(Stage::FraudDetection);
                fallback_alert(record)
            }
        };

        self.metrics
            .record_alert(alert.severity, alert.risk_score, start.elapsed());
        info!(
            transaction_id = %alert.transaction_id,
            risk_score = alert.risk_score,
            severity = %alert.severity,
            factors = alert.risk_factors.len(),
            "Fraud alert generated"
        );
        alert
    }

    /// Execute the response protocol for an alert and broadcast the result.
    async fn respond(self: &Arc<Self>, alert: &FraudAlert) -> ThreatResponse {
        let start = Instant::now();
        let ctx = Arc::clone(self);
        let input = alert.clone();

        let prompt = response_prompt(alert);
        let (narrative, outcome) = tokio::join!(
            narrate_or_sentinel(self.narrator.as_ref(), &prompt),
            tokio::task::spawn_blocking(move || ctx.executor.execute(&input)),
        );
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(outcome) => {
                self.metrics.record_success(Stage::ThreatResponse);
                ThreatResponse::new(
                    alert.alert_id(),
                    outcome.actions_taken,
                    ResponseStatus::Completed,
                    elapsed_ms,
                    narrative,
                )
            }
            Err(e) => {
                error!(
                    alert_id = %alert.alert_id(),
                    error = %e,
                    "Response failed, using fallback protocol"
                );
                self.metrics.record_failure(Stage::ThreatResponse);
                self.executor.fallback(alert, elapsed_ms)
            }
        };

        info!(
            alert_id = %response.alert_id,
            actions = response.actions_taken.len(),
            status = ?response.status,
            response_time_ms = response.response_time_ms,
            "Threat response executed"
        );
        self.broadcaster
            .broadcast(&Notification::ThreatResponse(response.clone()));

        if alert.risk_score >= CRITICAL_THRESHOLD {
            self.escalate(alert).await;
        }
        response
    }

    /// Hand a critical alert to the case manager
    async fn escalate(self: &Arc<Self>, alert: &FraudAlert) {
        info!(alert_id = %alert.alert_id(), "Escalating critical alert to case manager");
        let request = InvestigationRequest {
            case_id: format!("case_{}", alert.alert_id()),
            request_type: RequestType::TransactionAnalysis,
            data: serde_json::to_value(alert).unwrap_or_default(),
        };
        self.investigate(request).await;
    }

    async fn investigate(self: &Arc<Self>, request: InvestigationRequest) -> InvestigationReport {
        let ctx = Arc::clone(self);
        let input = request.clone();

        match tokio::task::spawn_blocking(move || ctx.case_manager.assist(&input)).await {
            Ok(report) => {
                if report.status == InvestigationStatus::Error {
                    self.metrics.record_failure(Stage::CaseManager);
                } else {
                    self.metrics.record_success(Stage::CaseManager);
                }
                report
            }
            Err(e) => {
                error!(case_id = %request.case_id, error = %e, "Investigation task failed");
                self.metrics.record_failure(Stage::CaseManager);
                InvestigationReport::degraded(&request)
            }
        }
    }
}

/// Current status of the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub metrics: MetricsSnapshot,
    pub active_alerts: usize,
    pub observers: usize,
}

/// Handle to the running pipeline.
///
/// Cheap to clone; every clone feeds the same ingestion queue.
#[derive(Clone)]
pub struct Pipeline {
    ctx: Arc<PipelineContext>,
    ingest: mpsc::UnboundedSender<TransactionRecord>,
}

/// Join handles of the two worker loops
pub struct PipelineWorkers {
    ingestion: JoinHandle<()>,
    response: JoinHandle<()>,
}

impl PipelineWorkers {
    /// Wait for both workers to exit
    pub async fn join(self) {
        if let Err(e) = self.ingestion.await {
            error!(error = %e, "Ingestion worker terminated abnormally");
        }
        if let Err(e) = self.response.await {
            error!(error = %e, "Response worker terminated abnormally");
        }
    }
}

impl Pipeline {
    /// Spawn the ingestion and response workers.
    ///
    /// Workers stop once `shutdown` is cancelled, after finishing the unit
    /// they are processing.
    pub fn start(ctx: PipelineContext, shutdown: CancellationToken) -> (Self, PipelineWorkers) {
        let ctx = Arc::new(ctx);
        let (ingest_tx, ingest_rx) = mpsc::unbounded_channel();
        let (alert_tx, alert_rx) = mpsc::unbounded_channel();

        let ingestion = tokio::spawn(ingestion_worker(
            ctx.clone(),
            ingest_rx,
            alert_tx,
            shutdown.clone(),
        ));
        let response = tokio::spawn(response_worker(ctx.clone(), alert_rx, shutdown));

        info!("Pipeline workers started");
        (
            Self {
                ctx,
                ingest: ingest_tx,
            },
            PipelineWorkers {
                ingestion,
                response,
            },
        )
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    /// Queue a transaction for asynchronous processing
    pub fn enqueue(&self, record: TransactionRecord) -> Result<(), PipelineError> {
        self.ingest
            .send(record)
            .map_err(|_| PipelineError::QueueClosed("ingestion"))
    }

    /// Analyse a transaction synchronously and store its alert.
    ///
    /// The record is then also queued, so the ingestion worker analyses it a
    /// second time, overwrites the stored alert, broadcasts it and triggers
    /// the response. Callers get the fast-path alert immediately.
    pub async fn submit(&self, record: TransactionRecord) -> FraudAlert {
        let alert = self.ctx.analyze(&record).await;
        self.ctx.store.insert(alert.clone());
        debug!(transaction_id = %record.id, active_alerts = self.ctx.store.len(), "Alert stored");

        if let Err(e) = self.enqueue(record) {
            warn!(
                transaction_id = %alert.transaction_id,
                error = %e,
                "Background processing unavailable"
            );
        }
        alert
    }

    /// Like [`Pipeline::submit`], but also broadcasts the fast-path alert
    pub async fn submit_and_announce(&self, record: TransactionRecord) -> FraudAlert {
        let alert = self.submit(record).await;
        self.ctx
            .broadcaster
            .broadcast(&Notification::FraudAlert(alert.clone()));
        alert
    }

    /// Run the response protocol for a stored alert.
    ///
    /// Unknown ids fail with [`PipelineError::AlertNotFound`] and change
    /// nothing.
    pub async fn respond(&self, alert_id: &str) -> Result<ThreatResponse, PipelineError> {
        let alert = self
            .ctx
            .store
            .get(alert_id)
            .ok_or_else(|| PipelineError::AlertNotFound(alert_id.to_string()))?;
        Ok(self.ctx.respond(&alert).await)
    }

    pub async fn investigate(&self, request: InvestigationRequest) -> InvestigationReport {
        self.ctx.investigate(request).await
    }

    pub fn alerts(&self) -> Vec<FraudAlert> {
        self.ctx.store.list()
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            metrics: self.ctx.metrics.snapshot(),
            active_alerts: self.ctx.store.len(),
            observers: self.ctx.broadcaster.observer_count(),
        }
    }
}

async fn ingestion_worker(
    ctx: Arc<PipelineContext>,
    mut queue: mpsc::UnboundedReceiver<TransactionRecord>,
    alerts: mpsc::UnboundedSender<FraudAlert>,
    shutdown: CancellationToken,
) {
    loop {
        let record = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = queue.recv() => match next {
                Some(record) => record,
                None => break,
            },
        };

        debug!(transaction_id = %record.id, "Processing queued transaction");
        let alert = ctx.analyze(&record).await;
        ctx.store.insert(alert.clone());
        ctx.broadcaster
            .broadcast(&Notification::FraudAlert(alert.clone()));

        if alerts.send(alert).is_err() {
            warn!(transaction_id = %record.id, "Alert queue closed, response skipped");
        }
    }
    info!("Ingestion worker stopped");
}

async fn response_worker(
    ctx: Arc<PipelineContext>,
    mut queue: mpsc::UnboundedReceiver<FraudAlert>,
    shutdown: CancellationToken,
) {
    loop {
        let alert = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = queue.recv() => match next {
                Some(alert) => alert,
                None => break,
            },
        };

        debug!(alert_id = %alert.alert_id(), "Processing queued alert");
        ctx.respond(&alert).await;
    }
    info!("Response worker stopped");
}
