//! Request handlers

use super::AppState;
use crate::case_manager::{InvestigationReport, InvestigationRequest};
use crate::error::{AppError, AppResult};
use crate::metrics::Stage;
use crate::types::{FraudAlert, Severity, ThreatResponse, TransactionRecord};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: DateTime<Utc>,
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Vigilant Sentinel Anti-Fraud API",
        "status": "operational",
        "timestamp": Utc::now(),
    }))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

#[derive(Serialize)]
pub struct StageStatus {
    agent_name: &'static str,
    stage: Stage,
    status: &'static str,
    last_activity: String,
    processed_count: u64,
    error_count: u64,
}

#[derive(Serialize)]
pub struct StatusResponse {
    system_status: &'static str,
    agents: Vec<StageStatus>,
    active_alerts: usize,
    connected_observers: usize,
    timestamp: DateTime<Utc>,
}

fn stage_title(stage: Stage) -> &'static str {
    match stage {
        Stage::FraudDetection => "Fraud Detection Agent",
        Stage::ThreatResponse => "Threat Response Agent",
        Stage::CaseManager => "Case Manager Agent",
    }
}

/// Per-stage counters and active alert count
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.pipeline.status();
    let agents = status
        .metrics
        .stages
        .iter()
        .map(|(stage, counters)| StageStatus {
            agent_name: stage_title(*stage),
            stage: *stage,
            status: "active",
            last_activity: counters
                .last_activity
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "Never".to_string()),
            processed_count: counters.processed,
            error_count: counters.errors,
        })
        .collect();

    Json(StatusResponse {
        system_status: "operational",
        agents,
        active_alerts: status.active_alerts,
        connected_observers: status.observers,
        timestamp: Utc::now(),
    })
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    status: &'static str,
    transaction_id: String,
    message: &'static str,
    alert_generated: bool,
    risk_score: f64,
    severity: Severity,
    timestamp: DateTime<Utc>,
}

/// Score a transaction synchronously and queue it for background processing
pub async fn analyze_transaction(
    State(state): State<AppState>,
    Json(record): Json<TransactionRecord>,
) -> AppResult<Json<AnalyzeResponse>> {
    record.validate().map_err(AppError::ValidationError)?;
    info!(transaction_id = %record.id, "Transaction submitted");

    let alert = state.pipeline.submit(record).await;

    Ok(Json(AnalyzeResponse {
        status: "accepted",
        transaction_id: alert.transaction_id,
        message: "Transaction submitted for fraud analysis",
        alert_generated: true,
        risk_score: alert.risk_score,
        severity: alert.severity,
        timestamp: Utc::now(),
    }))
}

#[derive(Serialize)]
pub struct AlertList {
    alerts: Vec<FraudAlert>,
    count: usize,
    timestamp: DateTime<Utc>,
}

pub async fn list_alerts(State(state): State<AppState>) -> Json<AlertList> {
    let alerts = state.pipeline.alerts();
    Json(AlertList {
        count: alerts.len(),
        alerts,
        timestamp: Utc::now(),
    })
}

#[derive(Serialize)]
pub struct RespondResponse {
    status: &'static str,
    alert_id: String,
    message: &'static str,
    response_details: ThreatResponse,
    timestamp: DateTime<Utc>,
}

/// Run the response protocol for a stored alert
pub async fn respond_to_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
) -> AppResult<Json<RespondResponse>> {
    let response = state.pipeline.respond(&alert_id).await?;

    Ok(Json(RespondResponse {
        status: "success",
        alert_id,
        message: "Automated threat response executed",
        response_details: response,
        timestamp: Utc::now(),
    }))
}

pub async fn investigate_case(
    State(state): State<AppState>,
    Json(request): Json<InvestigationRequest>,
) -> Json<InvestigationReport> {
    Json(state.pipeline.investigate(request).await)
}

/// Analytics computed from the live metrics
pub async fn dashboard(State(state): State<AppState>) -> Json<Value> {
    let status = state.pipeline.status();
    let metrics = &status.metrics;
    let count = |s: Severity| metrics.alerts_by_severity.get(&s).copied().unwrap_or(0);

    let performance: serde_json::Map<String, Value> = metrics
        .stages
        .iter()
        .map(|(stage, counters)| {
            (
                stage.as_str().to_string(),
                json!({
                    "processed": counters.processed,
                    "errors": counters.errors,
                    "error_rate": counters.error_rate(),
                }),
            )
        })
        .collect();

    let detection = metrics.stages.get(&Stage::FraudDetection).copied();
    let analysed = detection.map(|d| d.processed).unwrap_or(0);
    let flagged = count(Severity::Critical) + count(Severity::High) + count(Severity::Medium);
    let detection_rate = if analysed > 0 {
        flagged as f64 / analysed as f64
    } else {
        0.0
    };

    Json(json!({
        "transaction_volume": {
            "analysed_total": analysed,
            "throughput_per_sec": metrics.throughput,
            "uptime_secs": metrics.uptime_secs,
        },
        "fraud_detection": {
            "active_alerts": status.active_alerts,
            "flagged_alerts": flagged,
            "detection_rate": detection_rate,
        },
        "risk_distribution": {
            "critical": count(Severity::Critical),
            "high": count(Severity::High),
            "medium": count(Severity::Medium),
            "low": count(Severity::Low),
        },
        "score_distribution": metrics.score_distribution,
        "response_times": metrics.processing,
        "agent_performance": performance,
        "timestamp": Utc::now(),
    }))
}

/// Generate a random transaction and push it through the pipeline
pub async fn generate_transaction(State(state): State<AppState>) -> Json<Value> {
    let record = state.generator.lock().generate();
    info!(transaction_id = %record.id, "Generating test transaction");

    let alert = state.pipeline.submit_and_announce(record.clone()).await;

    Json(json!({
        "status": "generated",
        "transaction": record,
        "alert": {
            "risk_score": alert.risk_score,
            "severity": alert.severity,
            "risk_factors": alert.risk_factors,
        },
        "timestamp": Utc::now(),
    }))
}
