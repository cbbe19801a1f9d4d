//! End-to-end pipeline scenarios

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use vigilant_sentinel::analysis::engine::FALLBACK_ALERT_NARRATIVE;
use vigilant_sentinel::analysis::{DetectionEngine, DetectionRules, FixedVelocity, VelocitySource};
use vigilant_sentinel::case_manager::CaseManager;
use vigilant_sentinel::metrics::Stage;
use vigilant_sentinel::narrative::{
    NarrativeError, Narrator, StaticNarrator, NARRATIVE_ERROR_SENTINEL,
};
use vigilant_sentinel::pipeline::{Pipeline, PipelineContext, PipelineError, PipelineWorkers};
use vigilant_sentinel::response::actions::{AlertChannel, EventSeverity, VerificationKind};
use vigilant_sentinel::response::executor::FALLBACK_ACTION;
use vigilant_sentinel::response::{
    ActionBackend, ActionError, ActionRecord, InMemoryActions, ResponseExecutor,
};
use vigilant_sentinel::store::AlertStore;
use vigilant_sentinel::types::{Notification, ResponseStatus, Severity, TransactionRecord};

struct FailingNarrator;

#[async_trait]
impl Narrator for FailingNarrator {
    async fn complete(&self, _prompt: &str) -> Result<String, NarrativeError> {
        Err(NarrativeError::Status(503))
    }
}

/// Holds every completion until released
struct GatedNarrator {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl Narrator for GatedNarrator {
    async fn complete(&self, _prompt: &str) -> Result<String, NarrativeError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("released".to_string())
    }
}

struct PanickingVelocity;

impl VelocitySource for PanickingVelocity {
    fn recent_count(&self, _record: &TransactionRecord) -> u32 {
        panic!("velocity store unavailable");
    }
}

/// Panics on blocking; every other action is delegated
struct BrokenBlocking(InMemoryActions);

impl ActionBackend for BrokenBlocking {
    fn block_transaction(&self, _: &str, _: &str) -> Result<ActionRecord, ActionError> {
        panic!("payment gateway unreachable");
    }

    fn freeze_account(
        &self,
        user_id: &str,
        hours: u32,
        reason: &str,
    ) -> Result<ActionRecord, ActionError> {
        self.0.freeze_account(user_id, hours, reason)
    }

    fn send_fraud_alert(
        &self,
        user_id: &str,
        channel: AlertChannel,
        message: &str,
    ) -> Result<ActionRecord, ActionError> {
        self.0.send_fraud_alert(user_id, channel, message)
    }

    fn require_verification(
        &self,
        user_id: &str,
        kind: VerificationKind,
        reason: &str,
    ) -> Result<ActionRecord, ActionError> {
        self.0.require_verification(user_id, kind, reason)
    }

    fn log_security_event(
        &self,
        event_type: &str,
        severity: EventSeverity,
        details: &serde_json::Value,
    ) -> Result<ActionRecord, ActionError> {
        self.0.log_security_event(event_type, severity, details)
    }
}

struct Harness {
    pipeline: Pipeline,
    workers: PipelineWorkers,
    token: CancellationToken,
}

impl Harness {
    fn start(
        velocity: Arc<dyn VelocitySource>,
        backend: Arc<dyn ActionBackend>,
        narrator: Arc<dyn Narrator>,
    ) -> Self {
        let ctx = PipelineContext::new(
            DetectionEngine::new(DetectionRules::default(), velocity),
            ResponseExecutor::new(backend),
            narrator,
            AlertStore::unbounded(),
            CaseManager::seeded(7),
        );
        let token = CancellationToken::new();
        let (pipeline, workers) = Pipeline::start(ctx, token.clone());
        Self {
            pipeline,
            workers,
            token,
        }
    }

    fn with_velocity(count: u32) -> Self {
        Self::start(
            Arc::new(FixedVelocity(count)),
            Arc::new(InMemoryActions::new()),
            Arc::new(StaticNarrator::new("analyst notes")),
        )
    }

    async fn stop(self) {
        self.token.cancel();
        self.workers.join().await;
    }
}

fn critical_transaction(id: &str) -> TransactionRecord {
    TransactionRecord::new(id, "user_crit", 6000.0)
        .with_location("Unknown")
        .with_device("unknown")
        .with_timestamp("2024-01-15T02:00:00")
}

#[tokio::test]
async fn critical_transaction_gets_full_protocol() {
    let harness = Harness::with_velocity(6);

    let alert = harness.pipeline.submit(critical_transaction("tx_crit")).await;
    assert_eq!(alert.risk_score, 1.0);
    assert_eq!(alert.severity, Severity::Critical);

    let response = harness.pipeline.respond("tx_crit").await.unwrap();
    assert_eq!(response.status, ResponseStatus::Completed);
    assert_eq!(
        response.actions_taken,
        vec![
            "Blocked transaction tx_crit".to_string(),
            "Froze account user_crit for 24 hours".to_string(),
            "Sent urgent fraud alert to user_crit".to_string(),
            "Logged critical security event".to_string(),
        ]
    );

    harness.stop().await;
}

#[tokio::test]
async fn ordinary_transaction_is_only_logged() {
    let harness = Harness::with_velocity(1);

    let alert = harness
        .pipeline
        .submit(TransactionRecord::new("tx_low", "user_low", 50.0))
        .await;
    assert_eq!(alert.risk_score, 0.0);
    assert_eq!(alert.severity, Severity::Low);
    assert!(alert.risk_factors.is_empty());

    let response = harness.pipeline.respond("tx_low").await.unwrap();
    assert_eq!(
        response.actions_taken,
        vec!["Logged low-risk security event".to_string()]
    );

    harness.stop().await;
}

#[tokio::test]
async fn responding_to_unknown_alert_changes_nothing() {
    let harness = Harness::with_velocity(0);

    let err = harness.pipeline.respond("nope").await.unwrap_err();
    let PipelineError::AlertNotFound(id) = err else {
        panic!("expected a not-found error");
    };
    assert_eq!(id, "nope");

    let status = harness.pipeline.status();
    assert_eq!(status.active_alerts, 0);
    assert_eq!(status.metrics.stages[&Stage::ThreatResponse].processed, 0);
    assert!(harness.pipeline.alerts().is_empty());

    harness.stop().await;
}

#[tokio::test]
async fn narrative_failure_uses_sentinel_without_touching_score() {
    let harness = Harness::start(
        Arc::new(FixedVelocity(6)),
        Arc::new(InMemoryActions::new()),
        Arc::new(FailingNarrator),
    );

    let alert = harness.pipeline.submit(critical_transaction("tx_quiet")).await;
    assert_eq!(alert.narrative, NARRATIVE_ERROR_SENTINEL);
    assert_eq!(alert.risk_score, 1.0);

    let response = harness.pipeline.respond("tx_quiet").await.unwrap();
    assert_eq!(response.narrative, NARRATIVE_ERROR_SENTINEL);
    assert_eq!(response.actions_taken.len(), 4);

    harness.stop().await;
}

#[tokio::test]
async fn concurrent_submissions_are_all_stored() {
    let harness = Harness::with_velocity(0);

    let submissions = (0..32).map(|i| {
        let pipeline = harness.pipeline.clone();
        let record = TransactionRecord::new(format!("tx_{i}"), "user_many", 120.0);
        async move { pipeline.submit(record).await }
    });
    let alerts = futures::future::join_all(submissions).await;

    assert_eq!(alerts.len(), 32);
    assert_eq!(harness.pipeline.alerts().len(), 32);

    harness.stop().await;
}

#[tokio::test]
async fn resubmitting_keeps_one_alert_per_transaction() {
    let harness = Harness::with_velocity(0);

    harness
        .pipeline
        .submit(TransactionRecord::new("tx_dup", "user_dup", 75.5))
        .await;
    harness
        .pipeline
        .submit(TransactionRecord::new("tx_dup", "user_dup", 75.5))
        .await;

    let alerts = harness.pipeline.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].transaction_id, "tx_dup");

    harness.stop().await;
}

#[tokio::test]
async fn queued_transaction_reaches_observers() {
    let harness = Harness::with_velocity(6);
    let (_, mut observer) = harness.pipeline.context().broadcaster.subscribe();

    harness.pipeline.enqueue(critical_transaction("tx_async")).unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), observer.recv())
        .await
        .unwrap()
        .unwrap();
    let Notification::FraudAlert(alert) = first else {
        panic!("expected a fraud alert first");
    };
    assert_eq!(alert.transaction_id, "tx_async");

    let second = tokio::time::timeout(Duration::from_secs(5), observer.recv())
        .await
        .unwrap()
        .unwrap();
    let Notification::ThreatResponse(response) = second else {
        panic!("expected a threat response second");
    };
    assert_eq!(response.alert_id, "tx_async");
    assert!(harness.pipeline.context().store.contains("tx_async"));

    harness.stop().await;
}

#[tokio::test]
async fn analysis_failure_falls_back_to_minimal_rules() {
    let harness = Harness::start(
        Arc::new(PanickingVelocity),
        Arc::new(InMemoryActions::new()),
        Arc::new(StaticNarrator::new("unused")),
    );

    let alert = harness.pipeline.submit(critical_transaction("tx_fallback")).await;
    assert_eq!(alert.risk_score, 0.3);
    assert_eq!(alert.severity, Severity::Medium);
    assert_eq!(alert.narrative, FALLBACK_ALERT_NARRATIVE);
    assert_eq!(alert.risk_factors.len(), 2);

    let detection = harness.pipeline.status().metrics.stages[&Stage::FraudDetection];
    assert!(detection.errors >= 1);

    harness.stop().await;
}

#[tokio::test]
async fn response_failure_falls_back_to_logging() {
    let harness = Harness::start(
        Arc::new(FixedVelocity(6)),
        Arc::new(BrokenBlocking(InMemoryActions::new())),
        Arc::new(StaticNarrator::new("analyst notes")),
    );

    harness.pipeline.submit(critical_transaction("tx_broken")).await;
    let response = harness.pipeline.respond("tx_broken").await.unwrap();

    assert_eq!(response.status, ResponseStatus::Fallback);
    assert_eq!(response.actions_taken, vec![FALLBACK_ACTION.to_string()]);

    let responses = harness.pipeline.status().metrics.stages[&Stage::ThreatResponse];
    assert!(responses.errors >= 1);

    harness.stop().await;
}

#[tokio::test]
async fn critical_response_escalates_to_case_manager() {
    let harness = Harness::with_velocity(6);

    harness.pipeline.submit(critical_transaction("tx_case")).await;
    harness.pipeline.respond("tx_case").await.unwrap();

    let cases = harness.pipeline.status().metrics.stages[&Stage::CaseManager];
    assert!(cases.processed >= 1);
    assert_eq!(cases.errors, 0);

    harness.stop().await;
}

#[tokio::test]
async fn shutdown_finishes_the_transaction_in_flight() {
    let narrator = Arc::new(GatedNarrator {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let harness = Harness::start(
        Arc::new(FixedVelocity(0)),
        Arc::new(InMemoryActions::new()),
        narrator.clone(),
    );

    harness
        .pipeline
        .enqueue(TransactionRecord::new("tx_inflight", "user_late", 80.0))
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), narrator.entered.notified())
        .await
        .unwrap();

    harness.token.cancel();
    narrator.release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), harness.workers.join())
        .await
        .unwrap();

    let alert = harness.pipeline.context().store.get("tx_inflight").unwrap();
    assert_eq!(alert.narrative, "released");
    let detection = harness.pipeline.status().metrics.stages[&Stage::FraudDetection];
    assert_eq!(detection.processed, 1);
    assert_eq!(detection.errors, 0);
}
