//! NATS producer publishing fraud alerts and threat responses

use crate::broadcast::Broadcaster;
use crate::types::{FraudAlert, Notification, ThreatResponse};
use anyhow::Result;
use async_nats::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Publishes pipeline notifications to their NATS subjects
#[derive(Clone)]
pub struct AlertProducer {
    client: Client,
    alert_subject: String,
    response_subject: String,
}

impl AlertProducer {
    pub fn new(client: Client, alert_subject: &str, response_subject: &str) -> Self {
        Self {
            client,
            alert_subject: alert_subject.to_string(),
            response_subject: response_subject.to_string(),
        }
    }

    /// Publish a fraud alert
    pub async fn publish_alert(&self, alert: &FraudAlert) -> Result<()> {
        let payload = serde_json::to_vec(alert)?;
        self.client
            .publish(self.alert_subject.clone(), payload.into())
            .await?;

        debug!(
            transaction_id = %alert.transaction_id,
            risk_score = alert.risk_score,
            "Published fraud alert"
        );
        Ok(())
    }

    /// Publish a threat response
    pub async fn publish_response(&self, response: &ThreatResponse) -> Result<()> {
        let payload = serde_json::to_vec(response)?;
        self.client
            .publish(self.response_subject.clone(), payload.into())
            .await?;

        debug!(alert_id = %response.alert_id, "Published threat response");
        Ok(())
    }

    /// Route a notification to its subject
    pub async fn publish(&self, notification: &Notification) -> Result<()> {
        match notification {
            Notification::FraudAlert(alert) => self.publish_alert(alert).await,
            Notification::ThreatResponse(response) => self.publish_response(response).await,
        }
    }

    /// Register as an observer and forward every broadcast until cancelled.
    ///
    /// If publishing falls behind, the broadcaster drops this observer and
    /// forwarding ends.
    pub async fn run(self, broadcaster: &Broadcaster, shutdown: CancellationToken) {
        let (observer, mut notifications) = broadcaster.subscribe();
        let mut published = 0u64;

        loop {
            let notification = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = notifications.recv() => match next {
                    Some(notification) => notification,
                    None => break,
                },
            };

            match self.publish(&notification).await {
                Ok(()) => published += 1,
                Err(e) => {
                    error!(
                        kind = notification.kind(),
                        error = %e,
                        "Failed to publish notification"
                    );
                }
            }
        }

        broadcaster.unsubscribe(&observer);
        info!(published, "NATS producer stopped");
    }
}
