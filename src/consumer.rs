//! NATS consumer feeding transactions into the ingestion queue

use crate::pipeline::Pipeline;
use crate::types::TransactionRecord;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Consumer for receiving transactions from NATS
pub struct TransactionConsumer {
    client: Client,
    subject: String,
}

impl TransactionConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the transaction subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to transaction subject");
        Ok(subscriber)
    }

    /// Decode messages and enqueue them until cancelled or the subscription
    /// ends. Undecodable or invalid payloads are logged and skipped.
    pub async fn run(self, pipeline: Pipeline, shutdown: CancellationToken) -> Result<()> {
        let mut subscription = self.subscribe().await?;
        let mut accepted = 0u64;

        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = subscription.next() => match next {
                    Some(message) => message,
                    None => break,
                },
            };

            let Some(record) = decode(&message.payload) else {
                continue;
            };
            debug!(transaction_id = %record.id, "Transaction received from NATS");

            if let Err(e) = pipeline.enqueue(record) {
                warn!(error = %e, "Stopping NATS consumer");
                break;
            }
            accepted += 1;
        }

        info!(subject = %self.subject, accepted, "NATS consumer stopped");
        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Parse and validate a transaction payload
pub fn decode(payload: &[u8]) -> Option<TransactionRecord> {
    let record = match serde_json::from_slice::<TransactionRecord>(payload) {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, "Failed to deserialize transaction");
            return None;
        }
    };

    if let Err(reason) = record.validate() {
        warn!(transaction_id = %record.id, reason = %reason, "Rejected invalid transaction");
        return None;
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_payload() {
        let payload = serde_json::to_vec(&TransactionRecord::new("tx_1", "user_1", 42.0)).unwrap();
        let record = decode(&payload).unwrap();
        assert_eq!(record.id, "tx_1");
    }

    #[test]
    fn test_decode_skips_garbage_and_invalid() {
        assert!(decode(b"not json").is_none());

        let negative = serde_json::to_vec(&TransactionRecord::new("tx_2", "user_1", -5.0)).unwrap();
        assert!(decode(&negative).is_none());
    }
}
