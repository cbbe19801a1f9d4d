//! Transaction data structures accepted at the ingestion boundary

use serde::{Deserialize, Serialize};

/// A payment transaction submitted for fraud analysis.
///
/// Immutable once created. The timestamp is kept as the raw string the
/// caller sent so that a malformed value degrades the time signal instead
/// of rejecting the whole transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique transaction identifier
    #[serde(alias = "transaction_id")]
    pub id: String,

    /// Account holder
    pub user_id: String,

    /// Transaction amount (non-negative)
    pub amount: f64,

    /// Merchant name
    pub merchant: String,

    /// Free-text location, e.g. "New York, NY" or "ATM - Unknown"
    pub location: String,

    /// ISO 8601 timestamp as sent by the caller
    pub timestamp: String,

    /// Device identifier or fingerprint
    pub device_id: String,

    /// Originating IP address
    pub ip_address: String,

    /// Card category (credit, debit, ...)
    pub card_type: String,
}

impl TransactionRecord {
    /// Create a transaction with neutral defaults for the descriptive fields
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, amount: f64) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            amount,
            merchant: "Unknown Merchant".to_string(),
            location: "New York, NY".to_string(),
            timestamp: "2024-01-15T14:00:00".to_string(),
            device_id: "device_123".to_string(),
            ip_address: "192.168.1.1".to_string(),
            card_type: "credit".to_string(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = merchant.into();
        self
    }

    /// Check the boundary invariants: a non-empty id and a finite,
    /// non-negative amount.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("transaction id must not be empty".to_string());
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(format!("invalid transaction amount: {}", self.amount));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_deserializes_from_ingestion_payload() {
        let json = r#"{
            "id": "txn_100200",
            "user_id": "user_4242",
            "amount": 125.5,
            "merchant": "Starbucks",
            "location": "London, UK",
            "timestamp": "2024-01-15T09:30:00Z",
            "device_id": "device_456",
            "ip_address": "10.0.0.7",
            "card_type": "debit"
        }"#;

        let tx: TransactionRecord = serde_json::from_str(json).unwrap();

        assert_eq!(tx.id, "txn_100200");
        assert_eq!(tx.amount, 125.5);
        assert_eq!(tx.card_type, "debit");
    }

    #[test]
    fn test_transaction_id_alias() {
        let json = r#"{
            "transaction_id": "tx_1", "user_id": "u", "amount": 1.0,
            "merchant": "m", "location": "l", "timestamp": "t",
            "device_id": "d", "ip_address": "i", "card_type": "c"
        }"#;

        let tx: TransactionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(tx.id, "tx_1");
    }

    #[test]
    fn test_validate_rejects_negative_amount_and_empty_id() {
        assert!(TransactionRecord::new("tx", "u", 0.0).validate().is_ok());
        assert!(TransactionRecord::new("tx", "u", -1.0).validate().is_err());
        assert!(TransactionRecord::new("  ", "u", 10.0).validate().is_err());
    }
}
