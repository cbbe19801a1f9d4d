//! Fraud alert data structures and the severity ladder

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower bound (inclusive) of the CRITICAL tier
pub const CRITICAL_THRESHOLD: f64 = 0.70;
/// Lower bound (inclusive) of the HIGH tier
pub const HIGH_THRESHOLD: f64 = 0.50;
/// Lower bound (inclusive) of the MEDIUM tier
pub const MEDIUM_THRESHOLD: f64 = 0.30;

/// Severity tier of an alert.
///
/// A pure function of the aggregate risk score; the response executor
/// re-derives it through [`Severity::from_score`] rather than trusting a
/// stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All tiers, lowest first
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Walk the threshold ladder high-to-low; first match wins.
    pub fn from_score(score: f64) -> Self {
        if score >= CRITICAL_THRESHOLD {
            Severity::Critical
        } else if score >= HIGH_THRESHOLD {
            Severity::High
        } else if score >= MEDIUM_THRESHOLD {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Default action the classifier recommends for this tier
    pub fn recommended_action(self) -> RecommendedAction {
        match self {
            Severity::Critical => RecommendedAction::BlockTransactionAndFreezeAccount,
            Severity::High => RecommendedAction::RequireAdditionalVerification,
            Severity::Medium => RecommendedAction::RequireBasicVerification,
            Severity::Low => RecommendedAction::MonitorOnly,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action recommended alongside an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    BlockTransactionAndFreezeAccount,
    RequireAdditionalVerification,
    RequireBasicVerification,
    MonitorOnly,
}

/// Fraud alert produced once per analysed transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAlert {
    /// Associated transaction ID, also the alert's key in the store
    pub transaction_id: String,

    /// Account holder of the transaction
    pub user_id: String,

    /// Aggregate risk score (0.0 - 1.0)
    pub risk_score: f64,

    /// Factor labels from every analyzer, in analyzer order
    pub risk_factors: Vec<String>,

    /// Severity tier derived from `risk_score`
    pub severity: Severity,

    /// Classifier's default action for `severity`
    pub recommended_action: RecommendedAction,

    /// Alert creation timestamp
    pub timestamp: DateTime<Utc>,

    /// Advisory rationale from the narrative service
    pub narrative: String,
}

impl FraudAlert {
    /// Create an alert; severity and recommended action follow from the score.
    pub fn new(
        transaction_id: impl Into<String>,
        user_id: impl Into<String>,
        risk_score: f64,
        risk_factors: Vec<String>,
    ) -> Self {
        let severity = Severity::from_score(risk_score);
        Self {
            transaction_id: transaction_id.into(),
            user_id: user_id.into(),
            risk_score,
            risk_factors,
            severity,
            recommended_action: severity.recommended_action(),
            timestamp: Utc::now(),
            narrative: String::new(),
        }
    }

    /// Attach narrative text
    pub fn with_narrative(mut self, narrative: impl Into<String>) -> Self {
        self.narrative = narrative.into();
        self
    }

    /// Alerts are keyed by their transaction identifier
    pub fn alert_id(&self) -> &str {
        &self.transaction_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_score() {
        assert_eq!(Severity::from_score(0.0), Severity::Low);
        assert_eq!(Severity::from_score(0.29), Severity::Low);
        assert_eq!(Severity::from_score(0.3), Severity::Medium);
        assert_eq!(Severity::from_score(0.49), Severity::Medium);
        assert_eq!(Severity::from_score(0.5), Severity::High);
        assert_eq!(Severity::from_score(0.6999), Severity::High);
        assert_eq!(Severity::from_score(0.70), Severity::Critical);
        assert_eq!(Severity::from_score(1.0), Severity::Critical);
    }

    #[test]
    fn test_exactly_one_tier_for_every_score() {
        for i in 0..=10_000 {
            let score = i as f64 / 10_000.0;
            let tier = Severity::from_score(score);
            let matching = [
                score >= CRITICAL_THRESHOLD,
                (HIGH_THRESHOLD..CRITICAL_THRESHOLD).contains(&score),
                (MEDIUM_THRESHOLD..HIGH_THRESHOLD).contains(&score),
                score < MEDIUM_THRESHOLD,
            ];
            assert_eq!(matching.iter().filter(|m| **m).count(), 1, "score {score}");
            assert_eq!(tier >= Severity::Critical, matching[0]);
        }
    }

    #[test]
    fn test_recommended_action_per_tier() {
        assert_eq!(
            Severity::Critical.recommended_action(),
            RecommendedAction::BlockTransactionAndFreezeAccount
        );
        assert_eq!(
            Severity::High.recommended_action(),
            RecommendedAction::RequireAdditionalVerification
        );
        assert_eq!(
            Severity::Medium.recommended_action(),
            RecommendedAction::RequireBasicVerification
        );
        assert_eq!(
            Severity::Low.recommended_action(),
            RecommendedAction::MonitorOnly
        );
    }

    #[test]
    fn test_alert_wire_format() {
        let alert = FraudAlert::new("tx_123", "user_1", 0.78, vec!["ATM transaction".into()]);
        let json = serde_json::to_value(&alert).unwrap();

        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(
            json["recommended_action"],
            "BLOCK_TRANSACTION_AND_FREEZE_ACCOUNT"
        );
        assert_eq!(json["risk_factors"][0], "ATM transaction");
    }
}
