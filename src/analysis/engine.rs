//! Detection engine: runs every analyzer, aggregates and classifies

use super::aggregator::RiskAggregator;
use super::signals::{
    analyze_amount, analyze_device, analyze_location, analyze_time, analyze_velocity,
    DetectionRules, RiskSignal,
};
use super::velocity::VelocitySource;
use crate::types::{FraudAlert, Severity, TransactionRecord};
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;

/// Narrative used for alerts built by the fallback rule
pub const FALLBACK_ALERT_NARRATIVE: &str = "Fallback analysis used due to agent error";

const FALLBACK_AMOUNT: f64 = 1000.0;
const FALLBACK_SCORE: f64 = 0.3;

/// Result of scoring one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub transaction_id: String,
    pub user_id: String,
    /// Per-analyzer signals in invocation order
    pub signals: Vec<RiskSignal>,
    /// Aggregate risk score (0.0 - 1.0)
    pub risk_score: f64,
    pub risk_factors: Vec<String>,
    pub severity: Severity,
}

impl RiskAssessment {
    /// Prompt for the narrative service describing this assessment
    pub fn analysis_prompt(&self, record: &TransactionRecord) -> String {
        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "You are an expert fraud detection analyst. Assess this transaction.\n"
        );
        let _ = writeln!(prompt, "TRANSACTION DETAILS:");
        let _ = writeln!(prompt, "- ID: {}", record.id);
        let _ = writeln!(prompt, "- Amount: ${}", record.amount);
        let _ = writeln!(prompt, "- Merchant: {}", record.merchant);
        let _ = writeln!(prompt, "- Location: {}", record.location);
        let _ = writeln!(prompt, "- User: {}", record.user_id);
        let _ = writeln!(prompt, "- Device: {}", record.device_id);
        let _ = writeln!(prompt, "- Time: {}\n", record.timestamp);
        let _ = writeln!(prompt, "RISK ANALYSIS RESULTS:");
        let _ = writeln!(prompt, "- Combined Risk Score: {:.3}", self.risk_score);
        let _ = writeln!(
            prompt,
            "- Risk Factors Found: {}\n",
            self.risk_factors.len()
        );
        let _ = writeln!(prompt, "IDENTIFIED RISK FACTORS:");
        for factor in &self.risk_factors {
            let _ = writeln!(prompt, "- {factor}");
        }
        let _ = writeln!(
            prompt,
            "\nProvide your assessment of the fraud risk, recommended actions and reasoning.\n"
        );
        let _ = writeln!(prompt, "Risk Score Interpretation:");
        let _ = writeln!(prompt, "- 0.0-0.29: LOW risk");
        let _ = writeln!(prompt, "- 0.3-0.49: MEDIUM risk");
        let _ = writeln!(prompt, "- 0.5-0.69: HIGH risk");
        let _ = write!(prompt, "- 0.7+: CRITICAL risk");
        prompt
    }

    /// Convert the assessment into an alert carrying `narrative`
    pub fn into_alert(self, narrative: impl Into<String>) -> FraudAlert {
        FraudAlert::new(
            self.transaction_id,
            self.user_id,
            self.risk_score,
            self.risk_factors,
        )
        .with_narrative(narrative)
    }
}

/// Runs the five analyzers over a transaction.
///
/// CPU-bound and synchronous; callers on the async runtime offload it to a
/// blocking thread.
pub struct DetectionEngine {
    rules: DetectionRules,
    velocity: Arc<dyn VelocitySource>,
    aggregator: RiskAggregator,
}

impl DetectionEngine {
    pub fn new(rules: DetectionRules, velocity: Arc<dyn VelocitySource>) -> Self {
        Self {
            rules,
            velocity,
            aggregator: RiskAggregator::new(),
        }
    }

    pub fn rules(&self) -> &DetectionRules {
        &self.rules
    }

    /// Score a transaction
    pub fn assess(&self, record: &TransactionRecord) -> RiskAssessment {
        let signals = vec![
            analyze_amount(record.amount),
            analyze_location(&record.location, &self.rules),
            analyze_device(&record.device_id, &self.rules),
            analyze_time(&record.timestamp),
            analyze_velocity(self.velocity.recent_count(record)),
        ];

        let aggregate = self.aggregator.aggregate(&signals);
        let severity = Severity::from_score(aggregate.risk_score);

        debug!(
            transaction_id = %record.id,
            risk_score = aggregate.risk_score,
            severity = %severity,
            factors = aggregate.risk_factors.len(),
            strongest = RiskAggregator::strongest(&signals).map(|s| s.analyzer).unwrap_or("none"),
            "Transaction assessed"
        );

        RiskAssessment {
            transaction_id: record.id.clone(),
            user_id: record.user_id.clone(),
            signals,
            risk_score: aggregate.risk_score,
            risk_factors: aggregate.risk_factors,
            severity,
        }
    }
}

/// Minimal rule-based alert used when the analysis stage fails.
///
/// Flags amounts over 1000 and locations mentioning "unknown" in any case.
/// Either rule yields a MEDIUM alert, otherwise LOW.
pub fn fallback_alert(record: &TransactionRecord) -> FraudAlert {
    let mut factors = Vec::new();

    if record.amount > FALLBACK_AMOUNT {
        factors.push("High amount transaction (fallback)".to_string());
    }
    if record.location.to_lowercase().contains("unknown") {
        factors.push("Unknown location (fallback)".to_string());
    }

    let score = if factors.is_empty() { 0.0 } else { FALLBACK_SCORE };

    FraudAlert::new(record.id.clone(), record.user_id.clone(), score, factors)
        .with_narrative(FALLBACK_ALERT_NARRATIVE)
}
