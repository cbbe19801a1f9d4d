//! Risk aggregation across analyzer signals

use super::signals::RiskSignal;

/// Decimal places kept in an aggregate score
const SCORE_PRECISION: f64 = 1e6;

/// Combined view of every analyzer's signal for one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRisk {
    /// Clamped sum of the signal contributions (0.0 - 1.0)
    pub risk_score: f64,
    /// All factor labels in analyzer invocation order
    pub risk_factors: Vec<String>,
}

/// Combines analyzer signals into a single risk score.
///
/// Contributions are summed without weighting and the sum is clamped to
/// `[0, 1]`; each signal is already capped at 1.0 by its analyzer. This is a
/// plain additive model, not a probabilistic combination of evidence.
#[derive(Debug, Clone, Default)]
pub struct RiskAggregator;

impl RiskAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate signals into one score and one factor list.
    ///
    /// The sum is rounded to six decimals before clamping so the result does
    /// not depend on summation order.
    pub fn aggregate(&self, signals: &[RiskSignal]) -> AggregateRisk {
        let total: f64 = signals.iter().map(|s| s.risk_score).sum();
        let rounded = (total * SCORE_PRECISION).round() / SCORE_PRECISION;

        let risk_factors = signals
            .iter()
            .flat_map(|s| s.factors.iter().cloned())
            .collect();

        AggregateRisk {
            risk_score: rounded.clamp(0.0, 1.0),
            risk_factors,
        }
    }

    /// Signal with the largest contribution, if any contributed at all.
    pub fn strongest<'a>(signals: &'a [RiskSignal]) -> Option<&'a RiskSignal> {
        signals
            .iter()
            .filter(|s| s.risk_score > 0.0)
            .max_by(|a, b| a.risk_score.total_cmp(&b.risk_score))
    }
}
