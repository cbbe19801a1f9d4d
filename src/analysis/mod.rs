//! Transaction risk analysis: signal analyzers, aggregation and scoring

pub mod aggregator;
pub mod engine;
pub mod signals;
pub mod velocity;

pub use aggregator::{AggregateRisk, RiskAggregator};
pub use engine::{fallback_alert, DetectionEngine, RiskAssessment};
pub use signals::{DetectionRules, RiskSignal};
pub use velocity::{
    FixedVelocity, VelocityConfig, VelocityConfigError, VelocitySource, WindowedVelocity,
};
