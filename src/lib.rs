//! Vigilant Sentinel
//!
//! Real-time transaction fraud scoring. Transactions are scored by a set of
//! rule-based signal analyzers, turned into severity-graded alerts, answered
//! with an automated response protocol and broadcast to connected observers.

pub mod analysis;
pub mod api;
pub mod broadcast;
pub mod case_manager;
pub mod config;
pub mod consumer;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod narrative;
pub mod pipeline;
pub mod producer;
pub mod response;
pub mod store;
pub mod types;

pub use analysis::DetectionEngine;
pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use pipeline::{Pipeline, PipelineContext, PipelineError};
pub use producer::AlertProducer;
pub use types::{FraudAlert, Notification, Severity, ThreatResponse, TransactionRecord};
