//! Type definitions for the fraud pipeline

pub mod alert;
pub mod notification;
pub mod response;
pub mod transaction;

pub use alert::{FraudAlert, RecommendedAction, Severity};
pub use notification::{ClientMessage, Notification, ServerReply};
pub use response::{ResponseStatus, ThreatResponse};
pub use transaction::TransactionRecord;
