//! Side-effecting response actions and their in-memory backend

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Number of action records kept by [`InMemoryActions`]
pub const ACTION_HISTORY_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{action} rejected for {target}: {reason}")]
    Rejected {
        action: ActionKind,
        target: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    BlockTransaction,
    FreezeAccount,
    SendFraudAlert,
    RequireVerification,
    LogSecurityEvent,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::BlockTransaction => "block_transaction",
            ActionKind::FreezeAccount => "freeze_account",
            ActionKind::SendFraudAlert => "send_fraud_alert",
            ActionKind::RequireVerification => "require_verification",
            ActionKind::LogSecurityEvent => "log_security_event",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Blocked,
    Frozen,
    Sent,
    Pending,
    Logged,
}

/// Delivery channel of a fraud alert notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertChannel {
    Sms,
    Email,
}

/// Verification step a user must pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerificationKind {
    #[serde(rename = "2FA")]
    TwoFactor,
    #[serde(rename = "SMS_CODE")]
    SmsCode,
}

/// Severity attached to a logged security event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventSeverity {
    Info,
    Low,
    Medium,
    High,
}

/// Result of one executed action
#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub action: ActionKind,
    /// Transaction id, user id or event type the action applied to
    pub target: String,
    pub status: ActionStatus,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl ActionRecord {
    fn new(
        action: ActionKind,
        target: impl Into<String>,
        status: ActionStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            action,
            target: target.into(),
            status,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Executes response actions against the outside world.
///
/// Every operation is idempotent: repeating it for the same target succeeds
/// without duplicating the effect. Calls are synchronous; the pipeline runs
/// them on a blocking thread.
pub trait ActionBackend: Send + Sync {
    fn block_transaction(&self, transaction_id: &str, reason: &str)
        -> Result<ActionRecord, ActionError>;

    fn freeze_account(
        &self,
        user_id: &str,
        duration_hours: u32,
        reason: &str,
    ) -> Result<ActionRecord, ActionError>;

    fn send_fraud_alert(
        &self,
        user_id: &str,
        channel: AlertChannel,
        message: &str,
    ) -> Result<ActionRecord, ActionError>;

    fn require_verification(
        &self,
        user_id: &str,
        kind: VerificationKind,
        reason: &str,
    ) -> Result<ActionRecord, ActionError>;

    fn log_security_event(
        &self,
        event_type: &str,
        severity: EventSeverity,
        details: &serde_json::Value,
    ) -> Result<ActionRecord, ActionError>;
}

#[derive(Default)]
struct ActionState {
    blocked: HashSet<String>,
    frozen_until: HashMap<String, DateTime<Utc>>,
    pending_verification: HashMap<String, VerificationKind>,
    history: VecDeque<ActionRecord>,
}

impl ActionState {
    fn remember(&mut self, record: ActionRecord) -> ActionRecord {
        if self.history.len() == ACTION_HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(record.clone());
        record
    }
}

/// Process-local action backend that records what it would have done
#[derive(Default)]
pub struct InMemoryActions {
    state: Mutex<ActionState>,
}

impl InMemoryActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blocked(&self, transaction_id: &str) -> bool {
        self.state.lock().blocked.contains(transaction_id)
    }

    pub fn frozen_until(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.state.lock().frozen_until.get(user_id).copied()
    }

    pub fn pending_verification(&self, user_id: &str) -> Option<VerificationKind> {
        self.state.lock().pending_verification.get(user_id).copied()
    }

    /// Most recent action records, oldest first
    pub fn history(&self) -> Vec<ActionRecord> {
        self.state.lock().history.iter().cloned().collect()
    }
}

impl ActionBackend for InMemoryActions {
    fn block_transaction(
        &self,
        transaction_id: &str,
        reason: &str,
    ) -> Result<ActionRecord, ActionError> {
        let mut state = self.state.lock();
        if state.blocked.insert(transaction_id.to_string()) {
            warn!(transaction_id, reason, "Transaction blocked");
        }
        Ok(state.remember(ActionRecord::new(
            ActionKind::BlockTransaction,
            transaction_id,
            ActionStatus::Blocked,
            reason,
        )))
    }

    fn freeze_account(
        &self,
        user_id: &str,
        duration_hours: u32,
        reason: &str,
    ) -> Result<ActionRecord, ActionError> {
        let until = Utc::now() + Duration::hours(i64::from(duration_hours));
        let mut state = self.state.lock();

        // Extending an existing freeze never shortens it
        let entry = state.frozen_until.entry(user_id.to_string()).or_insert(until);
        if *entry < until {
            *entry = until;
        }
        warn!(user_id, duration_hours, reason, "Account frozen");

        Ok(state.remember(ActionRecord::new(
            ActionKind::FreezeAccount,
            user_id,
            ActionStatus::Frozen,
            format!("{duration_hours}h: {reason}"),
        )))
    }

    fn send_fraud_alert(
        &self,
        user_id: &str,
        channel: AlertChannel,
        message: &str,
    ) -> Result<ActionRecord, ActionError> {
        info!(user_id, channel = ?channel, "Fraud alert sent");
        Ok(self.state.lock().remember(ActionRecord::new(
            ActionKind::SendFraudAlert,
            user_id,
            ActionStatus::Sent,
            message,
        )))
    }

    fn require_verification(
        &self,
        user_id: &str,
        kind: VerificationKind,
        reason: &str,
    ) -> Result<ActionRecord, ActionError> {
        let mut state = self.state.lock();
        state.pending_verification.insert(user_id.to_string(), kind);
        info!(user_id, kind = ?kind, reason, "Verification required");

        Ok(state.remember(ActionRecord::new(
            ActionKind::RequireVerification,
            user_id,
            ActionStatus::Pending,
            reason,
        )))
    }

    fn log_security_event(
        &self,
        event_type: &str,
        severity: EventSeverity,
        details: &serde_json::Value,
    ) -> Result<ActionRecord, ActionError> {
        info!(event_type, severity = ?severity, %details, "Security event logged");
        Ok(self.state.lock().remember(ActionRecord::new(
            ActionKind::LogSecurityEvent,
            event_type,
            ActionStatus::Logged,
            format!("{severity:?}"),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_is_idempotent() {
        let actions = InMemoryActions::new();
        actions.block_transaction("tx_1", "critical").unwrap();
        actions.block_transaction("tx_1", "critical").unwrap();

        assert!(actions.is_blocked("tx_1"));
        assert!(!actions.is_blocked("tx_2"));
        assert_eq!(actions.state.lock().blocked.len(), 1);
    }

    #[test]
    fn test_freeze_never_shortens() {
        let actions = InMemoryActions::new();
        actions.freeze_account("user_1", 48, "first").unwrap();
        let long = actions.frozen_until("user_1").unwrap();

        actions.freeze_account("user_1", 1, "second").unwrap();
        assert_eq!(actions.frozen_until("user_1"), Some(long));
    }

    #[test]
    fn test_verification_is_pending() {
        let actions = InMemoryActions::new();
        let record = actions
            .require_verification("user_2", VerificationKind::TwoFactor, "high risk")
            .unwrap();

        assert_eq!(record.status, ActionStatus::Pending);
        assert_eq!(
            actions.pending_verification("user_2"),
            Some(VerificationKind::TwoFactor)
        );
    }

    #[test]
    fn test_history_is_bounded() {
        let actions = InMemoryActions::new();
        let details = serde_json::json!({});
        for i in 0..(ACTION_HISTORY_LIMIT + 20) {
            actions
                .log_security_event(&format!("EVENT_{i}"), EventSeverity::Info, &details)
                .unwrap();
        }

        let history = actions.history();
        assert_eq!(history.len(), ACTION_HISTORY_LIMIT);
        assert_eq!(history[0].target, "EVENT_20");
    }

    #[test]
    fn test_wire_names() {
        let wire = |kind: VerificationKind| serde_json::to_value(kind).unwrap();
        assert_eq!(wire(VerificationKind::TwoFactor), "2FA");
        assert_eq!(wire(VerificationKind::SmsCode), "SMS_CODE");
        assert_eq!(serde_json::to_value(AlertChannel::Email).unwrap(), "EMAIL");
        assert_eq!(ActionKind::FreezeAccount.to_string(), "freeze_account");
    }
}
