//! Response executor: turns an alert into an ordered list of actions

use super::actions::{ActionBackend, ActionError, AlertChannel, EventSeverity, VerificationKind};
use crate::types::{FraudAlert, ResponseStatus, Severity, ThreatResponse};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Hours an account stays frozen after a critical alert
pub const FREEZE_HOURS: u32 = 24;

/// Narrative attached to fallback responses
pub const FALLBACK_RESPONSE_NARRATIVE: &str = "Fallback response used due to agent error";

/// Action description of the fallback protocol
pub const FALLBACK_ACTION: &str = "Logged security event (fallback mode)";

/// One step of a severity protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseAction {
    BlockTransaction,
    FreezeAccount { hours: u32 },
    SendAlert { channel: AlertChannel },
    RequireVerification(VerificationKind),
    LogEvent { tier: Severity },
}

impl ResponseAction {
    /// Human-readable description recorded once the action completed
    pub fn describe(&self, alert: &FraudAlert) -> String {
        match self {
            ResponseAction::BlockTransaction => {
                format!("Blocked transaction {}", alert.transaction_id)
            }
            ResponseAction::FreezeAccount { hours } => {
                format!("Froze account {} for {hours} hours", alert.user_id)
            }
            ResponseAction::SendAlert { channel } => match channel {
                AlertChannel::Sms => format!("Sent urgent fraud alert to {}", alert.user_id),
                AlertChannel::Email => format!("Sent security alert to {}", alert.user_id),
            },
            ResponseAction::RequireVerification(VerificationKind::TwoFactor) => {
                format!("Required 2FA verification for {}", alert.user_id)
            }
            ResponseAction::RequireVerification(VerificationKind::SmsCode) => {
                format!("Required SMS verification for {}", alert.user_id)
            }
            ResponseAction::LogEvent { tier } => {
                format!("Logged {} security event", event_label(*tier))
            }
        }
    }
}

fn event_label(tier: Severity) -> &'static str {
    match tier {
        Severity::Critical => "critical",
        Severity::High => "high-risk",
        Severity::Medium => "medium-risk",
        Severity::Low => "low-risk",
    }
}

fn event_type(tier: Severity) -> &'static str {
    match tier {
        Severity::Critical => "CRITICAL_FRAUD",
        Severity::High => "HIGH_FRAUD",
        Severity::Medium => "MEDIUM_FRAUD",
        Severity::Low => "LOW_FRAUD",
    }
}

fn event_severity(tier: Severity) -> EventSeverity {
    match tier {
        Severity::Critical => EventSeverity::High,
        Severity::High => EventSeverity::Medium,
        Severity::Medium => EventSeverity::Low,
        Severity::Low => EventSeverity::Info,
    }
}

/// Actions completed for one alert
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// Severity re-derived from the alert's score
    pub severity: Severity,
    /// Descriptions of completed actions, in execution order
    pub actions_taken: Vec<String>,
    /// Number of planned actions that failed
    pub failed: usize,
}

/// Runs the severity protocol for alerts against an [`ActionBackend`]
pub struct ResponseExecutor {
    backend: Arc<dyn ActionBackend>,
}

impl ResponseExecutor {
    pub fn new(backend: Arc<dyn ActionBackend>) -> Self {
        Self { backend }
    }

    /// Ordered action plan for a severity tier.
    pub fn plan_for(severity: Severity) -> Vec<ResponseAction> {
        match severity {
            Severity::Critical => vec![
                ResponseAction::BlockTransaction,
                ResponseAction::FreezeAccount {
                    hours: FREEZE_HOURS,
                },
                ResponseAction::SendAlert {
                    channel: AlertChannel::Sms,
                },
                ResponseAction::LogEvent { tier: severity },
            ],
            Severity::High => vec![
                ResponseAction::RequireVerification(VerificationKind::TwoFactor),
                ResponseAction::SendAlert {
                    channel: AlertChannel::Email,
                },
                ResponseAction::LogEvent { tier: severity },
            ],
            Severity::Medium => vec![
                ResponseAction::RequireVerification(VerificationKind::SmsCode),
                ResponseAction::LogEvent { tier: severity },
            ],
            Severity::Low => vec![ResponseAction::LogEvent { tier: severity }],
        }
    }

    /// Execute every planned action for `alert`.
    ///
    /// The tier is recomputed from `risk_score` through the same ladder the
    /// classifier uses. A failed action is logged and skipped; the remaining
    /// actions still run.
    pub fn execute(&self, alert: &FraudAlert) -> ExecutionOutcome {
        let severity = Severity::from_score(alert.risk_score);
        if severity != alert.severity {
            warn!(
                alert_id = %alert.alert_id(),
                stored = %alert.severity,
                derived = %severity,
                "Stored severity disagrees with score, using derived tier"
            );
        }

        let plan = Self::plan_for(severity);
        let mut actions_taken = Vec::with_capacity(plan.len());
        let mut failed = 0;

        for action in &plan {
            match self.perform(action, alert) {
                Ok(()) => actions_taken.push(action.describe(alert)),
                Err(e) => {
                    failed += 1;
                    error!(
                        alert_id = %alert.alert_id(),
                        action = ?action,
                        error = %e,
                        "Response action failed"
                    );
                }
            }
        }

        debug!(
            alert_id = %alert.alert_id(),
            severity = %severity,
            completed = actions_taken.len(),
            failed,
            "Response protocol executed"
        );

        ExecutionOutcome {
            severity,
            actions_taken,
            failed,
        }
    }

    fn perform(&self, action: &ResponseAction, alert: &FraudAlert) -> Result<(), ActionError> {
        let score = alert.risk_score;
        match *action {
            ResponseAction::BlockTransaction => {
                self.backend.block_transaction(
                    &alert.transaction_id,
                    &format!("Critical fraud risk: {score}"),
                )?;
            }
            ResponseAction::FreezeAccount { hours } => {
                self.backend.freeze_account(
                    &alert.user_id,
                    hours,
                    &format!("Critical fraud alert: {}", alert.alert_id()),
                )?;
            }
            ResponseAction::SendAlert { channel } => {
                let message = match channel {
                    AlertChannel::Sms => {
                        "URGENT: Suspicious activity detected. Account temporarily secured."
                    }
                    AlertChannel::Email => "Security verification required for recent transaction.",
                };
                self.backend.send_fraud_alert(&alert.user_id, channel, message)?;
            }
            ResponseAction::RequireVerification(kind) => {
                let tier = match kind {
                    VerificationKind::TwoFactor => "High",
                    VerificationKind::SmsCode => "Medium",
                };
                self.backend.require_verification(
                    &alert.user_id,
                    kind,
                    &format!("{tier} fraud risk: {score}"),
                )?;
            }
            ResponseAction::LogEvent { tier } => {
                let details = serde_json::to_value(alert).unwrap_or_default();
                self.backend
                    .log_security_event(event_type(tier), event_severity(tier), &details)?;
            }
        }
        Ok(())
    }

    /// Minimal protocol used when the response stage fails
    pub fn fallback(&self, alert: &FraudAlert, response_time_ms: u64) -> ThreatResponse {
        warn!(alert_id = %alert.alert_id(), "Using fallback threat response");

        let details = serde_json::to_value(alert).unwrap_or_default();
        if let Err(e) =
            self.backend
                .log_security_event("FALLBACK_RESPONSE", EventSeverity::Info, &details)
        {
            error!(alert_id = %alert.alert_id(), error = %e, "Fallback logging failed");
        }

        ThreatResponse::new(
            alert.alert_id(),
            vec![FALLBACK_ACTION.to_string()],
            ResponseStatus::Fallback,
            response_time_ms,
            FALLBACK_RESPONSE_NARRATIVE,
        )
    }
}

/// Prompt asking the narrative service to explain the response
pub fn response_prompt(alert: &FraudAlert) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are a threat response analyst. Explain the actions for this fraud alert.\n"
    );
    let _ = writeln!(prompt, "ALERT ID: {}", alert.alert_id());
    let _ = writeln!(prompt, "RISK SCORE: {}", alert.risk_score);
    let _ = writeln!(prompt, "TRANSACTION ID: {}", alert.transaction_id);
    let _ = writeln!(prompt, "USER ID: {}", alert.user_id);
    let _ = writeln!(prompt, "RISK FACTORS: {}\n", alert.risk_factors.join(", "));
    let _ = writeln!(prompt, "RESPONSE PROTOCOLS:");
    let _ = writeln!(
        prompt,
        "- CRITICAL (0.7+): Block transaction, freeze account, send alert"
    );
    let _ = writeln!(
        prompt,
        "- HIGH (0.5-0.69): Require verification, send alert"
    );
    let _ = writeln!(prompt, "- MEDIUM (0.3-0.49): Require basic verification");
    let _ = writeln!(prompt, "- LOW (0.0-0.29): Log event only\n");
    let _ = write!(
        prompt,
        "Describe the action plan for a risk score of {} and the reasoning behind it.",
        alert.risk_score
    );
    prompt
}
