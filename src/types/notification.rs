//! Messages exchanged over the notification channel

use super::alert::FraudAlert;
use super::response::ThreatResponse;
use serde::{Deserialize, Serialize};

/// Event pushed to every connected observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Notification {
    FraudAlert(FraudAlert),
    ThreatResponse(ThreatResponse),
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::FraudAlert(_) => "fraud_alert",
            Notification::ThreatResponse(_) => "threat_response",
        }
    }
}

/// Message a client may send on the notification channel
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    Subscribe {
        #[serde(default)]
        channels: Option<Vec<String>>,
    },
}

/// Direct reply to a [`ClientMessage`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerReply {
    Pong,
    SubscriptionConfirmed { subscribed_to: Vec<String> },
}

impl ClientMessage {
    /// Reply for this message. Subscriptions are echoed back; no filtering
    /// is applied to later broadcasts.
    pub fn reply(self) -> ServerReply {
        match self {
            ClientMessage::Ping => ServerReply::Pong,
            ClientMessage::Subscribe { channels } => ServerReply::SubscriptionConfirmed {
                subscribed_to: channels.unwrap_or_else(|| vec!["all".to_string()]),
            },
        }
    }
}
