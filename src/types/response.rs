//! Threat response records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a response run finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The severity protocol ran
    Completed,
    /// The stage failed and the minimal fallback protocol ran instead
    Fallback,
}

/// Outcome of executing the response protocol for one alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatResponse {
    /// Alert (transaction) identifier the response was triggered for
    pub alert_id: String,

    /// Descriptions of the actions that completed, in execution order
    pub actions_taken: Vec<String>,

    pub status: ResponseStatus,

    /// Completion timestamp
    pub timestamp: DateTime<Utc>,

    /// Wall time from start of the run to completion
    pub response_time_ms: u64,

    /// Advisory rationale from the narrative service
    pub narrative: String,
}

impl ThreatResponse {
    pub fn new(
        alert_id: impl Into<String>,
        actions_taken: Vec<String>,
        status: ResponseStatus,
        response_time_ms: u64,
        narrative: impl Into<String>,
    ) -> Self {
        Self {
            alert_id: alert_id.into(),
            actions_taken,
            status,
            timestamp: Utc::now(),
            response_time_ms,
            narrative: narrative.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let response = ThreatResponse::new(
            "tx_1",
            vec!["Logged low-risk security event".into()],
            ResponseStatus::Fallback,
            3,
            "n/a",
        );
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "fallback");
        assert_eq!(json["actions_taken"].as_array().unwrap().len(), 1);
    }
}
