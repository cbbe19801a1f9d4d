//! Case investigation assistant behind the case-escalation boundary

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

const TRANSACTION_ANALYSIS_STEPS: [&str; 4] = [
    "Transaction pattern analysis completed",
    "Historical data reviewed",
    "Similar cases identified",
    "Risk assessment updated",
];

const USER_PROFILE_STEPS: [&str; 4] = [
    "User behavior profile analyzed",
    "Account history reviewed",
    "Previous fraud incidents checked",
    "Risk profile updated",
];

const EVIDENCE_COLLECTION_STEPS: [&str; 4] = [
    "Transaction logs collected",
    "Device fingerprints analyzed",
    "IP geolocation verified",
    "Evidence package prepared",
];

const GENERAL_STEPS: [&str; 2] = ["General investigation completed", "Case reviewed"];

const ADDITIONAL_STEPS: [&str; 4] = [
    "Cross-referenced with fraud database",
    "Machine learning insights generated",
    "Regulatory compliance checked",
    "Documentation updated",
];

#[derive(Debug, Error)]
pub enum CaseError {
    #[error("case payload must be a JSON object, got {0}")]
    InvalidPayload(&'static str),

    #[error("case id must not be empty")]
    MissingCaseId,
}

/// Kind of investigation requested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    TransactionAnalysis,
    UserProfile,
    EvidenceCollection,
    #[serde(untagged)]
    Other(String),
}

impl RequestType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "transaction_analysis" => RequestType::TransactionAnalysis,
            "user_profile" => RequestType::UserProfile,
            "evidence_collection" => RequestType::EvidenceCollection,
            other => RequestType::Other(other.to_string()),
        }
    }

    fn steps(&self) -> &'static [&'static str] {
        match self {
            RequestType::TransactionAnalysis => &TRANSACTION_ANALYSIS_STEPS,
            RequestType::UserProfile => &USER_PROFILE_STEPS,
            RequestType::EvidenceCollection => &EVIDENCE_COLLECTION_STEPS,
            RequestType::Other(_) => &GENERAL_STEPS,
        }
    }

    fn recommendations(&self) -> [&'static str; 3] {
        match self {
            RequestType::TransactionAnalysis => [
                "Monitor user for 30 days",
                "Implement additional verification",
                "Update fraud detection rules",
            ],
            RequestType::UserProfile => [
                "Review account security settings",
                "Educate user about fraud prevention",
                "Consider account restrictions",
            ],
            RequestType::EvidenceCollection => [
                "Prepare case for legal review",
                "Document all evidence",
                "Coordinate with law enforcement if needed",
            ],
            RequestType::Other(_) => [
                "Continue monitoring",
                "Follow standard procedures",
                "Escalate if necessary",
            ],
        }
    }
}

/// Incoming investigation request
#[derive(Debug, Clone, Deserialize)]
pub struct InvestigationRequest {
    pub case_id: String,
    pub request_type: RequestType,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestigationStatus {
    Completed,
    Error,
}

/// Best-effort investigation summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestigationReport {
    pub case_id: String,
    pub investigation_type: RequestType,
    pub steps_completed: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence_score: f64,
    pub estimated_completion_time: String,
    pub status: InvestigationStatus,
    pub timestamp: DateTime<Utc>,
}

impl InvestigationReport {
    /// Zero-confidence report asking for a human analyst
    pub fn degraded(request: &InvestigationRequest) -> Self {
        Self {
            case_id: request.case_id.clone(),
            investigation_type: request.request_type.clone(),
            steps_completed: vec![
                "Error in investigation".to_string(),
                "Manual review required".to_string(),
            ],
            recommendations: vec!["Escalate to human analyst".to_string()],
            confidence_score: 0.0,
            estimated_completion_time: "Unknown".to_string(),
            status: InvestigationStatus::Error,
            timestamp: Utc::now(),
        }
    }
}

/// Source of the per-case randomness
pub trait Variability: Send + Sync {
    fn rng_for(&self, case_id: &str) -> StdRng;
}

/// Deterministic per case id: the same seed and case id always produce the
/// same report.
#[derive(Debug, Clone, Copy)]
pub struct SeededVariability {
    seed: u64,
}

impl SeededVariability {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Variability for SeededVariability {
    fn rng_for(&self, case_id: &str) -> StdRng {
        // FNV-1a over the case id, mixed with the configured seed
        let hash = case_id.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
            (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
        });
        StdRng::seed_from_u64(self.seed ^ hash)
    }
}

pub struct CaseManager {
    variability: Box<dyn Variability>,
}

impl CaseManager {
    pub fn new(variability: Box<dyn Variability>) -> Self {
        Self { variability }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Box::new(SeededVariability::new(seed)))
    }

    /// Run an investigation. Failures never propagate: the caller gets a
    /// degraded report with zero confidence instead.
    pub fn assist(&self, request: &InvestigationRequest) -> InvestigationReport {
        match self.investigate(request) {
            Ok(report) => {
                info!(
                    case_id = %report.case_id,
                    steps = report.steps_completed.len(),
                    confidence = report.confidence_score,
                    "Investigation completed"
                );
                report
            }
            Err(e) => {
                error!(case_id = %request.case_id, error = %e, "Investigation failed");
                InvestigationReport::degraded(request)
            }
        }
    }

    fn investigate(
        &self,
        request: &InvestigationRequest,
    ) -> Result<InvestigationReport, CaseError> {
        if request.case_id.trim().is_empty() {
            return Err(CaseError::MissingCaseId);
        }
        match &request.data {
            serde_json::Value::Object(_) | serde_json::Value::Null => {}
            serde_json::Value::Array(_) => return Err(CaseError::InvalidPayload("array")),
            serde_json::Value::String(_) => return Err(CaseError::InvalidPayload("string")),
            serde_json::Value::Number(_) => return Err(CaseError::InvalidPayload("number")),
            serde_json::Value::Bool(_) => return Err(CaseError::InvalidPayload("bool")),
        }

        let mut rng = self.variability.rng_for(&request.case_id);
        let kind = &request.request_type;

        let mut steps: Vec<String> = kind.steps().iter().map(|s| s.to_string()).collect();
        if rng.gen_bool(0.5) {
            steps.extend(
                ADDITIONAL_STEPS
                    .choose_multiple(&mut rng, 2)
                    .map(|s| s.to_string()),
            );
        }

        Ok(InvestigationReport {
            case_id: request.case_id.clone(),
            investigation_type: kind.clone(),
            steps_completed: steps,
            recommendations: kind.recommendations().iter().map(|s| s.to_string()).collect(),
            confidence_score: rng.gen_range(0.70..0.95),
            estimated_completion_time: format!("{} hours", rng.gen_range(2..=8)),
            status: InvestigationStatus::Completed,
            timestamp: Utc::now(),
        })
    }
}
