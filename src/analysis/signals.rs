//! Independent risk signal analyzers.
//!
//! Each analyzer looks at a slice of a transaction and returns a
//! [`RiskSignal`] with its contribution clamped to `[0, 1]`. Analyzers never
//! fail: malformed input turns into a small fixed contribution and a factor
//! describing the problem.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

pub const AMOUNT_ANALYZER: &str = "amount_analysis";
pub const LOCATION_ANALYZER: &str = "location_analysis";
pub const DEVICE_ANALYZER: &str = "device_analysis";
pub const TIME_ANALYZER: &str = "time_analysis";
pub const VELOCITY_ANALYZER: &str = "velocity_analysis";

/// Contribution used when an analyzer cannot interpret its input
pub const DEGRADED_CONTRIBUTION: f64 = 0.1;

const HIGH_AMOUNT: f64 = 5000.0;
const ELEVATED_AMOUNT: f64 = 1000.0;
const NIGHT_ENDS_AT: u32 = 6;
const NIGHT_STARTS_AFTER: u32 = 23;
const HIGH_VELOCITY: u32 = 5;
const ELEVATED_VELOCITY: u32 = 2;
const HIGH_VELOCITY_FACTOR: &str = "High transaction velocity (>5 transactions recently)";

/// One analyzer's contribution to a transaction's risk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSignal {
    pub analyzer: &'static str,
    pub factors: Vec<String>,
    pub risk_score: f64,
}

impl RiskSignal {
    pub fn new(analyzer: &'static str, factors: Vec<String>, risk_score: f64) -> Self {
        Self {
            analyzer,
            factors,
            risk_score: clamp_unit(risk_score),
        }
    }

    fn degraded(analyzer: &'static str, factor: impl Into<String>) -> Self {
        Self::new(analyzer, vec![factor.into()], DEGRADED_CONTRIBUTION)
    }
}

/// Sentinel sets the location and device analyzers match against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRules {
    /// Substrings marking a location as high risk
    #[serde(default = "default_high_risk_locations")]
    pub high_risk_locations: Vec<String>,

    /// Device identifiers treated as unknown or new
    #[serde(default = "default_unknown_devices")]
    pub unknown_devices: Vec<String>,
}

fn default_high_risk_locations() -> Vec<String> {
    vec![
        "Unknown".to_string(),
        "Foreign".to_string(),
        "High-risk country".to_string(),
    ]
}

fn default_unknown_devices() -> Vec<String> {
    vec!["unknown".to_string(), "new_device".to_string()]
}

impl Default for DetectionRules {
    fn default() -> Self {
        Self {
            high_risk_locations: default_high_risk_locations(),
            unknown_devices: default_unknown_devices(),
        }
    }
}

/// Large and round amounts
pub fn analyze_amount(amount: f64) -> RiskSignal {
    if !amount.is_finite() || amount < 0.0 {
        return RiskSignal::degraded(
            AMOUNT_ANALYZER,
            format!("Invalid transaction amount: {amount}"),
        );
    }

    let mut factors = Vec::new();
    let mut score = 0.0;

    if amount > HIGH_AMOUNT {
        factors.push("High transaction amount (>$5000)".to_string());
        score += 0.3;
    } else if amount > ELEVATED_AMOUNT {
        factors.push("Elevated transaction amount (>$1000)".to_string());
        score += 0.1;
    }

    if amount % 100.0 == 0.0 {
        factors.push("Round amount transaction".to_string());
        score += 0.05;
    }

    RiskSignal::new(AMOUNT_ANALYZER, factors, score)
}

/// High-risk regions and ATM withdrawals; both rules can fire together.
pub fn analyze_location(location: &str, rules: &DetectionRules) -> RiskSignal {
    let mut factors = Vec::new();
    let mut score = 0.0;

    if rules
        .high_risk_locations
        .iter()
        .any(|risky| location.contains(risky.as_str()))
    {
        factors.push(format!("High-risk location: {location}"));
        score += 0.4;
    }

    if location.contains("ATM") {
        factors.push("ATM transaction".to_string());
        score += 0.1;
    }

    RiskSignal::new(LOCATION_ANALYZER, factors, score)
}

/// Unknown or first-seen devices
pub fn analyze_device(device_id: &str, rules: &DetectionRules) -> RiskSignal {
    let mut factors = Vec::new();
    let mut score = 0.0;

    if rules.unknown_devices.iter().any(|d| d == device_id) {
        factors.push("Unknown or new device".to_string());
        score += 0.3;
    }

    RiskSignal::new(DEVICE_ANALYZER, factors, score)
}

/// Late-night activity, judged on the wall clock of the timestamp itself
pub fn analyze_time(timestamp: &str) -> RiskSignal {
    let Some(local) = parse_local_timestamp(timestamp) else {
        return RiskSignal::degraded(TIME_ANALYZER, "Invalid timestamp format");
    };

    let mut factors = Vec::new();
    let mut score = 0.0;

    let hour = local.hour();
    if hour < NIGHT_ENDS_AT || hour > NIGHT_STARTS_AFTER {
        factors.push(format!("Unusual transaction time: {hour}:00"));
        score += 0.2;
    }

    RiskSignal::new(TIME_ANALYZER, factors, score)
}

/// Bursts of recent transactions for the same user
pub fn analyze_velocity(recent_transactions: u32) -> RiskSignal {
    let mut factors = Vec::new();
    let mut score = 0.0;

    if recent_transactions > HIGH_VELOCITY {
        factors.push(HIGH_VELOCITY_FACTOR.to_string());
        score += 0.4;
    } else if recent_transactions > ELEVATED_VELOCITY {
        factors.push("Elevated transaction velocity".to_string());
        score += 0.2;
    }

    RiskSignal::new(VELOCITY_ANALYZER, factors, score)
}

/// Naive date-time layouts, tried in order
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Offset date-times without seconds, which RFC 3339 does not cover
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M%:z"];

/// Parse an ISO 8601 timestamp into its local wall-clock time.
///
/// Accepts RFC 3339 (with `Z` or an offset), offset date-times without
/// seconds, naive date-times separated by `T` or a space down to hour
/// precision, and bare dates, which are read as midnight.
pub fn parse_local_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(dt.naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_date_and_hour(raw))
}

/// `YYYY-MM-DD` or `YYYY-MM-DD[T ]HH`
fn parse_date_and_hour(raw: &str) -> Option<NaiveDateTime> {
    let (date, hour) = match raw.split_once(|c| c == 'T' || c == ' ') {
        Some((date, hour)) => (date, Some(hour)),
        None => (raw, None),
    };
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;

    let hour = match hour {
        None => 0,
        Some(h) if h.len() == 2 && h.bytes().all(|b| b.is_ascii_digit()) => h.parse().ok()?,
        Some(_) => return None,
    };
    date.and_hms_opt(hour, 0, 0)
}

fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
