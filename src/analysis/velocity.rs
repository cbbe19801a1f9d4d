//! Recent-transaction counts for the velocity analyzer

use super::signals::parse_local_timestamp;
use crate::types::TransactionRecord;
use chrono::{Duration, NaiveDateTime};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Supplies how many transactions a user made recently.
pub trait VelocitySource: Send + Sync {
    fn recent_count(&self, record: &TransactionRecord) -> u32;
}

/// Always reports the same count
#[derive(Debug, Clone, Copy)]
pub struct FixedVelocity(pub u32);

impl VelocitySource for FixedVelocity {
    fn recent_count(&self, _record: &TransactionRecord) -> u32 {
        self.0
    }
}

/// Per-user sliding window over observed transactions.
///
/// Transactions are remembered by id, so analysing the same transaction
/// twice does not inflate the count. The count covers the user's other
/// transactions whose timestamps fall in `(ts - window, ts]`. Users whose
/// newest transaction has left the window of the newest timestamp seen so
/// far are forgotten.
pub struct WindowedVelocity {
    window: Duration,
    state: Mutex<WindowState>,
}

#[derive(Default)]
struct WindowState {
    users: HashMap<String, Vec<(String, NaiveDateTime)>>,
    newest: Option<NaiveDateTime>,
}

impl WindowedVelocity {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(WindowState::default()),
        }
    }

    /// Number of users currently tracked
    pub fn tracked_users(&self) -> usize {
        self.state.lock().users.len()
    }

    /// Start of the window ending at `at`; `None` when it would underflow
    fn window_start(&self, at: NaiveDateTime) -> Option<NaiveDateTime> {
        at.checked_sub_signed(self.window)
    }
}

impl VelocitySource for WindowedVelocity {
    fn recent_count(&self, record: &TransactionRecord) -> u32 {
        let Some(at) = parse_local_timestamp(&record.timestamp) else {
            return 0;
        };

        let mut state = self.state.lock();
        let newest = state.newest.map_or(at, |newest| newest.max(at));
        state.newest = Some(newest);

        if let Some(horizon) = self.window_start(newest) {
            state.users.retain(|user, seen| {
                user == &record.user_id || seen.iter().any(|(_, ts)| *ts > horizon)
            });
        }

        let seen = state.users.entry(record.user_id.clone()).or_default();
        if !seen.iter().any(|(id, _)| id == &record.id) {
            seen.push((record.id.clone(), at));
        }

        if let Some(latest) = seen.iter().map(|(_, ts)| *ts).max() {
            if let Some(horizon) = self.window_start(latest) {
                seen.retain(|(_, ts)| *ts > horizon);
            }
        }

        let from = self.window_start(at);
        let in_window = |ts: NaiveDateTime| ts <= at && from.map_or(true, |from| ts > from);
        seen.iter()
            .filter(|(id, ts)| id != &record.id && in_window(*ts))
            .count() as u32
    }
}

#[derive(Debug, Error)]
pub enum VelocityConfigError {
    #[error("velocity window must be a positive number of seconds, got {0}")]
    InvalidWindow(i64),
}

/// Velocity source selection in configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum VelocityConfig {
    /// Constant count for every transaction
    Fixed {
        #[serde(default = "default_fixed_count")]
        count: u32,
    },
    /// Sliding window per user
    Window {
        #[serde(default = "default_window_secs")]
        window_secs: i64,
    },
}

fn default_fixed_count() -> u32 {
    3
}

fn default_window_secs() -> i64 {
    3600
}

impl Default for VelocityConfig {
    fn default() -> Self {
        VelocityConfig::Fixed {
            count: default_fixed_count(),
        }
    }
}

impl VelocityConfig {
    pub fn build(&self) -> Result<Arc<dyn VelocitySource>, VelocityConfigError> {
        match *self {
            VelocityConfig::Fixed { count } => Ok(Arc::new(FixedVelocity(count))),
            VelocityConfig::Window { window_secs } => {
                let window = Duration::try_seconds(window_secs)
                    .filter(|_| window_secs > 0)
                    .ok_or(VelocityConfigError::InvalidWindow(window_secs))?;
                Ok(Arc::new(WindowedVelocity::new(window)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str, user: &str, ts: &str) -> TransactionRecord {
        TransactionRecord::new(id, user, 10.0).with_timestamp(ts)
    }

    #[test]
    fn test_fixed_velocity() {
        let source = FixedVelocity(6);
        assert_eq!(source.recent_count(&tx("a", "u", "x")), 6);
    }

    #[test]
    fn test_window_counts_other_transactions_of_the_user() {
        let source = WindowedVelocity::new(Duration::minutes(10));
        let count = |id: &str, user: &str, ts: &str| source.recent_count(&tx(id, user, ts));

        assert_eq!(count("t1", "u1", "2024-01-15T10:00:00"), 0);
        assert_eq!(count("t2", "u1", "2024-01-15T10:02:00"), 1);
        assert_eq!(count("t3", "u1", "2024-01-15T10:05:00"), 2);
        assert_eq!(count("x1", "u2", "2024-01-15T10:05:00"), 0);

        // t1 is outside the window ending at 10:11
        assert_eq!(count("t4", "u1", "2024-01-15T10:11:00"), 2);
    }

    #[test]
    fn test_window_reanalysis_is_stable() {
        let source = WindowedVelocity::new(Duration::minutes(10));
        source.recent_count(&tx("t1", "u1", "2024-01-15T10:00:00"));

        let record = tx("t2", "u1", "2024-01-15T10:01:00");
        assert_eq!(source.recent_count(&record), 1);
        assert_eq!(source.recent_count(&record), 1);
    }

    #[test]
    fn test_window_ignores_unparsable_timestamps() {
        let source = WindowedVelocity::new(Duration::minutes(10));
        assert_eq!(source.recent_count(&tx("t1", "u1", "garbage")), 0);
    }

    #[test]
    fn test_velocity_config_parsing() {
        let fixed: VelocityConfig =
            serde_json::from_str(r#"{"source":"fixed","count":6}"#).unwrap();
        assert_eq!(fixed, VelocityConfig::Fixed { count: 6 });

        let window: VelocityConfig = serde_json::from_str(r#"{"source":"window"}"#).unwrap();
        assert_eq!(window, VelocityConfig::Window { window_secs: 3600 });
    }

    #[test]
    fn test_window_forgets_idle_users() {
        let source = WindowedVelocity::new(Duration::minutes(10));
        source.recent_count(&tx("a1", "idle", "2024-01-15T10:00:00"));
        source.recent_count(&tx("b1", "busy", "2024-01-15T10:05:00"));
        assert_eq!(source.tracked_users(), 2);

        source.recent_count(&tx("b2", "busy", "2024-01-15T10:30:00"));
        assert_eq!(source.tracked_users(), 1);
    }

    #[test]
    fn test_window_at_the_edge_of_time_does_not_panic() {
        let source = WindowedVelocity::new(Duration::hours(1));
        assert_eq!(source.window_start(NaiveDateTime::MIN), None);

        let stamp = |minutes: i64| {
            (NaiveDateTime::MIN + Duration::minutes(minutes))
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string()
        };
        assert_eq!(source.recent_count(&tx("e1", "u1", &stamp(30))), 0);
        assert_eq!(source.recent_count(&tx("e2", "u1", &stamp(40))), 1);
    }

    #[test]
    fn test_window_config_is_validated() {
        assert!(VelocityConfig::Window { window_secs: 600 }.build().is_ok());
        assert!(VelocityConfig::Fixed { count: 2 }.build().is_ok());

        for window_secs in [0, -5, i64::MAX] {
            let err = VelocityConfig::Window { window_secs }.build().err().unwrap();
            let VelocityConfigError::InvalidWindow(secs) = err;
            assert_eq!(secs, window_secs);
        }
    }
}
