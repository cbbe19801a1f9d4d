//! In-memory table of current alerts keyed by transaction id

use crate::types::FraudAlert;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Default)]
struct StoreInner {
    next_seq: u64,
    alerts: HashMap<String, (u64, FraudAlert)>,
    /// Insertion sequence -> alert id, oldest first
    order: BTreeMap<u64, String>,
}

/// Alert table guarded by a single lock.
///
/// Insert-or-overwrite is the only mutation. With a capacity set, inserting
/// past it evicts the least recently written alert; an overwrite counts as a
/// fresh write.
pub struct AlertStore {
    inner: RwLock<StoreInner>,
    max_alerts: Option<usize>,
}

impl AlertStore {
    pub fn new(max_alerts: Option<usize>) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            max_alerts: max_alerts.filter(|max| *max > 0),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Store `alert` under its transaction id, replacing any previous alert.
    /// Returns the previous alert for that id, if there was one.
    pub fn insert(&self, alert: FraudAlert) -> Option<FraudAlert> {
        let id = alert.alert_id().to_string();
        let mut inner = self.inner.write();

        let seq = inner.next_seq;
        inner.next_seq += 1;

        let previous = inner.alerts.insert(id.clone(), (seq, alert));
        if let Some((old_seq, _)) = &previous {
            inner.order.remove(old_seq);
        }
        inner.order.insert(seq, id);

        if let Some(max) = self.max_alerts {
            while inner.alerts.len() > max {
                let Some((_, oldest)) = inner.order.pop_first() else {
                    break;
                };
                inner.alerts.remove(&oldest);
                debug!(alert_id = %oldest, "Evicted oldest alert");
            }
        }

        previous.map(|(_, alert)| alert)
    }

    pub fn get(&self, alert_id: &str) -> Option<FraudAlert> {
        self.inner.read().alerts.get(alert_id).map(|(_, a)| a.clone())
    }

    pub fn contains(&self, alert_id: &str) -> bool {
        self.inner.read().alerts.contains_key(alert_id)
    }

    /// All stored alerts, oldest write first
    pub fn list(&self) -> Vec<FraudAlert> {
        let inner = self.inner.read();
        inner
            .order
            .values()
            .filter_map(|id| inner.alerts.get(id).map(|(_, a)| a.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.max_alerts
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn alert(id: &str, score: f64) -> FraudAlert {
        FraudAlert::new(id, "user", score, vec![])
    }

    #[test]
    fn test_insert_and_get() {
        let store = AlertStore::unbounded();
        assert!(store.insert(alert("tx_1", 0.2)).is_none());

        assert_eq!(store.get("tx_1").unwrap().risk_score, 0.2);
        assert!(store.get("tx_2").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_overwrite_replaces_entry() {
        let store = AlertStore::unbounded();
        store.insert(alert("tx_1", 0.2));
        let previous = store.insert(alert("tx_1", 0.9));

        assert_eq!(previous.unwrap().risk_score, 0.2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("tx_1").unwrap().risk_score, 0.9);
    }

    #[test]
    fn test_eviction_drops_oldest_write() {
        let store = AlertStore::new(Some(2));
        store.insert(alert("a", 0.1));
        store.insert(alert("b", 0.1));
        // Rewriting "a" makes "b" the oldest
        store.insert(alert("a", 0.5));
        store.insert(alert("c", 0.1));

        let ids: Vec<_> = store.list().into_iter().map(|a| a.transaction_id).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(!store.contains("b"));
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let store = AlertStore::new(Some(0));
        assert_eq!(store.capacity(), None);
        store.insert(alert("a", 0.1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_inserts_are_not_lost() {
        let store = Arc::new(AlertStore::unbounded());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        store.insert(alert(&format!("tx_{t}_{i}"), 0.1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 2000);
        assert!(store.contains("tx_7_249"));
    }
}
