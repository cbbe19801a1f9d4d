//! Random transaction generation for demos and load tests

use crate::types::TransactionRecord;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const MERCHANTS: [&str; 5] = ["Amazon", "Starbucks", "Shell", "Unknown Merchant", "Foreign Store"];
const LOCATIONS: [&str; 4] = [
    "New York, NY",
    "Los Angeles, CA",
    "Moscow, Russia",
    "London, UK",
];
const DEVICES: [&str; 4] = ["device_123", "device_456", "new_device", "unknown"];
const CARD_TYPES: [&str; 2] = ["credit", "debit"];

const SUSPICIOUS_LOCATIONS: [&str; 3] = [
    "Unknown",
    "Foreign Exchange Kiosk",
    "ATM - High-risk country",
];
const SUSPICIOUS_DEVICES: [&str; 2] = ["new_device", "unknown"];

/// Transaction generator with an explicit random source
pub struct TransactionGenerator {
    rng: StdRng,
}

impl TransactionGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Transaction drawn uniformly from the demo value pools
    pub fn generate(&mut self) -> TransactionRecord {
        let amount = round_cents(self.rng.gen_range(10.0..10_000.0));
        let mut record = self.base(amount);
        record.merchant = self.pick(&MERCHANTS);
        record.location = self.pick(&LOCATIONS);
        record.device_id = self.pick(&DEVICES);
        record
    }

    /// Small daytime purchase on a known device
    pub fn generate_legitimate(&mut self) -> TransactionRecord {
        let amount = round_cents(self.rng.gen_range(10.0..500.0));
        let mut record = self.base(amount);
        record.merchant = self.pick(&MERCHANTS[..3]);
        record.location = self.pick(&["New York, NY", "Los Angeles, CA", "London, UK"]);
        record.device_id = self.pick(&DEVICES[..2]);
        let hour = self.rng.gen_range(9..18);
        record.timestamp = self.at_hour(hour);
        record
    }

    /// Large night-time purchase from a risky location and device
    pub fn generate_suspicious(&mut self) -> TransactionRecord {
        let amount = round_cents(self.rng.gen_range(1_000.0..10_000.0));
        let mut record = self.base(amount);
        record.merchant = self.pick(&MERCHANTS[3..]);
        record.location = self.pick(&SUSPICIOUS_LOCATIONS);
        record.device_id = self.pick(&SUSPICIOUS_DEVICES);
        let hour = self.rng.gen_range(0..6);
        record.timestamp = self.at_hour(hour);
        record
    }

    fn base(&mut self, amount: f64) -> TransactionRecord {
        let id = format!("txn_{}", self.rng.gen_range(100_000..1_000_000));
        let user = format!("user_{}", self.rng.gen_range(1000..10_000));

        let mut record = TransactionRecord::new(id, user, amount);
        record.timestamp = Utc::now().naive_local().format("%Y-%m-%dT%H:%M:%S").to_string();
        record.ip_address = format!(
            "192.168.{}.{}",
            self.rng.gen_range(1..=255),
            self.rng.gen_range(1..=255)
        );
        record.card_type = self.pick(&CARD_TYPES);
        record
    }

    /// Today's date at `hour`, with random minutes
    fn at_hour(&mut self, hour: u32) -> String {
        let minute = self.rng.gen_range(0..60);
        let date = Utc::now().date_naive();
        date.and_hms_opt(hour, minute, 0)
            .map(|at| at.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_default()
    }

    fn pick(&mut self, choices: &[&str]) -> String {
        choices.choose(&mut self.rng).copied().unwrap_or_default().to_string()
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_generator_is_reproducible() {
        let a = TransactionGenerator::new(9).generate();
        let b = TransactionGenerator::new(9).generate();

        assert_eq!(a.id, b.id);
        assert_eq!(a.amount, b.amount);
        assert_eq!(a.location, b.location);
    }

    #[test]
    fn test_generated_values_come_from_pools() {
        let mut generator = TransactionGenerator::new(1);
        for _ in 0..50 {
            let tx = generator.generate();
            assert!(tx.id.starts_with("txn_"));
            assert!(tx.user_id.starts_with("user_"));
            assert!((10.0..=10_000.0).contains(&tx.amount));
            assert!(MERCHANTS.contains(&tx.merchant.as_str()));
            assert!(LOCATIONS.contains(&tx.location.as_str()));
            assert!(DEVICES.contains(&tx.device_id.as_str()));
            assert!(tx.validate().is_ok());
        }
    }

    #[test]
    fn test_suspicious_profile() {
        let mut generator = TransactionGenerator::new(5);
        for _ in 0..20 {
            let tx = generator.generate_suspicious();
            assert!(tx.amount >= 1_000.0);
            assert!(SUSPICIOUS_DEVICES.contains(&tx.device_id.as_str()));
            let hour: u32 = tx.timestamp[11..13].parse().unwrap();
            assert!(hour < 6);
        }
    }

    #[test]
    fn test_legitimate_profile() {
        let mut generator = TransactionGenerator::new(5);
        for _ in 0..20 {
            let tx = generator.generate_legitimate();
            assert!(tx.amount <= 500.0);
            let hour: u32 = tx.timestamp[11..13].parse().unwrap();
            assert!((9..18).contains(&hour));
        }
    }
}
