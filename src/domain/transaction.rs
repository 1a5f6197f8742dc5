//! Transaction type: one immutable fact from the game's financial ledger.

use crate::domain::{TimeMs, TimeSec, TxContext};
use serde::{Deserialize, Serialize};

/// A single ledger transaction as reported by the game API.
///
/// The id is derived from the record's content, so re-fetching the same
/// transaction after a restart dedupes instead of duplicating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Deterministic id, `tx:<hex>`.
    pub id: String,
    /// Seconds since epoch (the API's native unit).
    pub time: TimeSec,
    /// Economic event kind.
    pub context: TxContext,
    /// Signed amount; positive income, negative expense.
    pub cash: i64,
}

impl Transaction {
    pub fn new(time: TimeSec, context: TxContext, cash: i64) -> Self {
        let id = Self::compute_id(time, &context, cash);
        Transaction {
            id,
            time,
            context,
            cash,
        }
    }

    /// Derive the stable id from (time, context, cash).
    pub fn compute_id(time: TimeSec, context: &TxContext, cash: i64) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(time.as_i64().to_le_bytes());
        hasher.update(context.as_str().as_bytes());
        hasher.update(cash.to_le_bytes());
        let hash = hasher.finalize();
        format!("tx:{}", hex::encode(&hash[..16]))
    }

    /// Transaction instant widened to milliseconds for window comparisons.
    pub fn time_ms(&self) -> TimeMs {
        self.time.as_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_deterministic() {
        let a = Transaction::new(TimeSec::new(1000), TxContext::FuelPurchased, -500);
        let b = Transaction::new(TimeSec::new(1000), TxContext::FuelPurchased, -500);
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("tx:"));
        assert_eq!(a.id.len(), 3 + 32);
    }

    #[test]
    fn test_id_differs_per_field() {
        let base = Transaction::new(TimeSec::new(1000), TxContext::FuelPurchased, -500);
        let other_time = Transaction::new(TimeSec::new(1001), TxContext::FuelPurchased, -500);
        let other_cash = Transaction::new(TimeSec::new(1000), TxContext::FuelPurchased, -501);
        let other_ctx = Transaction::new(TimeSec::new(1000), TxContext::VesselRepaired, -500);
        assert_ne!(base.id, other_time.id);
        assert_ne!(base.id, other_cash.id);
        assert_ne!(base.id, other_ctx.id);
    }

    #[test]
    fn test_time_ms_conversion() {
        let tx = Transaction::new(TimeSec::new(1000), TxContext::VesselsDeparted, 110);
        assert_eq!(tx.time_ms(), TimeMs::new(1_000_000));
    }

    #[test]
    fn test_serialization_round_trip() {
        let tx = Transaction::new(TimeSec::new(1000), TxContext::parse("odd_tag"), 7);
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, back);
    }
}
