//! The reconciled ledger entry: one row per game transaction, enriched with
//! best-effort links into the action log and the trip history.

use crate::domain::{DepartedVessel, DepartureRecord, EntryValue, TimeSec, TxContext, VesselId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Denormalized trip snapshot stored beside the departure link, so
/// downstream consumers don't need a second join for route detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub vessel_id: VesselId,
    pub vessel_name: String,
    pub origin: String,
    pub destination: String,
    pub route_name: String,
    pub distance: f64,
    pub income: i64,
}

impl From<&DepartureRecord> for TripSnapshot {
    fn from(rec: &DepartureRecord) -> Self {
        TripSnapshot {
            vessel_id: rec.vessel_id,
            vessel_name: rec.vessel_name.clone(),
            origin: rec.origin.clone(),
            destination: rec.destination.clone(),
            route_name: rec.route_name.clone(),
            distance: rec.distance,
            income: rec.income,
        }
    }
}

/// One reconciled row. The transaction reference is always present; the
/// action and departure links are enrichment and may stay unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub id: Uuid,
    /// Copy of the transaction's seconds timestamp (authoritative).
    pub time: TimeSec,
    pub transaction_id: String,
    pub action_id: Option<Uuid>,
    pub departure_id: Option<String>,
    /// Snapshot of the matched per-vessel sub-record, departure contexts only.
    pub action_vessel: Option<DepartedVessel>,
    pub departure_vessel: Option<TripSnapshot>,
    /// Copy of the transaction's amount (authoritative).
    pub cash: i64,
    pub entry_type: String,
    pub value: EntryValue,
    pub context: TxContext,
}

impl LookupEntry {
    /// Create a ledger row for a transaction. Links start empty; the build
    /// pass fills what it can before inserting.
    pub fn for_transaction(
        time: TimeSec,
        transaction_id: String,
        cash: i64,
        entry_type: String,
        value: EntryValue,
        context: TxContext,
    ) -> Self {
        LookupEntry {
            id: Uuid::new_v4(),
            time,
            transaction_id,
            action_id: None,
            departure_id: None,
            action_vessel: None,
            departure_vessel: None,
            cash,
            entry_type,
            value,
            context,
        }
    }
}
