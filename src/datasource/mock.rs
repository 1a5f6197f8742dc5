//! Mock game API for testing without network calls.

use super::{FleetVessel, GameApi, GameApiError, RawTransaction, RawTrip};
use crate::domain::VesselId;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Mock game API that returns predefined test data. Per-call failures can be
/// injected to exercise warn-and-skip paths.
#[derive(Debug, Clone, Default)]
pub struct MockGameApi {
    transactions: Vec<RawTransaction>,
    fleet: Vec<FleetVessel>,
    history: HashMap<i64, Vec<RawTrip>>,
    fail_transactions: bool,
    fail_history_for: HashSet<i64>,
}

impl MockGameApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transaction(mut self, tx: RawTransaction) -> Self {
        self.transactions.push(tx);
        self
    }

    pub fn with_transactions(mut self, txs: Vec<RawTransaction>) -> Self {
        self.transactions.extend(txs);
        self
    }

    pub fn with_fleet_vessel(mut self, vessel: FleetVessel) -> Self {
        self.fleet.push(vessel);
        self
    }

    pub fn with_history(mut self, vessel_id: VesselId, trips: Vec<RawTrip>) -> Self {
        self.history.insert(vessel_id.as_i64(), trips);
        self
    }

    /// Make fetch_weekly_transactions return a network error.
    pub fn with_failing_transactions(mut self) -> Self {
        self.fail_transactions = true;
        self
    }

    /// Make fetch_vessel_history fail for one vessel only.
    pub fn with_failing_history(mut self, vessel_id: VesselId) -> Self {
        self.fail_history_for.insert(vessel_id.as_i64());
        self
    }
}

#[async_trait]
impl GameApi for MockGameApi {
    async fn fetch_weekly_transactions(&self) -> Result<Vec<RawTransaction>, GameApiError> {
        if self.fail_transactions {
            return Err(GameApiError::NetworkError("mock failure".to_string()));
        }
        Ok(self.transactions.clone())
    }

    async fn fetch_fleet(&self) -> Result<Vec<FleetVessel>, GameApiError> {
        Ok(self.fleet.clone())
    }

    async fn fetch_vessel_history(
        &self,
        vessel_id: VesselId,
    ) -> Result<Vec<RawTrip>, GameApiError> {
        if self.fail_history_for.contains(&vessel_id.as_i64()) {
            return Err(GameApiError::HttpError {
                status: 500,
                message: "mock failure".to_string(),
            });
        }
        Ok(self
            .history
            .get(&vessel_id.as_i64())
            .cloned()
            .unwrap_or_default())
    }
}
