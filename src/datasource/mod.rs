//! Game API abstraction for fetching the financial ledger, the fleet roster,
//! and per-vessel trip history.

use crate::domain::{CargoBreakdown, VesselId};
use async_trait::async_trait;
use std::fmt;

pub mod mock;
pub mod shipping;

pub use mock::MockGameApi;
pub use shipping::ShippingApiClient;

/// One row of the game's weekly finance ledger, as the API reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTransaction {
    /// Seconds since epoch (the API's native unit).
    pub time: i64,
    /// Context tag, e.g. "vessels_departed".
    pub context: String,
    /// Signed amount; positive income, negative expense.
    pub cash: i64,
}

/// One completed trip from a vessel's history page.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrip {
    /// Textual "YYYY-MM-DD HH:MM:SS" timestamp, UTC.
    pub created_at: String,
    pub origin: String,
    pub destination: String,
    pub route_name: String,
    pub distance: f64,
    pub fuel_used: f64,
    /// Net of harbor fee.
    pub income: i64,
    pub wear: f64,
    /// Trip duration in seconds.
    pub duration: i64,
    pub cargo: CargoBreakdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FleetRoute {
    pub origin: String,
    pub destination: String,
    /// Hijack risk in percent.
    pub hijack_risk: f64,
}

/// A vessel from the fleet roster, with its assigned routes.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetVessel {
    pub id: VesselId,
    pub name: String,
    pub vessel_type: String,
    pub routes: Vec<FleetRoute>,
}

/// Game API trait. The account is selected by the session cookie the
/// implementation carries, so methods take no user argument.
///
/// Implementations must handle retry/backoff and rate limiting.
#[async_trait]
pub trait GameApi: Send + Sync + fmt::Debug {
    /// Fetch the rolling weekly finance ledger.
    async fn fetch_weekly_transactions(&self) -> Result<Vec<RawTransaction>, GameApiError>;

    /// Fetch the current fleet roster with route assignments.
    async fn fetch_fleet(&self) -> Result<Vec<FleetVessel>, GameApiError>;

    /// Fetch the full trip history of one vessel, newest first.
    async fn fetch_vessel_history(
        &self,
        vessel_id: VesselId,
    ) -> Result<Vec<RawTrip>, GameApiError>;
}

/// Error type for game API operations.
#[derive(Debug, Clone)]
pub enum GameApiError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 5xx server error, expired session cookie)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded
    RateLimited,
    /// Other error
    Other(String),
}

impl fmt::Display for GameApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameApiError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            GameApiError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            GameApiError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            GameApiError::RateLimited => write!(f, "Rate limited"),
            GameApiError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for GameApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_api_error_display() {
        let err = GameApiError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = GameApiError::HttpError {
            status: 401,
            message: "Session expired".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 401: Session expired");

        let err = GameApiError::ParseError("invalid JSON".to_string());
        assert_eq!(err.to_string(), "Parse error: invalid JSON");

        let err = GameApiError::RateLimited;
        assert_eq!(err.to_string(), "Rate limited");
    }
}
