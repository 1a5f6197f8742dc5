//! HTTP client for the shipping game's API.
//!
//! The game has no token auth; every request carries the account's session
//! cookie. A 401/403 usually means the cookie expired and is permanent from
//! the retry loop's point of view.

use super::{FleetRoute, FleetVessel, GameApi, GameApiError, RawTransaction, RawTrip};
use crate::domain::{CargoBreakdown, VesselId};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ShippingApiClient {
    client: Client,
    base_url: String,
    session_cookie: String,
}

impl ShippingApiClient {
    pub fn new(base_url: String, session_cookie: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            session_cookie,
        }
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, GameApiError> {
        let url = format!("{}{}", self.base_url, path);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .header(reqwest::header::COOKIE, &self.session_cookie)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(GameApiError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(GameApiError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(GameApiError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(GameApiError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(GameApiError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl GameApi for ShippingApiClient {
    async fn fetch_weekly_transactions(&self) -> Result<Vec<RawTransaction>, GameApiError> {
        debug!("Fetching weekly finance ledger");

        let response = self.get_json("/api/finance/weekly").await?;
        let rows = response
            .get("transactions")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                GameApiError::ParseError("Expected transactions array".to_string())
            })?;

        let mut transactions = Vec::new();
        for row in rows {
            match parse_transaction(row) {
                Ok(tx) => transactions.push(tx),
                Err(e) => {
                    warn!("Failed to parse transaction: {}", e);
                }
            }
        }

        Ok(transactions)
    }

    async fn fetch_fleet(&self) -> Result<Vec<FleetVessel>, GameApiError> {
        debug!("Fetching fleet roster");

        let response = self.get_json("/api/fleet").await?;
        let rows = response
            .get("vessels")
            .and_then(|v| v.as_array())
            .ok_or_else(|| GameApiError::ParseError("Expected vessels array".to_string()))?;

        let mut fleet = Vec::new();
        for row in rows {
            match parse_fleet_vessel(row) {
                Ok(vessel) => fleet.push(vessel),
                Err(e) => {
                    warn!("Failed to parse fleet vessel: {}", e);
                }
            }
        }

        Ok(fleet)
    }

    async fn fetch_vessel_history(
        &self,
        vessel_id: VesselId,
    ) -> Result<Vec<RawTrip>, GameApiError> {
        debug!("Fetching trip history for vessel {}", vessel_id);

        let response = self
            .get_json(&format!("/api/vessel/{}/history", vessel_id))
            .await?;
        let rows = response
            .get("history")
            .and_then(|v| v.as_array())
            .ok_or_else(|| GameApiError::ParseError("Expected history array".to_string()))?;

        let mut trips = Vec::new();
        for row in rows {
            match parse_trip(row) {
                Ok(trip) => trips.push(trip),
                Err(e) => {
                    warn!("Failed to parse trip for vessel {}: {}", vessel_id, e);
                }
            }
        }

        Ok(trips)
    }
}

fn parse_transaction(row: &serde_json::Value) -> Result<RawTransaction, GameApiError> {
    let time = row
        .get("time")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| GameApiError::ParseError("Missing time field".to_string()))?;

    let context = row
        .get("context")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GameApiError::ParseError("Missing context field".to_string()))?
        .to_string();

    let cash = row
        .get("cash")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| GameApiError::ParseError("Missing cash field".to_string()))?;

    Ok(RawTransaction {
        time,
        context,
        cash,
    })
}

fn parse_fleet_vessel(row: &serde_json::Value) -> Result<FleetVessel, GameApiError> {
    let id = row
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| GameApiError::ParseError("Missing id field".to_string()))?;

    let name = row
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GameApiError::ParseError("Missing name field".to_string()))?
        .to_string();

    let vessel_type = row
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let mut routes = Vec::new();
    if let Some(route_rows) = row.get("routes").and_then(|v| v.as_array()) {
        for route in route_rows {
            let origin = route.get("origin").and_then(|v| v.as_str());
            let destination = route.get("destination").and_then(|v| v.as_str());
            let hijack_risk = route
                .get("hijack_risk")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            if let (Some(origin), Some(destination)) = (origin, destination) {
                routes.push(FleetRoute {
                    origin: origin.to_string(),
                    destination: destination.to_string(),
                    hijack_risk,
                });
            }
        }
    }

    Ok(FleetVessel {
        id: VesselId::new(id),
        name,
        vessel_type,
        routes,
    })
}

fn parse_trip(row: &serde_json::Value) -> Result<RawTrip, GameApiError> {
    let created_at = row
        .get("created_at")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GameApiError::ParseError("Missing created_at field".to_string()))?
        .to_string();

    let origin = row
        .get("origin")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GameApiError::ParseError("Missing origin field".to_string()))?
        .to_string();

    let destination = row
        .get("destination")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GameApiError::ParseError("Missing destination field".to_string()))?
        .to_string();

    let route_name = row
        .get("route_name")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let income = row
        .get("income")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| GameApiError::ParseError("Missing income field".to_string()))?;

    let cargo = row
        .get("cargo")
        .map(|v| serde_json::from_value::<CargoBreakdown>(v.clone()))
        .transpose()
        .map_err(|e| GameApiError::ParseError(format!("Invalid cargo: {}", e)))?
        .unwrap_or(CargoBreakdown::Units(0));

    Ok(RawTrip {
        created_at,
        origin,
        destination,
        route_name,
        distance: row.get("distance").and_then(|v| v.as_f64()).unwrap_or(0.0),
        fuel_used: row.get("fuel_used").and_then(|v| v.as_f64()).unwrap_or(0.0),
        income,
        wear: row.get("wear").and_then(|v| v.as_f64()).unwrap_or(0.0),
        duration: row.get("duration").and_then(|v| v.as_i64()).unwrap_or(0),
        cargo,
    })
}
