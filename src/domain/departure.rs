//! Departure record: one vessel's single historical trip, as reported by
//! the game's per-vessel history endpoint.

use crate::domain::{TimeMs, VesselId};
use serde::{Deserialize, Serialize};

/// Cargo carried on a trip. The API reports different shapes per vessel
/// class: container ships report unit counts, tankers and bulkers report
/// tonnage, mixed freighters an itemized manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CargoBreakdown {
    Units(i64),
    Tonnage { tons: f64 },
    Manifest(Vec<CargoItem>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CargoItem {
    pub name: String,
    pub amount: f64,
}

/// One historical trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartureRecord {
    /// Deterministic id, `dep:<vessel_id>:<timestamp_ms>`.
    pub id: String,
    pub vessel_id: VesselId,
    pub vessel_name: String,
    /// Milliseconds since epoch, parsed from the API's UTC text timestamp.
    pub timestamp: TimeMs,
    pub origin: String,
    pub destination: String,
    pub route_name: String,
    pub distance: f64,
    pub fuel_used: f64,
    /// Net income; the harbor fee is already excluded.
    pub income: i64,
    pub wear: f64,
    /// Trip duration in seconds.
    pub duration: i64,
    pub cargo: CargoBreakdown,
}

impl DepartureRecord {
    /// Derive the stable id from (vessel id, trip timestamp), so repeated
    /// syncs of overlapping history windows dedupe.
    pub fn compute_id(vessel_id: VesselId, timestamp: TimeMs) -> String {
        format!("dep:{}:{}", vessel_id.as_i64(), timestamp.as_i64())
    }
}

/// Parse the API's textual trip timestamp (`YYYY-MM-DD HH:MM:SS`).
/// The API emits wall-clock UTC with no offset marker.
pub fn parse_history_timestamp(raw: &str) -> Result<TimeMs, chrono::ParseError> {
    let naive = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")?;
    Ok(TimeMs::new(naive.and_utc().timestamp_millis()))
}
