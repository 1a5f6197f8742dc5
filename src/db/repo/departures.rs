//! Trip-history table operations (source 3) and vessel sync bookkeeping.

use super::Repository;
use crate::domain::{CargoBreakdown, DepartureRecord, TimeMs, UserId, VesselId};
use serde::Serialize;
use sqlx::Row;
use tracing::warn;

fn decode_departure(row: &sqlx::sqlite::SqliteRow) -> Option<DepartureRecord> {
    let id: String = row.get("id");
    let cargo: String = row.get("cargo");
    let cargo = match serde_json::from_str(&cargo) {
        Ok(c) => c,
        Err(e) => {
            warn!("skipping trip row {} with bad cargo payload: {}", id, e);
            return None;
        }
    };

    Some(DepartureRecord {
        id,
        vessel_id: VesselId::new(row.get("vessel_id")),
        vessel_name: row.get("vessel_name"),
        timestamp: TimeMs::new(row.get("timestamp_ms")),
        origin: row.get("origin"),
        destination: row.get("destination"),
        route_name: row.get("route_name"),
        distance: row.get("distance"),
        fuel_used: row.get("fuel_used"),
        income: row.get("income"),
        wear: row.get("wear"),
        duration: row.get("duration_s"),
        cargo,
    })
}

/// Aggregated per-vessel figures over the trip history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VesselPerformance {
    pub vessel_id: i64,
    pub vessel_name: String,
    pub trips: i64,
    pub income: i64,
    pub fuel_used: f64,
    pub distance: f64,
}

/// Aggregated per-route figures, joined with observed hijacking risk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePerformance {
    pub origin: String,
    pub destination: String,
    pub trips: i64,
    pub income: i64,
    pub distance: f64,
    pub hijack_risk: Option<f64>,
}

impl Repository {
    /// Insert a trip record idempotently. Returns true if the row was new.
    pub async fn insert_departure(
        &self,
        user: &UserId,
        rec: &DepartureRecord,
    ) -> Result<bool, sqlx::Error> {
        let cargo =
            serde_json::to_string(&rec.cargo).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO vessel_history (
                id, user, vessel_id, vessel_name, timestamp_ms, origin, destination,
                route_name, distance, fuel_used, income, wear, duration_s, cargo
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user, id) DO NOTHING
            "#,
        )
        .bind(&rec.id)
        .bind(user.as_str())
        .bind(rec.vessel_id.as_i64())
        .bind(&rec.vessel_name)
        .bind(rec.timestamp.as_i64())
        .bind(&rec.origin)
        .bind(&rec.destination)
        .bind(&rec.route_name)
        .bind(rec.distance)
        .bind(rec.fuel_used)
        .bind(rec.income)
        .bind(rec.wear)
        .bind(rec.duration)
        .bind(cargo)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Trips within `[from_ms, to_ms]`, oldest first.
    pub async fn query_departures(
        &self,
        user: &UserId,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<DepartureRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, vessel_id, vessel_name, timestamp_ms, origin, destination,
                   route_name, distance, fuel_used, income, wear, duration_s, cargo
            FROM vessel_history
            WHERE user = ? AND timestamp_ms >= ? AND timestamp_ms <= ?
            ORDER BY timestamp_ms ASC, id ASC
            "#,
        )
        .bind(user.as_str())
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(decode_departure).collect())
    }

    pub async fn get_departure(
        &self,
        user: &UserId,
        id: &str,
    ) -> Result<Option<DepartureRecord>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, vessel_id, vessel_name, timestamp_ms, origin, destination,
                   route_name, distance, fuel_used, income, wear, duration_s, cargo
            FROM vessel_history
            WHERE user = ? AND id = ?
            "#,
        )
        .bind(user.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(decode_departure))
    }

    /// Ensure a bookkeeping row exists for a fleet vessel, refreshing its
    /// name and type from the roster.
    pub async fn upsert_vessel(
        &self,
        user: &UserId,
        vessel_id: VesselId,
        name: &str,
        vessel_type: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO vessel_sync (user, vessel_id, vessel_name, vessel_type)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user, vessel_id) DO UPDATE SET
                vessel_name = excluded.vessel_name,
                vessel_type = excluded.vessel_type
            "#,
        )
        .bind(user.as_str())
        .bind(vessel_id.as_i64())
        .bind(name)
        .bind(vessel_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record the outcome of syncing one vessel's history.
    pub async fn update_vessel_sync(
        &self,
        user: &UserId,
        vessel_id: VesselId,
        newest_entry_ms: Option<i64>,
        added: i64,
        synced_at_ms: i64,
    ) -> Result<(), sqlx::Error> {
        // Newest-entry watermark only moves forward.
        sqlx::query(
            r#"
            UPDATE vessel_sync SET
                newest_entry_ms = CASE
                    WHEN ?1 IS NULL THEN newest_entry_ms
                    WHEN newest_entry_ms IS NULL OR ?1 > newest_entry_ms THEN ?1
                    ELSE newest_entry_ms
                END,
                entry_count = entry_count + ?2,
                last_synced_ms = ?3
            WHERE user = ?4 AND vessel_id = ?5
            "#,
        )
        .bind(newest_entry_ms)
        .bind(added)
        .bind(synced_at_ms)
        .bind(user.as_str())
        .bind(vessel_id.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The newest trip timestamp recorded for a vessel, if any yet.
    pub async fn vessel_newest_entry(
        &self,
        user: &UserId,
        vessel_id: VesselId,
    ) -> Result<Option<i64>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT newest_entry_ms FROM vessel_sync WHERE user = ? AND vessel_id = ?",
        )
        .bind(user.as_str())
        .bind(vessel_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| r.get::<Option<i64>, _>("newest_entry_ms")))
    }

    /// One-time repair: tanker trips ingested before the tonnage shape was
    /// understood carry a bare unit count in the cargo column; rewrite those
    /// into the tonnage shape. Returns the number of repaired rows.
    pub async fn repair_tanker_cargo(&self, user: &UserId) -> Result<u64, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT h.id, h.cargo
            FROM vessel_history h
            JOIN vessel_sync v ON v.user = h.user AND v.vessel_id = h.vessel_id
            WHERE h.user = ? AND v.vessel_type = 'tanker'
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut repaired = 0u64;
        for row in rows {
            let id: String = row.get("id");
            let cargo: String = row.get("cargo");
            let parsed: Option<CargoBreakdown> = serde_json::from_str(&cargo).ok();
            if let Some(CargoBreakdown::Units(units)) = parsed {
                let fixed = serde_json::to_string(&CargoBreakdown::Tonnage {
                    tons: units as f64,
                })
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
                sqlx::query("UPDATE vessel_history SET cargo = ? WHERE user = ? AND id = ?")
                    .bind(fixed)
                    .bind(user.as_str())
                    .bind(&id)
                    .execute(&self.pool)
                    .await?;
                repaired += 1;
            }
        }

        Ok(repaired)
    }

    /// Per-vessel aggregation over trips at or after `from_ms`.
    pub async fn vessel_performance(
        &self,
        user: &UserId,
        from_ms: i64,
    ) -> Result<Vec<VesselPerformance>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT vessel_id, vessel_name, COUNT(*) AS trips, SUM(income) AS income,
                   SUM(fuel_used) AS fuel_used, SUM(distance) AS distance
            FROM vessel_history
            WHERE user = ? AND timestamp_ms >= ?
            GROUP BY vessel_id, vessel_name
            ORDER BY income DESC
            "#,
        )
        .bind(user.as_str())
        .bind(from_ms)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| VesselPerformance {
                vessel_id: r.get("vessel_id"),
                vessel_name: r.get("vessel_name"),
                trips: r.get("trips"),
                income: r.get("income"),
                fuel_used: r.get("fuel_used"),
                distance: r.get("distance"),
            })
            .collect())
    }

    /// Per-route aggregation over trips, joined with the max hijack risk
    /// observed for the pair.
    pub async fn route_performance(
        &self,
        user: &UserId,
        from_ms: i64,
    ) -> Result<Vec<RoutePerformance>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT h.origin, h.destination, COUNT(*) AS trips, SUM(h.income) AS income,
                   SUM(h.distance) AS distance, r.hijack_risk
            FROM vessel_history h
            LEFT JOIN route_risk r
              ON r.user = h.user AND r.origin = h.origin AND r.destination = h.destination
            WHERE h.user = ? AND h.timestamp_ms >= ?
            GROUP BY h.origin, h.destination
            ORDER BY income DESC
            "#,
        )
        .bind(user.as_str())
        .bind(from_ms)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| RoutePerformance {
                origin: r.get("origin"),
                destination: r.get("destination"),
                trips: r.get("trips"),
                income: r.get("income"),
                distance: r.get("distance"),
                hijack_risk: r.get("hijack_risk"),
            })
            .collect())
    }
}
