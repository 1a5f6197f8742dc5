//! Reconciled-ledger table operations and its aggregation queries.

use super::Repository;
use crate::domain::{EntryValue, LookupEntry, TimeSec, TripSnapshot, TxContext, UserId};
use serde::Serialize;
use sqlx::Row;
use tracing::warn;
use uuid::Uuid;

fn decode_entry(row: &sqlx::sqlite::SqliteRow) -> Option<LookupEntry> {
    let id: String = row.get("id");
    let id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(e) => {
            warn!("skipping ledger row with bad id {}: {}", id, e);
            return None;
        }
    };

    let action_id: Option<String> = row.get("action_id");
    let action_id = action_id.and_then(|s| Uuid::parse_str(&s).ok());

    let action_vessel: Option<String> = row.get("action_vessel");
    let action_vessel = action_vessel.and_then(|s| match serde_json::from_str(&s) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("dropping bad action snapshot on ledger row {}: {}", id, e);
            None
        }
    });

    let departure_vessel: Option<String> = row.get("departure_vessel");
    let departure_vessel = departure_vessel.and_then(|s| match serde_json::from_str(&s) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("dropping bad trip snapshot on ledger row {}: {}", id, e);
            None
        }
    });

    let value: String = row.get("value");
    let context: String = row.get("context");

    Some(LookupEntry {
        id,
        time: TimeSec::new(row.get("time_s")),
        transaction_id: row.get("transaction_id"),
        action_id,
        departure_id: row.get("departure_id"),
        action_vessel,
        departure_vessel,
        cash: row.get("cash"),
        entry_type: row.get("entry_type"),
        value: EntryValue::parse(&value),
        context: TxContext::parse(&context),
    })
}

/// Aggregated income/expense over a window of the reconciled ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LedgerTotals {
    pub income: i64,
    pub expense: i64,
    pub entries: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeBreakdown {
    pub entry_type: String,
    pub value: EntryValue,
    pub total: i64,
    pub entries: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBreakdown {
    pub day: String,
    pub income: i64,
    pub expense: i64,
}

impl Repository {
    /// Insert a reconciled row. The unique index on (user, transaction_id)
    /// makes this a no-op if the transaction already has a ledger row, which
    /// backs the at-most-one invariant even across racing builds.
    pub async fn insert_lookup(
        &self,
        user: &UserId,
        entry: &LookupEntry,
    ) -> Result<bool, sqlx::Error> {
        let action_vessel = entry
            .action_vessel
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let departure_vessel = entry
            .departure_vessel
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO lookup_entries (
                id, user, time_s, transaction_id, action_id, departure_id,
                action_vessel, departure_vessel, cash, entry_type, value, context
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user, transaction_id) DO NOTHING
            "#,
        )
        .bind(entry.id.to_string())
        .bind(user.as_str())
        .bind(entry.time.as_i64())
        .bind(&entry.transaction_id)
        .bind(entry.action_id.map(|u| u.to_string()))
        .bind(&entry.departure_id)
        .bind(action_vessel)
        .bind(departure_vessel)
        .bind(entry.cash)
        .bind(&entry.entry_type)
        .bind(entry.value.as_str())
        .bind(entry.context.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_lookup(&self, user: &UserId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM lookup_entries WHERE user = ?")
            .bind(user.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Ledger rows at or after `from_s`, newest first.
    pub async fn query_lookup(
        &self,
        user: &UserId,
        from_s: i64,
    ) -> Result<Vec<LookupEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, time_s, transaction_id, action_id, departure_id,
                   action_vessel, departure_vessel, cash, entry_type, value, context
            FROM lookup_entries
            WHERE user = ? AND time_s >= ?
            ORDER BY time_s DESC, transaction_id ASC
            "#,
        )
        .bind(user.as_str())
        .bind(from_s)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(decode_entry).collect())
    }

    pub async fn get_lookup_entry(
        &self,
        user: &UserId,
        id: Uuid,
    ) -> Result<Option<LookupEntry>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, time_s, transaction_id, action_id, departure_id,
                   action_vessel, departure_vessel, cash, entry_type, value, context
            FROM lookup_entries
            WHERE user = ? AND id = ?
            "#,
        )
        .bind(user.as_str())
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(decode_entry))
    }

    /// Departure-related rows still missing their trip link, oldest first.
    /// Input set of the rematch pass.
    pub async fn query_missing_departure(
        &self,
        user: &UserId,
    ) -> Result<Vec<LookupEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, time_s, transaction_id, action_id, departure_id,
                   action_vessel, departure_vessel, cash, entry_type, value, context
            FROM lookup_entries
            WHERE user = ? AND departure_id IS NULL
            ORDER BY time_s ASC, transaction_id ASC
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(decode_entry)
            .filter(|e| e.context.departure_related())
            .collect())
    }

    /// Attach a trip link to an existing row. Touches exactly the departure
    /// columns; everything else on the row is immutable.
    pub async fn attach_departure(
        &self,
        user: &UserId,
        entry_id: Uuid,
        departure_id: &str,
        snapshot: &TripSnapshot,
    ) -> Result<(), sqlx::Error> {
        let snapshot =
            serde_json::to_string(snapshot).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        sqlx::query(
            r#"
            UPDATE lookup_entries
            SET departure_id = ?, departure_vessel = ?
            WHERE user = ? AND id = ? AND departure_id IS NULL
            "#,
        )
        .bind(departure_id)
        .bind(snapshot)
        .bind(user.as_str())
        .bind(entry_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn ledger_totals(
        &self,
        user: &UserId,
        from_s: i64,
    ) -> Result<LedgerTotals, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN value = 'INCOME' THEN cash ELSE 0 END), 0) AS income,
                COALESCE(SUM(CASE WHEN value = 'EXPENSE' THEN cash ELSE 0 END), 0) AS expense,
                COUNT(*) AS entries
            FROM lookup_entries
            WHERE user = ? AND time_s >= ?
            "#,
        )
        .bind(user.as_str())
        .bind(from_s)
        .fetch_one(&self.pool)
        .await?;

        Ok(LedgerTotals {
            income: row.get("income"),
            expense: row.get("expense"),
            entries: row.get("entries"),
        })
    }

    pub async fn breakdown_by_type(
        &self,
        user: &UserId,
        from_s: i64,
    ) -> Result<Vec<TypeBreakdown>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT entry_type, value, SUM(cash) AS total, COUNT(*) AS entries
            FROM lookup_entries
            WHERE user = ? AND time_s >= ?
            GROUP BY entry_type, value
            ORDER BY total ASC
            "#,
        )
        .bind(user.as_str())
        .bind(from_s)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let value: String = r.get("value");
                TypeBreakdown {
                    entry_type: r.get("entry_type"),
                    value: EntryValue::parse(&value),
                    total: r.get("total"),
                    entries: r.get("entries"),
                }
            })
            .collect())
    }

    pub async fn breakdown_by_day(
        &self,
        user: &UserId,
        from_s: i64,
    ) -> Result<Vec<DayBreakdown>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT date(time_s, 'unixepoch') AS day,
                   COALESCE(SUM(CASE WHEN value = 'INCOME' THEN cash ELSE 0 END), 0) AS income,
                   COALESCE(SUM(CASE WHEN value = 'EXPENSE' THEN cash ELSE 0 END), 0) AS expense
            FROM lookup_entries
            WHERE user = ? AND time_s >= ?
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(user.as_str())
        .bind(from_s)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| DayBreakdown {
                day: r.get("day"),
                income: r.get("income"),
                expense: r.get("expense"),
            })
            .collect())
    }

    /// Drop every reconciled row for the user. Sources are untouched; an
    /// explicit rebuild reproduces the ledger from them.
    pub async fn clear_lookup(&self, user: &UserId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM lookup_entries WHERE user = ?")
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
