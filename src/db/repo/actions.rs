//! Action-log table operations (source 2, this system's own audit log).

use super::Repository;
use crate::domain::{ActionKind, ActionLogEntry, ActionStatus, TimeMs, UserId};
use sqlx::Row;
use tracing::warn;
use uuid::Uuid;

fn decode_action(row: &sqlx::sqlite::SqliteRow) -> Option<ActionLogEntry> {
    let id: String = row.get("id");
    let id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(e) => {
            warn!("skipping action-log row with bad id {}: {}", id, e);
            return None;
        }
    };

    let details: String = row.get("details");
    let details = match serde_json::from_str(&details) {
        Ok(d) => d,
        Err(e) => {
            warn!("skipping action-log row {} with bad details: {}", id, e);
            return None;
        }
    };

    let kind: String = row.get("kind");
    let status: String = row.get("status");

    Some(ActionLogEntry {
        id,
        timestamp: TimeMs::new(row.get("timestamp_ms")),
        kind: ActionKind::parse(&kind),
        status: ActionStatus::parse(&status),
        summary: row.get("summary"),
        details,
    })
}

impl Repository {
    /// Insert an action-log entry. Returns true if the row was new.
    pub async fn insert_action(
        &self,
        user: &UserId,
        entry: &ActionLogEntry,
    ) -> Result<bool, sqlx::Error> {
        let details = serde_json::to_string(&entry.details)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO action_log (id, user, timestamp_ms, kind, status, summary, details)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(entry.id.to_string())
        .bind(user.as_str())
        .bind(entry.timestamp.as_i64())
        .bind(entry.kind.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.summary)
        .bind(details)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Entries within `[from_ms, to_ms]`, oldest first. Rows whose stored
    /// payload fails to decode are skipped with a warning rather than
    /// failing the whole read.
    pub async fn query_actions(
        &self,
        user: &UserId,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<ActionLogEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp_ms, kind, status, summary, details
            FROM action_log
            WHERE user = ? AND timestamp_ms >= ? AND timestamp_ms <= ?
            ORDER BY timestamp_ms ASC, id ASC
            "#,
        )
        .bind(user.as_str())
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(decode_action).collect())
    }

    pub async fn get_action(
        &self,
        user: &UserId,
        id: Uuid,
    ) -> Result<Option<ActionLogEntry>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, timestamp_ms, kind, status, summary, details
            FROM action_log
            WHERE user = ? AND id = ?
            "#,
        )
        .bind(user.as_str())
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(decode_action))
    }

    /// Bulk delete, the one mutation users may apply to their log.
    pub async fn delete_actions(&self, user: &UserId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM action_log WHERE user = ?")
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::{ActionDetails, AmountField};
    use tempfile::TempDir;

    async fn setup() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn fuel_entry(ts_ms: i64, cost: i64) -> ActionLogEntry {
        ActionLogEntry::new(
            TimeMs::new(ts_ms),
            ActionKind::AutoFuel,
            ActionStatus::Success,
            "Refueled fleet",
            ActionDetails::Purchase {
                cost: AmountField::Flat(cost),
            },
        )
    }

    #[tokio::test]
    async fn test_insert_and_query_round_trip() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");
        let entry = fuel_entry(1_000_000, 500);

        assert!(repo.insert_action(&user, &entry).await.unwrap());

        let found = repo.query_actions(&user, 0, 2_000_000).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0], entry);
    }

    #[tokio::test]
    async fn test_get_action_by_id() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");
        let entry = fuel_entry(1_000_000, 500);
        repo.insert_action(&user, &entry).await.unwrap();

        let found = repo.get_action(&user, entry.id).await.unwrap();
        assert_eq!(found, Some(entry));

        let missing = repo.get_action(&user, Uuid::new_v4()).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_actions_is_per_user() {
        let (repo, _temp) = setup().await;
        let alice = UserId::new("1");
        let bob = UserId::new("2");
        repo.insert_action(&alice, &fuel_entry(1_000_000, 500))
            .await
            .unwrap();
        repo.insert_action(&bob, &fuel_entry(2_000_000, 700))
            .await
            .unwrap();

        assert_eq!(repo.delete_actions(&alice).await.unwrap(), 1);
        assert_eq!(repo.query_actions(&bob, 0, i64::MAX).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_details_skipped_not_fatal() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");
        let good = fuel_entry(1_000_000, 500);
        repo.insert_action(&user, &good).await.unwrap();

        sqlx::query(
            "INSERT INTO action_log (id, user, timestamp_ms, kind, status, summary, details)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user.as_str())
        .bind(1_500_000_i64)
        .bind("Auto-Fuel")
        .bind("SUCCESS")
        .bind("corrupt")
        .bind("{not json")
        .execute(repo.pool())
        .await
        .unwrap();

        let found = repo.query_actions(&user, 0, i64::MAX).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0], good);
    }
}
