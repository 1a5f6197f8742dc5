//! Per-user key/value metadata and route hijack risk.
//!
//! The meta table carries small bookkeeping values: last transaction sync,
//! the stored ledger version, and the trip-sync resume state blob.

use super::Repository;
use crate::domain::UserId;
use serde::Serialize;
use sqlx::Row;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRisk {
    pub origin: String,
    pub destination: String,
    pub hijack_risk: f64,
}

impl Repository {
    pub async fn get_meta(
        &self,
        user: &UserId,
        key: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query("SELECT value FROM sync_meta WHERE user = ? AND key = ?")
            .bind(user.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    pub async fn set_meta(
        &self,
        user: &UserId,
        key: &str,
        value: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO sync_meta (user, key, value) VALUES (?, ?, ?)
            ON CONFLICT(user, key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(user.as_str())
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_meta(&self, user: &UserId, key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sync_meta WHERE user = ? AND key = ?")
            .bind(user.as_str())
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record the hijack risk seen on a route. Risk only ratchets upward so a
    /// temporary dip in the fleet data doesn't erase a known-dangerous leg.
    pub async fn upsert_route_risk(
        &self,
        user: &UserId,
        origin: &str,
        destination: &str,
        risk: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO route_risk (user, origin, destination, hijack_risk) VALUES (?, ?, ?, ?)
            ON CONFLICT(user, origin, destination)
            DO UPDATE SET hijack_risk = MAX(route_risk.hijack_risk, excluded.hijack_risk)
            "#,
        )
        .bind(user.as_str())
        .bind(origin)
        .bind(destination)
        .bind(risk)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn query_route_risks(&self, user: &UserId) -> Result<Vec<RouteRisk>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT origin, destination, hijack_risk
            FROM route_risk
            WHERE user = ?
            ORDER BY hijack_risk DESC, origin ASC
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| RouteRisk {
                origin: r.get("origin"),
                destination: r.get("destination"),
                hijack_risk: r.get("hijack_risk"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
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

    #[tokio::test]
    async fn test_meta_set_get_overwrite() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");

        assert_eq!(repo.get_meta(&user, "ledger_version").await.unwrap(), None);

        repo.set_meta(&user, "ledger_version", "2").await.unwrap();
        assert_eq!(
            repo.get_meta(&user, "ledger_version").await.unwrap(),
            Some("2".to_string())
        );

        repo.set_meta(&user, "ledger_version", "3").await.unwrap();
        assert_eq!(
            repo.get_meta(&user, "ledger_version").await.unwrap(),
            Some("3".to_string())
        );
    }

    #[tokio::test]
    async fn test_meta_is_per_user() {
        let (repo, _temp) = setup().await;
        repo.set_meta(&UserId::new("1"), "k", "a").await.unwrap();

        assert_eq!(repo.get_meta(&UserId::new("2"), "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_meta() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");
        repo.set_meta(&user, "resume", "{}").await.unwrap();
        repo.delete_meta(&user, "resume").await.unwrap();
        assert_eq!(repo.get_meta(&user, "resume").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_route_risk_only_ratchets_up() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");

        repo.upsert_route_risk(&user, "Hamburg", "Lagos", 4.0)
            .await
            .unwrap();
        repo.upsert_route_risk(&user, "Hamburg", "Lagos", 2.0)
            .await
            .unwrap();
        repo.upsert_route_risk(&user, "Hamburg", "Lagos", 6.5)
            .await
            .unwrap();

        let risks = repo.query_route_risks(&user).await.unwrap();
        assert_eq!(risks.len(), 1);
        assert_eq!(risks[0].hijack_risk, 6.5);
    }
}
