//! Transaction table operations (source 1, the authoritative ledger).

use super::Repository;
use crate::domain::{TimeSec, Transaction, TxContext, UserId};
use sqlx::Row;

fn decode_transaction(row: &sqlx::sqlite::SqliteRow) -> Transaction {
    let context: String = row.get("context");
    Transaction {
        id: row.get("id"),
        time: TimeSec::new(row.get("time_s")),
        context: TxContext::parse(&context),
        cash: row.get("cash"),
    }
}

impl Repository {
    /// Insert a transaction idempotently. Returns true if the row was new.
    pub async fn insert_transaction(
        &self,
        user: &UserId,
        tx: &Transaction,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (id, user, time_s, context, cash, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user, id) DO NOTHING
            "#,
        )
        .bind(&tx.id)
        .bind(user.as_str())
        .bind(tx.time.as_i64())
        .bind(tx.context.as_str())
        .bind(tx.cash)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_transactions(&self, user: &UserId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE user = ?")
            .bind(user.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// All transactions at or after `from_s`, oldest first.
    pub async fn query_transactions(
        &self,
        user: &UserId,
        from_s: i64,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, time_s, context, cash
            FROM transactions
            WHERE user = ? AND time_s >= ?
            ORDER BY time_s ASC, id ASC
            "#,
        )
        .bind(user.as_str())
        .bind(from_s)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(decode_transaction).collect())
    }

    /// Transactions in the window with no ledger row yet. This is the input
    /// set of a build pass; reprocessing an already-reconciled transaction
    /// is prevented here, not downstream.
    pub async fn query_unreconciled(
        &self,
        user: &UserId,
        from_s: i64,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.time_s, t.context, t.cash
            FROM transactions t
            LEFT JOIN lookup_entries l ON l.user = t.user AND l.transaction_id = t.id
            WHERE t.user = ? AND t.time_s >= ? AND l.id IS NULL
            ORDER BY t.time_s ASC, t.id ASC
            "#,
        )
        .bind(user.as_str())
        .bind(from_s)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(decode_transaction).collect())
    }

    /// Find a transaction of the given context at an exact ledger time.
    /// Used by the calculated-net fallback (gross minus same-time harbor fee).
    pub async fn find_transaction_at(
        &self,
        user: &UserId,
        time: TimeSec,
        context: &TxContext,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, time_s, context, cash
            FROM transactions
            WHERE user = ? AND time_s = ? AND context = ?
            LIMIT 1
            "#,
        )
        .bind(user.as_str())
        .bind(time.as_i64())
        .bind(context.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(decode_transaction))
    }

    pub async fn get_transaction(
        &self,
        user: &UserId,
        id: &str,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        let row = sqlx::query("SELECT id, time_s, context, cash FROM transactions WHERE user = ? AND id = ?")
            .bind(user.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(decode_transaction))
    }
}
