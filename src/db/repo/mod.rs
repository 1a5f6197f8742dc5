//! Repository layer for database operations.
//!
//! One `Repository` wraps the pool; methods are split across submodules by
//! source table:
//! - `transactions.rs` - the game's financial ledger (source 1)
//! - `actions.rs` - the local action log (source 2)
//! - `departures.rs` - per-vessel trip history and sync bookkeeping (source 3)
//! - `lookup.rs` - the reconciled ledger and its aggregations
//! - `meta.rs` - per-user metadata, resume state, route risk

mod actions;
mod departures;
mod lookup;
mod meta;
mod transactions;

pub use departures::{RoutePerformance, VesselPerformance};
pub use lookup::{DayBreakdown, LedgerTotals, TypeBreakdown};
pub use meta::RouteRisk;

use sqlx::sqlite::SqlitePool;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Connectivity check for the readiness probe.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
