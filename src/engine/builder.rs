//! The reconciliation build pass: turns not-yet-reconciled transactions into
//! ledger rows, linking the action log and trip history where matches exist.

use crate::db::Repository;
use crate::domain::{TimeSec, Transaction, TripSnapshot, TxContext, UserId};
use crate::engine::matcher::{match_trip, ActionIndex, MatchTolerances};
use serde::Serialize;
use tracing::{debug, info};

/// Bumped whenever the matching rules change in a way that invalidates
/// previously built rows. Compared against the per-user stored version.
pub const LOOKUP_VERSION: i64 = 2;

pub const VERSION_KEY: &str = "lookup_version";
pub const LAST_TX_SYNC_KEY: &str = "last_transaction_sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub new_entries: i64,
    pub total_entries: i64,
    pub matched_actions: i64,
    pub matched_departures: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RematchStats {
    pub matched: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    pub version: i64,
    pub current_version: i64,
    pub needs_rebuild: bool,
    pub entries: i64,
    pub last_sync: Option<i64>,
}

pub struct LookupBuilder {
    tolerances: MatchTolerances,
}

impl LookupBuilder {
    pub fn new(tolerances: MatchTolerances) -> Self {
        Self { tolerances }
    }

    fn widest_window_ms(&self) -> i64 {
        self.tolerances
            .departure_window_ms
            .max(self.tolerances.fee_window_ms)
            .max(self.tolerances.amount_window_ms)
            .max(self.tolerances.trip_window_ms)
    }

    /// Reconcile transactions from the last `days` days that have no ledger
    /// row yet. Inserts a complete row per transaction regardless of match
    /// outcomes; already-reconciled transactions are untouched, so re-running
    /// is idempotent.
    pub async fn build_lookup(
        &self,
        repo: &Repository,
        user: &UserId,
        days: i64,
    ) -> Result<BuildStats, sqlx::Error> {
        let from_s = TimeSec::now().as_i64() - days * 86_400;
        let pending = repo.query_unreconciled(user, from_s).await?;

        let mut stats = BuildStats {
            new_entries: 0,
            total_entries: 0,
            matched_actions: 0,
            matched_departures: 0,
        };

        if !pending.is_empty() {
            let slack = self.widest_window_ms();
            let lo_ms = pending.iter().map(|t| t.time_ms().as_i64()).min().unwrap_or(0) - slack;
            let hi_ms = pending.iter().map(|t| t.time_ms().as_i64()).max().unwrap_or(0) + slack;

            let actions = repo.query_actions(user, lo_ms, hi_ms).await?;
            let trips = repo.query_departures(user, lo_ms, hi_ms).await?;
            let index = ActionIndex::new(&actions);

            debug!(
                "Reconciling {} transactions against {} logs and {} trips for user {}",
                pending.len(),
                actions.len(),
                trips.len(),
                user
            );

            for tx in &pending {
                let classification = tx.context.classify(tx.cash);
                let action_match =
                    index.match_transaction(tx, classification.strategy, &self.tolerances);

                let mut entry = crate::domain::LookupEntry::for_transaction(
                    tx.time,
                    tx.id.clone(),
                    tx.cash,
                    classification.entry_type,
                    classification.value,
                    tx.context.clone(),
                );

                if let Some(ref m) = action_match {
                    entry.action_id = Some(m.entry.id);
                    entry.action_vessel = m.vessel.cloned();
                }

                if tx.context.departure_related() {
                    let expected_net = if action_match.is_none() {
                        self.expected_net(repo, user, tx).await?
                    } else {
                        None
                    };
                    if let Some(trip) = match_trip(
                        tx,
                        entry.action_vessel.as_ref(),
                        expected_net,
                        &trips,
                        &self.tolerances,
                    ) {
                        entry.departure_id = Some(trip.id.clone());
                        entry.departure_vessel = Some(TripSnapshot::from(trip));
                    }
                }

                if repo.insert_lookup(user, &entry).await? {
                    stats.new_entries += 1;
                    if entry.action_id.is_some() {
                        stats.matched_actions += 1;
                    }
                    if entry.departure_id.is_some() {
                        stats.matched_departures += 1;
                    }
                }
            }
        }

        repo.set_meta(user, VERSION_KEY, &LOOKUP_VERSION.to_string())
            .await?;
        stats.total_entries = repo.count_lookup(user).await?;

        info!(
            "Build for user {}: {} new, {} action matches, {} trip matches, {} total",
            user, stats.new_entries, stats.matched_actions, stats.matched_departures,
            stats.total_entries
        );
        Ok(stats)
    }

    /// Retry trip matching for departure-related ledger rows that have no
    /// trip link, typically after a later vessel-history sync backfilled the
    /// trips. Only the departure columns of matched rows change.
    pub async fn rematch_departures(
        &self,
        repo: &Repository,
        user: &UserId,
    ) -> Result<RematchStats, sqlx::Error> {
        let unlinked = repo.query_missing_departure(user).await?;
        let mut stats = RematchStats {
            matched: 0,
            total: unlinked.len() as i64,
        };

        for entry in &unlinked {
            let tx = Transaction {
                id: entry.transaction_id.clone(),
                time: entry.time,
                context: entry.context.clone(),
                cash: entry.cash,
            };

            let tx_ms = tx.time_ms().as_i64();
            let trips = repo
                .query_departures(
                    user,
                    tx_ms - self.tolerances.trip_window_ms,
                    tx_ms + self.tolerances.trip_window_ms,
                )
                .await?;

            let expected_net = if entry.action_vessel.is_none() {
                self.expected_net(repo, user, &tx).await?
            } else {
                None
            };

            if let Some(trip) = match_trip(
                &tx,
                entry.action_vessel.as_ref(),
                expected_net,
                &trips,
                &self.tolerances,
            ) {
                repo.attach_departure(user, entry.id, &trip.id, &TripSnapshot::from(trip))
                    .await?;
                stats.matched += 1;
            }
        }

        info!(
            "Rematch for user {}: {} of {} unlinked rows matched",
            user, stats.matched, stats.total
        );
        Ok(stats)
    }

    /// Stored-version report. A stale store is reported, never rebuilt here;
    /// the caller decides when to clear and rebuild.
    pub async fn store_info(
        &self,
        repo: &Repository,
        user: &UserId,
    ) -> Result<StoreInfo, sqlx::Error> {
        let entries = repo.count_lookup(user).await?;
        let version = repo
            .get_meta(user, VERSION_KEY)
            .await?
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let last_sync = repo
            .get_meta(user, LAST_TX_SYNC_KEY)
            .await?
            .and_then(|v| v.parse::<i64>().ok());

        Ok(StoreInfo {
            version,
            current_version: LOOKUP_VERSION,
            needs_rebuild: entries > 0 && version < LOOKUP_VERSION,
            entries,
            last_sync,
        })
    }

    /// Drop the user's ledger rows and version marker. Sources stay; the
    /// next build reproduces the ledger from them.
    pub async fn clear_store(&self, repo: &Repository, user: &UserId) -> Result<u64, sqlx::Error> {
        let removed = repo.clear_lookup(user).await?;
        repo.delete_meta(user, VERSION_KEY).await?;
        info!("Cleared {} ledger rows for user {}", removed, user);
        Ok(removed)
    }

    /// Expected trip net for the calculation fallback: the departure's gross
    /// cash minus the harbor-fee transaction booked at the same ledger time.
    async fn expected_net(
        &self,
        repo: &Repository,
        user: &UserId,
        tx: &Transaction,
    ) -> Result<Option<i64>, sqlx::Error> {
        if tx.context != TxContext::VesselsDeparted {
            return Ok(None);
        }
        let fee = repo
            .find_transaction_at(user, tx.time, &TxContext::HarborFeeOnDepart)
            .await?;
        Ok(fee.map(|fee| tx.cash.abs() - fee.cash.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::{
        ActionDetails, ActionKind, ActionLogEntry, ActionStatus, AmountField, CargoBreakdown,
        DepartureRecord, EntryValue, TimeMs, VesselId,
    };
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

    fn builder() -> LookupBuilder {
        LookupBuilder::new(MatchTolerances::default())
    }

    fn fuel_log(at_ms: i64, cost: i64) -> ActionLogEntry {
        ActionLogEntry::new(
            TimeMs::new(at_ms),
            ActionKind::AutoFuel,
            ActionStatus::Success,
            "Refueled fleet",
            ActionDetails::Purchase {
                cost: AmountField::Flat(cost),
            },
        )
    }

    fn trip(vessel_id: i64, at_ms: i64, income: i64) -> DepartureRecord {
        DepartureRecord {
            id: DepartureRecord::compute_id(VesselId::new(vessel_id), TimeMs::new(at_ms)),
            vessel_id: VesselId::new(vessel_id),
            vessel_name: format!("MV {}", vessel_id),
            timestamp: TimeMs::new(at_ms),
            origin: "Hamburg".into(),
            destination: "Rotterdam".into(),
            route_name: "North Sea".into(),
            distance: 288.0,
            fuel_used: 12.0,
            income,
            wear: 0.2,
            duration: 43_200,
            cargo: CargoBreakdown::Units(500),
        }
    }

    #[tokio::test]
    async fn test_fuel_transaction_end_to_end() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");
        let now_s = TimeSec::now().as_i64();

        let tx = Transaction::new(TimeSec::new(now_s), TxContext::FuelPurchased, -500);
        repo.insert_transaction(&user, &tx).await.unwrap();
        repo.insert_action(&user, &fuel_log(now_s * 1000, 500))
            .await
            .unwrap();

        let stats = builder().build_lookup(&repo, &user, 7).await.unwrap();
        assert_eq!(stats.new_entries, 1);
        assert_eq!(stats.matched_actions, 1);
        assert_eq!(stats.matched_departures, 0);

        let entries = repo.query_lookup(&user, 0).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, "Fuel");
        assert_eq!(entries[0].value, EntryValue::Expense);
        assert!(entries[0].action_id.is_some());
        assert!(entries[0].departure_id.is_none());
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");
        let now_s = TimeSec::now().as_i64();

        let tx = Transaction::new(TimeSec::new(now_s), TxContext::FuelPurchased, -500);
        repo.insert_transaction(&user, &tx).await.unwrap();

        let b = builder();
        let first = b.build_lookup(&repo, &user, 7).await.unwrap();
        assert_eq!(first.new_entries, 1);

        let second = b.build_lookup(&repo, &user, 7).await.unwrap();
        assert_eq!(second.new_entries, 0);
        assert_eq!(second.total_entries, 1);
    }

    #[tokio::test]
    async fn test_unmatched_transaction_still_gets_a_row() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");
        let now_s = TimeSec::now().as_i64();

        let tx = Transaction::new(TimeSec::new(now_s), TxContext::parse("lighthouse_toll"), -75);
        repo.insert_transaction(&user, &tx).await.unwrap();

        let stats = builder().build_lookup(&repo, &user, 7).await.unwrap();
        assert_eq!(stats.new_entries, 1);
        assert_eq!(stats.matched_actions, 0);

        let entries = repo.query_lookup(&user, 0).await.unwrap();
        assert_eq!(entries[0].entry_type, "lighthouse_toll");
        assert_eq!(entries[0].value, EntryValue::Expense);
    }

    #[tokio::test]
    async fn test_departure_gets_trip_link() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");
        let now_s = TimeSec::now().as_i64();
        let now_ms = now_s * 1000;

        let tx = Transaction::new(TimeSec::new(now_s), TxContext::VesselsDeparted, 110);
        repo.insert_transaction(&user, &tx).await.unwrap();
        repo.insert_action(
            &user,
            &ActionLogEntry::new(
                TimeMs::new(now_ms),
                ActionKind::AutoDepart,
                ActionStatus::Success,
                "Departed 1 vessel",
                ActionDetails::Departure {
                    vessels: vec![crate::domain::DepartedVessel {
                        vessel_id: Some(VesselId::new(7)),
                        vessel_name: "MV 7".into(),
                        origin: "Hamburg".into(),
                        destination: "Rotterdam".into(),
                        distance: 288.0,
                        fuel_used: 12.0,
                        income: 100,
                        harbor_fee: 10,
                        guards: 0,
                        contribution: 0,
                    }],
                },
            ),
        )
        .await
        .unwrap();
        repo.insert_departure(&user, &trip(7, now_ms - 30_000, 100))
            .await
            .unwrap();

        let stats = builder().build_lookup(&repo, &user, 7).await.unwrap();
        assert_eq!(stats.matched_actions, 1);
        assert_eq!(stats.matched_departures, 1);

        let entries = repo.query_lookup(&user, 0).await.unwrap();
        let snap = entries[0].departure_vessel.as_ref().unwrap();
        assert_eq!(snap.vessel_id, VesselId::new(7));
    }

    #[tokio::test]
    async fn test_rematch_links_backfilled_trips() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");
        let now_s = TimeSec::now().as_i64();
        let now_ms = now_s * 1000;

        // Departure with harbor fee at the same ledger time, no action log
        // and no trips yet: the build leaves the trip link empty.
        let dep = Transaction::new(TimeSec::new(now_s), TxContext::VesselsDeparted, 500);
        let fee = Transaction::new(TimeSec::new(now_s), TxContext::HarborFeeOnDepart, -50);
        repo.insert_transaction(&user, &dep).await.unwrap();
        repo.insert_transaction(&user, &fee).await.unwrap();

        let b = builder();
        let stats = b.build_lookup(&repo, &user, 7).await.unwrap();
        assert_eq!(stats.new_entries, 2);
        assert_eq!(stats.matched_departures, 0);

        // Trip history arrives later with net income 500 - 50 = 450.
        repo.insert_departure(&user, &trip(3, now_ms - 60_000, 450))
            .await
            .unwrap();

        let rematch = b.rematch_departures(&repo, &user).await.unwrap();
        assert_eq!(rematch.matched, 1);
        assert_eq!(rematch.total, 2);

        // A second pass has nothing left for the departure row.
        let again = b.rematch_departures(&repo, &user).await.unwrap();
        assert_eq!(again.matched, 0);
        assert_eq!(again.total, 1);
    }

    #[tokio::test]
    async fn test_version_gating_reports_without_rebuilding() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");
        let now_s = TimeSec::now().as_i64();

        let tx = Transaction::new(TimeSec::new(now_s), TxContext::FuelPurchased, -500);
        repo.insert_transaction(&user, &tx).await.unwrap();

        let b = builder();
        b.build_lookup(&repo, &user, 7).await.unwrap();

        let info = b.store_info(&repo, &user).await.unwrap();
        assert_eq!(info.version, LOOKUP_VERSION);
        assert!(!info.needs_rebuild);

        // Simulate rows built by an older engine.
        repo.set_meta(&user, VERSION_KEY, &(LOOKUP_VERSION - 1).to_string())
            .await
            .unwrap();
        let info = b.store_info(&repo, &user).await.unwrap();
        assert!(info.needs_rebuild);
        assert_eq!(info.entries, 1);

        // Reporting stale must not touch the rows.
        assert_eq!(repo.count_lookup(&user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_store_resets_version_state() {
        let (repo, _temp) = setup().await;
        let user = UserId::new("1");
        let now_s = TimeSec::now().as_i64();

        let tx = Transaction::new(TimeSec::new(now_s), TxContext::FuelPurchased, -500);
        repo.insert_transaction(&user, &tx).await.unwrap();

        let b = builder();
        b.build_lookup(&repo, &user, 7).await.unwrap();
        assert_eq!(b.clear_store(&repo, &user).await.unwrap(), 1);

        let info = b.store_info(&repo, &user).await.unwrap();
        assert_eq!(info.entries, 0);
        assert!(!info.needs_rebuild);

        // The cleared transaction is pending again and rebuilds identically.
        let stats = b.build_lookup(&repo, &user, 7).await.unwrap();
        assert_eq!(stats.new_entries, 1);
    }
}
