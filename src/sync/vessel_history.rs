//! Resumable per-vessel trip-history sync.
//!
//! The history endpoint is the expensive one: one call per vessel, and the
//! game rate-limits aggressively. A run walks the fleet roster in order,
//! pauses after `batch_size` vessels (or on an explicit stop), and persists
//! its position so the next run continues where it left off. The resume
//! point is only honored while the ordered fleet id list is unchanged; a
//! bought or sold vessel restarts the walk from the top.

use crate::datasource::{GameApi, GameApiError};
use crate::db::Repository;
use crate::domain::{parse_history_timestamp, DepartureRecord, TimeMs, UserId, VesselId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const RESUME_KEY: &str = "vessel_sync_state";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] GameApiError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Running,
    Paused,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Re-fetch everything, ignoring per-vessel newest-entry watermarks.
    pub force_resync: bool,
    /// Vessels to process before pausing.
    pub batch_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force_resync: false,
            batch_size: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    pub status: SyncStatus,
    /// Index of the vessel currently being processed, fleet-roster order.
    pub current_index: usize,
    pub total_vessels: usize,
    pub trips_added: i64,
    pub current_vessel: Option<String>,
}

impl SyncProgress {
    fn idle() -> Self {
        Self {
            status: SyncStatus::Idle,
            current_index: 0,
            total_vessels: 0,
            trips_added: 0,
            current_vessel: None,
        }
    }
}

/// How a sync invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Walked to the end of the fleet.
    Complete(SyncProgress),
    /// Hit the batch limit or a stop request; resume point persisted.
    Paused(SyncProgress),
    /// Another invocation for this user is in flight.
    AlreadyRunning(SyncProgress),
}

/// Persisted resume point. The id list pins the roster the index refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ResumeState {
    status: SyncStatus,
    /// Last fully processed roster index; -1 when nothing was processed.
    last_vessel_index: i64,
    vessel_ids: Vec<i64>,
}

struct SyncSession {
    stop: AtomicBool,
    progress: Mutex<SyncProgress>,
}

pub struct SyncManager {
    api: Arc<dyn GameApi>,
    repo: Arc<Repository>,
    vessel_delay: Duration,
    sessions: Mutex<HashMap<String, Arc<SyncSession>>>,
}

impl SyncManager {
    pub fn new(api: Arc<dyn GameApi>, repo: Arc<Repository>, vessel_delay: Duration) -> Self {
        Self {
            api,
            repo,
            vessel_delay,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Run one sync batch for a user. Returns `AlreadyRunning` with the live
    /// progress if an invocation is in flight.
    pub async fn sync_vessel_history(
        &self,
        user: &UserId,
        options: SyncOptions,
    ) -> Result<SyncOutcome, SyncError> {
        let session = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = sessions.get(user.as_str()) {
                let progress = existing
                    .progress
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone();
                return Ok(SyncOutcome::AlreadyRunning(progress));
            }
            let session = Arc::new(SyncSession {
                stop: AtomicBool::new(false),
                progress: Mutex::new(SyncProgress::idle()),
            });
            sessions.insert(user.as_str().to_string(), session.clone());
            session
        };

        let result = self.run_batch(user, options, &session).await;

        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(user.as_str());

        result
    }

    async fn run_batch(
        &self,
        user: &UserId,
        options: SyncOptions,
        session: &SyncSession,
    ) -> Result<SyncOutcome, SyncError> {
        let fleet = self.api.fetch_fleet().await?;
        let fleet_ids: Vec<i64> = fleet.iter().map(|v| v.id.as_i64()).collect();

        for vessel in &fleet {
            self.repo
                .upsert_vessel(user, vessel.id, &vessel.name, &vessel.vessel_type)
                .await?;
            for route in &vessel.routes {
                self.repo
                    .upsert_route_risk(user, &route.origin, &route.destination, route.hijack_risk)
                    .await?;
            }
        }

        let start = if options.force_resync {
            0
        } else {
            self.resume_index(user, &fleet_ids).await?
        };

        let mut trips_added: i64 = 0;
        let mut processed = 0usize;

        for (i, vessel) in fleet.iter().enumerate().skip(start) {
            if session.stop.load(Ordering::SeqCst) {
                info!("Sync for user {} stopped at vessel index {}", user, i);
                let progress =
                    self.pause(user, session, &fleet_ids, i, fleet.len(), trips_added).await?;
                return Ok(SyncOutcome::Paused(progress));
            }
            if processed == options.batch_size {
                let progress =
                    self.pause(user, session, &fleet_ids, i, fleet.len(), trips_added).await?;
                return Ok(SyncOutcome::Paused(progress));
            }

            self.update_progress(session, |p| {
                p.status = SyncStatus::Running;
                p.current_index = i;
                p.total_vessels = fleet.len();
                p.trips_added = trips_added;
                p.current_vessel = Some(vessel.name.clone());
            });

            match self.sync_one_vessel(user, vessel.id, &vessel.name, options.force_resync).await {
                Ok(added) => trips_added += added,
                Err(SyncError::Api(e)) => {
                    warn!(
                        "History fetch for vessel {} ({}) failed, skipping: {}",
                        vessel.id, vessel.name, e
                    );
                }
                Err(e) => return Err(e),
            }
            processed += 1;

            if i + 1 < fleet.len() {
                tokio::time::sleep(self.vessel_delay).await;
            }
        }

        let repaired = self.repo.repair_tanker_cargo(user).await?;
        if repaired > 0 {
            info!(
                "Rewrote cargo shape on {} tanker trips for user {}",
                repaired, user
            );
        }

        let state = ResumeState {
            status: SyncStatus::Complete,
            last_vessel_index: fleet.len() as i64 - 1,
            vessel_ids: fleet_ids,
        };
        self.persist_state(user, &state).await?;

        let progress = SyncProgress {
            status: SyncStatus::Complete,
            current_index: fleet.len(),
            total_vessels: fleet.len(),
            trips_added,
            current_vessel: None,
        };
        self.update_progress(session, |p| *p = progress.clone());
        info!(
            "Vessel sync for user {} complete: {} trips added across {} vessels",
            user,
            trips_added,
            fleet.len()
        );
        Ok(SyncOutcome::Complete(progress))
    }

    /// Fetch and store one vessel's history, keeping only entries newer than
    /// the stored watermark. Returns the number of trips inserted.
    async fn sync_one_vessel(
        &self,
        user: &UserId,
        vessel_id: VesselId,
        vessel_name: &str,
        force_resync: bool,
    ) -> Result<i64, SyncError> {
        let trips = self.api.fetch_vessel_history(vessel_id).await?;

        let watermark = if force_resync {
            None
        } else {
            self.repo.vessel_newest_entry(user, vessel_id).await?
        };

        let mut added = 0i64;
        let mut newest: Option<i64> = None;

        for raw in &trips {
            let timestamp = match parse_history_timestamp(&raw.created_at) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(
                        "Bad trip timestamp {:?} for vessel {}, skipping: {}",
                        raw.created_at, vessel_id, e
                    );
                    continue;
                }
            };
            if let Some(mark) = watermark {
                if timestamp.as_i64() <= mark {
                    continue;
                }
            }

            let record = DepartureRecord {
                id: DepartureRecord::compute_id(vessel_id, timestamp),
                vessel_id,
                vessel_name: vessel_name.to_string(),
                timestamp,
                origin: raw.origin.clone(),
                destination: raw.destination.clone(),
                route_name: raw.route_name.clone(),
                distance: raw.distance,
                fuel_used: raw.fuel_used,
                income: raw.income,
                wear: raw.wear,
                duration: raw.duration,
                cargo: raw.cargo.clone(),
            };
            if self.repo.insert_departure(user, &record).await? {
                added += 1;
            }
            newest = Some(newest.map_or(timestamp.as_i64(), |n| n.max(timestamp.as_i64())));
        }

        self.repo
            .update_vessel_sync(user, vessel_id, newest, added, TimeMs::now().as_i64())
            .await?;

        debug!("Vessel {} sync: {} new trips", vessel_id, added);
        Ok(added)
    }

    /// Resolve the roster index to start from. The persisted index is only
    /// trusted when the roster it was recorded against is identical.
    async fn resume_index(&self, user: &UserId, fleet_ids: &[i64]) -> Result<usize, SyncError> {
        let Some(raw) = self.repo.get_meta(user, RESUME_KEY).await? else {
            return Ok(0);
        };
        let state: ResumeState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!("Discarding unreadable sync resume state for user {}: {}", user, e);
                return Ok(0);
            }
        };

        if state.status != SyncStatus::Paused {
            return Ok(0);
        }
        if state.vessel_ids != fleet_ids {
            info!("Fleet changed for user {}, restarting vessel sync from 0", user);
            return Ok(0);
        }
        Ok((state.last_vessel_index + 1).max(0) as usize)
    }

    async fn pause(
        &self,
        user: &UserId,
        session: &SyncSession,
        fleet_ids: &[i64],
        next_index: usize,
        total: usize,
        trips_added: i64,
    ) -> Result<SyncProgress, SyncError> {
        let state = ResumeState {
            status: SyncStatus::Paused,
            last_vessel_index: next_index as i64 - 1,
            vessel_ids: fleet_ids.to_vec(),
        };
        self.persist_state(user, &state).await?;

        let progress = SyncProgress {
            status: SyncStatus::Paused,
            current_index: next_index,
            total_vessels: total,
            trips_added,
            current_vessel: None,
        };
        self.update_progress(session, |p| *p = progress.clone());
        Ok(progress)
    }

    async fn persist_state(&self, user: &UserId, state: &ResumeState) -> Result<(), SyncError> {
        let raw = serde_json::to_string(state)
            .map_err(|e| SyncError::Db(sqlx::Error::Decode(Box::new(e))))?;
        self.repo.set_meta(user, RESUME_KEY, &raw).await?;
        Ok(())
    }

    fn update_progress(&self, session: &SyncSession, f: impl FnOnce(&mut SyncProgress)) {
        let mut progress = session.progress.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut progress);
    }

    /// Live progress of an in-flight run, or the persisted resume state.
    pub async fn get_progress(&self, user: &UserId) -> Result<SyncProgress, SyncError> {
        {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(session) = sessions.get(user.as_str()) {
                return Ok(session
                    .progress
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone());
            }
        }

        let Some(raw) = self.repo.get_meta(user, RESUME_KEY).await? else {
            return Ok(SyncProgress::idle());
        };
        let state: ResumeState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(_) => return Ok(SyncProgress::idle()),
        };
        Ok(SyncProgress {
            status: state.status,
            current_index: (state.last_vessel_index + 1).max(0) as usize,
            total_vessels: state.vessel_ids.len(),
            trips_added: 0,
            current_vessel: None,
        })
    }

    /// Request a cooperative stop of an in-flight run. The run persists its
    /// resume point between vessels and exits. Returns false when idle.
    pub fn stop_sync(&self, user: &UserId) -> bool {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.get(user.as_str()) {
            Some(session) => {
                session.stop.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Background rotation: sync one vessel, wait `window / fleet_size`,
    /// repeat. Covers the whole fleet once per window without bursts.
    pub async fn run_rotation(self: Arc<Self>, user: UserId, window: Duration) {
        info!("Starting vessel sync rotation for user {} over {:?}", user, window);
        loop {
            let options = SyncOptions {
                force_resync: false,
                batch_size: 1,
            };
            let interval = match self.sync_vessel_history(&user, options).await {
                Ok(SyncOutcome::Complete(p)) | Ok(SyncOutcome::Paused(p)) => {
                    window / p.total_vessels.max(1) as u32
                }
                Ok(SyncOutcome::AlreadyRunning(_)) => window,
                Err(e) => {
                    warn!("Rotation sync for user {} failed: {}", user, e);
                    window
                }
            };
            tokio::time::sleep(interval).await;
        }
    }
}
