use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::domain::UserId;
use crate::error::AppError;
use crate::sync::{SyncOptions, SyncOutcome, SyncProgress, TxSyncResult};

pub async fn sync_transactions(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TxSyncResult>, AppError> {
    let user = UserId::new(user);
    let result = state.tx_syncer.sync(&user).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct VesselSyncQuery {
    pub force_resync: Option<bool>,
    pub batch_size: Option<usize>,
}

pub async fn sync_vessels(
    Path(user): Path<String>,
    Query(params): Query<VesselSyncQuery>,
    State(state): State<AppState>,
) -> Result<Json<SyncOutcome>, AppError> {
    let user = UserId::new(user);
    let defaults = SyncOptions::default();
    let options = SyncOptions {
        force_resync: params.force_resync.unwrap_or(defaults.force_resync),
        batch_size: params.batch_size.unwrap_or(defaults.batch_size),
    };
    if options.batch_size == 0 {
        return Err(AppError::BadRequest("batch_size must be positive".to_string()));
    }

    let outcome = state.sync_manager.sync_vessel_history(&user, options).await?;
    Ok(Json(outcome))
}

pub async fn sync_progress(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SyncProgress>, AppError> {
    let user = UserId::new(user);
    let progress = state.sync_manager.get_progress(&user).await?;
    Ok(Json(progress))
}

pub async fn stop_sync(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    let user = UserId::new(user);
    let stopped = state.sync_manager.stop_sync(&user);
    Json(serde_json::json!({"stopped": stopped}))
}
