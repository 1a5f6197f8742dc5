//! Action-log writer endpoints. The in-process autopilot records what it did
//! here; the reconciliation engine only ever reads these rows.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::domain::{ActionDetails, ActionKind, ActionLogEntry, ActionStatus, TimeMs, UserId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RecordActionBody {
    /// Milliseconds since epoch; defaults to now.
    pub timestamp: Option<i64>,
    pub kind: String,
    pub status: String,
    pub summary: String,
    pub details: ActionDetails,
}

pub async fn record_action(
    Path(user): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<RecordActionBody>,
) -> Result<Json<ActionLogEntry>, AppError> {
    let user = UserId::new(user);
    if body.summary.trim().is_empty() {
        return Err(AppError::BadRequest("summary must not be empty".to_string()));
    }

    let entry = ActionLogEntry::new(
        body.timestamp.map(TimeMs::new).unwrap_or_else(TimeMs::now),
        ActionKind::parse(&body.kind),
        ActionStatus::parse(&body.status),
        body.summary,
        body.details,
    );
    state.repo.insert_action(&user, &entry).await?;
    Ok(Json(entry))
}

pub async fn delete_actions(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = UserId::new(user);
    let removed = state.repo.delete_actions(&user).await?;
    Ok(Json(serde_json::json!({"removed": removed})))
}
