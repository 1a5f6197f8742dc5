use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::db::repo::{DayBreakdown, LedgerTotals, TypeBreakdown};
use crate::domain::{
    ActionLogEntry, DepartureRecord, LookupEntry, TimeSec, Transaction, UserId,
};
use crate::engine::{BuildStats, RematchStats, StoreInfo};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

impl DaysQuery {
    /// Lower window bound in ledger seconds; no `days` means everything.
    fn from_s(&self) -> Result<i64, AppError> {
        match self.days {
            None => Ok(0),
            Some(days) if days > 0 => Ok(TimeSec::now().as_i64() - days * 86_400),
            Some(_) => Err(AppError::BadRequest("days must be positive".to_string())),
        }
    }
}

pub async fn build(
    Path(user): Path<String>,
    Query(params): Query<DaysQuery>,
    State(state): State<AppState>,
) -> Result<Json<BuildStats>, AppError> {
    let user = UserId::new(user);
    let days = params.days.unwrap_or(7);
    if days <= 0 {
        return Err(AppError::BadRequest("days must be positive".to_string()));
    }
    let stats = state.builder.build_lookup(&state.repo, &user, days).await?;
    Ok(Json(stats))
}

pub async fn rematch(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RematchStats>, AppError> {
    let user = UserId::new(user);
    let stats = state.builder.rematch_departures(&state.repo, &user).await?;
    Ok(Json(stats))
}

pub async fn get_entries(
    Path(user): Path<String>,
    Query(params): Query<DaysQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<LookupEntry>>, AppError> {
    let user = UserId::new(user);
    let entries = state.repo.query_lookup(&user, params.from_s()?).await?;
    Ok(Json(entries))
}

/// A ledger row joined with the source records it references.
#[derive(Debug, Serialize)]
pub struct EntryDetails {
    pub entry: LookupEntry,
    pub transaction: Option<Transaction>,
    pub action: Option<ActionLogEntry>,
    pub departure: Option<DepartureRecord>,
}

pub async fn get_entry_details(
    Path((user, id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<EntryDetails>, AppError> {
    let user = UserId::new(user);
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::BadRequest("Invalid entry id".to_string()))?;

    let entry = state
        .repo
        .get_lookup_entry(&user, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No ledger entry {}", id)))?;

    let transaction = state
        .repo
        .get_transaction(&user, &entry.transaction_id)
        .await?;
    let action = match entry.action_id {
        Some(action_id) => state.repo.get_action(&user, action_id).await?,
        None => None,
    };
    let departure = match entry.departure_id.as_deref() {
        Some(departure_id) => state.repo.get_departure(&user, departure_id).await?,
        None => None,
    };

    Ok(Json(EntryDetails {
        entry,
        transaction,
        action,
        departure,
    }))
}

pub async fn get_totals(
    Path(user): Path<String>,
    Query(params): Query<DaysQuery>,
    State(state): State<AppState>,
) -> Result<Json<LedgerTotals>, AppError> {
    let user = UserId::new(user);
    let totals = state.repo.ledger_totals(&user, params.from_s()?).await?;
    Ok(Json(totals))
}

pub async fn breakdown_by_type(
    Path(user): Path<String>,
    Query(params): Query<DaysQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TypeBreakdown>>, AppError> {
    let user = UserId::new(user);
    let breakdown = state.repo.breakdown_by_type(&user, params.from_s()?).await?;
    Ok(Json(breakdown))
}

pub async fn breakdown_by_day(
    Path(user): Path<String>,
    Query(params): Query<DaysQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<DayBreakdown>>, AppError> {
    let user = UserId::new(user);
    let breakdown = state.repo.breakdown_by_day(&user, params.from_s()?).await?;
    Ok(Json(breakdown))
}

pub async fn store_info(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StoreInfo>, AppError> {
    let user = UserId::new(user);
    let info = state.builder.store_info(&state.repo, &user).await?;
    Ok(Json(info))
}

pub async fn clear_store(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = UserId::new(user);
    let removed = state.builder.clear_store(&state.repo, &user).await?;
    Ok(Json(serde_json::json!({"removed": removed})))
}
