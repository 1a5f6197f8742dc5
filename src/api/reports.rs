//! Report endpoints: straight aggregation over the raw sources, no
//! reconciliation involved.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::AppState;
use crate::db::repo::{RoutePerformance, VesselPerformance};
use crate::domain::{EntryValue, TimeSec, UserId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub days: Option<i64>,
}

impl ReportQuery {
    fn days(&self) -> Result<i64, AppError> {
        match self.days {
            None => Ok(7),
            Some(days) if days > 0 => Ok(days),
            Some(_) => Err(AppError::BadRequest("days must be positive".to_string())),
        }
    }
}

/// Per-context totals over the raw transaction ledger.
#[derive(Debug, Serialize, PartialEq)]
pub struct ContextSummary {
    pub context: String,
    pub value: EntryValue,
    pub total: i64,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct WeeklySummary {
    pub income: i64,
    pub expense: i64,
    pub net: i64,
    pub transactions: i64,
    pub contexts: Vec<ContextSummary>,
}

/// The game only keeps a week of ledger, so this mirrors what the player
/// sees on the in-game finance page.
pub async fn weekly_summary(
    Path(user): Path<String>,
    Query(params): Query<ReportQuery>,
    State(state): State<AppState>,
) -> Result<Json<WeeklySummary>, AppError> {
    let user = UserId::new(user);
    let from_s = TimeSec::now().as_i64() - params.days()? * 86_400;
    let transactions = state.repo.query_transactions(&user, from_s).await?;

    let mut income = 0i64;
    let mut expense = 0i64;
    let mut by_context: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for tx in &transactions {
        if tx.cash >= 0 {
            income += tx.cash;
        } else {
            expense += tx.cash;
        }
        let slot = by_context.entry(tx.context.as_str().to_string()).or_default();
        slot.0 += tx.cash;
        slot.1 += 1;
    }

    let contexts = by_context
        .into_iter()
        .map(|(context, (total, count))| ContextSummary {
            value: if total >= 0 {
                EntryValue::Income
            } else {
                EntryValue::Expense
            },
            context,
            total,
            count,
        })
        .collect();

    Ok(Json(WeeklySummary {
        income,
        expense,
        net: income + expense,
        transactions: transactions.len() as i64,
        contexts,
    }))
}

pub async fn vessel_performance(
    Path(user): Path<String>,
    Query(params): Query<ReportQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<VesselPerformance>>, AppError> {
    let user = UserId::new(user);
    let from_ms = (TimeSec::now().as_i64() - params.days()? * 86_400) * 1000;
    let rows = state.repo.vessel_performance(&user, from_ms).await?;
    Ok(Json(rows))
}

pub async fn route_performance(
    Path(user): Path<String>,
    Query(params): Query<ReportQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RoutePerformance>>, AppError> {
    let user = UserId::new(user);
    let from_ms = (TimeSec::now().as_i64() - params.days()? * 86_400) * 1000;
    let rows = state.repo.route_performance(&user, from_ms).await?;
    Ok(Json(rows))
}
