pub mod actions;
pub mod health;
pub mod lookup;
pub mod reports;
pub mod sync;

use crate::db::Repository;
use crate::engine::LookupBuilder;
use crate::sync::{SyncManager, TransactionSyncer};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub builder: Arc<LookupBuilder>,
    pub tx_syncer: Arc<TransactionSyncer>,
    pub sync_manager: Arc<SyncManager>,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        builder: Arc<LookupBuilder>,
        tx_syncer: Arc<TransactionSyncer>,
        sync_manager: Arc<SyncManager>,
    ) -> Self {
        Self {
            repo,
            builder,
            tx_syncer,
            sync_manager,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/:user/sync/transactions", post(sync::sync_transactions))
        .route("/v1/:user/sync/vessels", post(sync::sync_vessels))
        .route("/v1/:user/sync/vessels/progress", get(sync::sync_progress))
        .route("/v1/:user/sync/vessels/stop", post(sync::stop_sync))
        .route("/v1/:user/lookup/build", post(lookup::build))
        .route("/v1/:user/lookup/rematch", post(lookup::rematch))
        .route("/v1/:user/lookup/entries", get(lookup::get_entries))
        .route("/v1/:user/lookup/entries/:id", get(lookup::get_entry_details))
        .route("/v1/:user/lookup/totals", get(lookup::get_totals))
        .route("/v1/:user/lookup/breakdown/type", get(lookup::breakdown_by_type))
        .route("/v1/:user/lookup/breakdown/day", get(lookup::breakdown_by_day))
        .route("/v1/:user/lookup/info", get(lookup::store_info))
        .route("/v1/:user/lookup", delete(lookup::clear_store))
        .route(
            "/v1/:user/actions",
            post(actions::record_action).delete(actions::delete_actions),
        )
        .route("/v1/:user/reports/weekly", get(reports::weekly_summary))
        .route("/v1/:user/reports/vessels", get(reports::vessel_performance))
        .route("/v1/:user/reports/routes", get(reports::route_performance))
        .layer(cors)
        .with_state(state)
}
