//! Vessel-history sync and rematch tests driven through the HTTP surface.

use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use shipledger::api::{self, AppState};
use shipledger::datasource::{FleetRoute, FleetVessel, MockGameApi, RawTransaction, RawTrip};
use shipledger::db::init_db;
use shipledger::domain::{CargoBreakdown, TimeSec, VesselId};
use shipledger::engine::LookupBuilder;
use shipledger::sync::{SyncManager, TransactionSyncer};
use shipledger::{Config, Repository};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    _temp: TempDir,
}

fn test_config() -> Config {
    Config {
        port: 0,
        database_path: ":memory:".to_string(),
        shipping_api_url: "http://example.invalid".to_string(),
        session_cookie: "session=test".to_string(),
        departure_window_secs: 120,
        fee_window_secs: 120,
        amount_window_secs: 600,
        amount_slack_pct: 10,
        trip_window_secs: 600,
        guard_rate: 1500,
        vessel_delay_ms: 0,
        rotation_window_secs: 3600,
        rotation_enabled: false,
        rotation_user: None,
    }
}

async fn setup_test_app(api: MockGameApi) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let repo = Arc::new(Repository::new(pool));
    let config = test_config();
    let api: Arc<dyn shipledger::GameApi> = Arc::new(api);

    let builder = Arc::new(LookupBuilder::new(config.tolerances()));
    let tx_syncer = Arc::new(TransactionSyncer::new(api.clone(), repo.clone()));
    let sync_manager = Arc::new(SyncManager::new(api, repo.clone(), Duration::from_millis(0)));

    let state = AppState::new(repo, builder, tx_syncer, sync_manager);
    let app = api::create_router(state);

    TestApp {
        app,
        _temp: temp_dir,
    }
}

async fn request(
    app: axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    request(app.clone(), "GET", uri).await
}

async fn post(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    request(app.clone(), "POST", uri).await
}

/// Format a seconds timestamp the way the game's history endpoint does.
fn history_timestamp(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn trip(secs: i64, income: i64) -> RawTrip {
    RawTrip {
        created_at: history_timestamp(secs),
        origin: "Rotterdam".to_string(),
        destination: "Hamburg".to_string(),
        route_name: "Rotterdam - Hamburg".to_string(),
        distance: 288.0,
        fuel_used: 14.5,
        income,
        wear: 0.4,
        duration: 7200,
        cargo: CargoBreakdown::Units(1450),
    }
}

fn vessel(id: i64, name: &str) -> FleetVessel {
    FleetVessel {
        id: VesselId::new(id),
        name: name.to_string(),
        vessel_type: "container".to_string(),
        routes: vec![FleetRoute {
            origin: "Rotterdam".to_string(),
            destination: "Hamburg".to_string(),
            hijack_risk: 2.5,
        }],
    }
}

#[tokio::test]
async fn test_full_fleet_sync_completes() {
    let base = TimeSec::now().as_i64() - 3600;
    let api = MockGameApi::new()
        .with_fleet_vessel(vessel(1, "MT Sirius"))
        .with_fleet_vessel(vessel(2, "MV Vega"))
        .with_history(VesselId::new(1), vec![trip(base, 450)])
        .with_history(VesselId::new(2), vec![trip(base - 600, 900), trip(base, 700)]);
    let test_app = setup_test_app(api).await;

    let (status, body) = post(&test_app.app, "/v1/alice/sync/vessels").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "complete");
    assert_eq!(body["trips_added"], 3);
    assert_eq!(body["total_vessels"], 2);

    let (status, progress) = get(&test_app.app, "/v1/alice/sync/vessels/progress").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["status"], "complete");
}

#[tokio::test]
async fn test_resync_skips_known_trips() {
    let base = TimeSec::now().as_i64() - 3600;
    let api = MockGameApi::new()
        .with_fleet_vessel(vessel(1, "MT Sirius"))
        .with_history(VesselId::new(1), vec![trip(base, 450)]);
    let test_app = setup_test_app(api).await;

    let (_, first) = post(&test_app.app, "/v1/alice/sync/vessels").await;
    assert_eq!(first["trips_added"], 1);

    let (_, second) = post(&test_app.app, "/v1/alice/sync/vessels").await;
    assert_eq!(second["outcome"], "complete");
    assert_eq!(second["trips_added"], 0);

    let (_, forced) = post(&test_app.app, "/v1/alice/sync/vessels?force_resync=true").await;
    assert_eq!(forced["outcome"], "complete");
    // Forced refetch revisits the trip but the store still dedupes it.
    assert_eq!(forced["trips_added"], 0);
}

#[tokio::test]
async fn test_batch_pause_then_resume() {
    let base = TimeSec::now().as_i64() - 3600;
    let api = MockGameApi::new()
        .with_fleet_vessel(vessel(1, "MT Sirius"))
        .with_fleet_vessel(vessel(2, "MV Vega"))
        .with_fleet_vessel(vessel(3, "MV Altair"))
        .with_history(VesselId::new(1), vec![trip(base, 450)])
        .with_history(VesselId::new(2), vec![trip(base - 600, 900)])
        .with_history(VesselId::new(3), vec![trip(base - 1200, 320)]);
    let test_app = setup_test_app(api).await;

    let (status, body) = post(&test_app.app, "/v1/alice/sync/vessels?batch_size=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "paused");
    assert_eq!(body["current_index"], 2);
    assert_eq!(body["trips_added"], 2);

    let (_, progress) = get(&test_app.app, "/v1/alice/sync/vessels/progress").await;
    assert_eq!(progress["status"], "paused");
    assert_eq!(progress["current_index"], 2);

    // The next batch picks up at the third vessel.
    let (_, body) = post(&test_app.app, "/v1/alice/sync/vessels?batch_size=2").await;
    assert_eq!(body["outcome"], "complete");
    assert_eq!(body["trips_added"], 1);
}

#[tokio::test]
async fn test_failing_vessel_is_skipped() {
    let base = TimeSec::now().as_i64() - 3600;
    let api = MockGameApi::new()
        .with_fleet_vessel(vessel(1, "MT Sirius"))
        .with_fleet_vessel(vessel(2, "MV Vega"))
        .with_failing_history(VesselId::new(1))
        .with_history(VesselId::new(2), vec![trip(base, 700)]);
    let test_app = setup_test_app(api).await;

    let (status, body) = post(&test_app.app, "/v1/alice/sync/vessels").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "complete");
    assert_eq!(body["trips_added"], 1);
}

#[tokio::test]
async fn test_stop_without_running_sync() {
    let test_app = setup_test_app(MockGameApi::new()).await;

    let (status, body) = post(&test_app.app, "/v1/alice/sync/vessels/stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stopped"], false);

    let (_, progress) = get(&test_app.app, "/v1/alice/sync/vessels/progress").await;
    assert_eq!(progress["status"], "idle");
}

#[tokio::test]
async fn test_rematch_links_backfilled_trips() {
    let base = TimeSec::now().as_i64() - 3600;
    let api = MockGameApi::new()
        .with_transactions(vec![
            RawTransaction {
                time: base,
                context: "vessels_departed".to_string(),
                cash: 500,
            },
            RawTransaction {
                time: base,
                context: "harbor_fee_on_depart".to_string(),
                cash: -50,
            },
        ])
        .with_fleet_vessel(vessel(7, "MV Vega"))
        .with_history(VesselId::new(7), vec![trip(base - 120, 450)]);
    let test_app = setup_test_app(api).await;

    // Build before the trip history exists: rows land without trip links.
    post(&test_app.app, "/v1/alice/sync/transactions").await;
    let (_, stats) = post(&test_app.app, "/v1/alice/lookup/build").await;
    assert_eq!(stats["new_entries"], 2);
    assert_eq!(stats["matched_departures"], 0);

    post(&test_app.app, "/v1/alice/sync/vessels").await;

    let (status, rematch) = post(&test_app.app, "/v1/alice/lookup/rematch").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rematch["total"], 2);
    assert_eq!(rematch["matched"], 1);

    let (_, entries) = get(&test_app.app, "/v1/alice/lookup/entries").await;
    let departed = entries
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["context"] == "vessels_departed")
        .unwrap();
    assert_eq!(departed["departure_id"], "dep:7:".to_string() + &((base - 120) * 1000).to_string());
    assert_eq!(departed["departure_vessel"]["income"], 450);
    assert_eq!(departed["departure_vessel"]["vessel_name"], "MV Vega");

    // The rematch converged; a second pass finds nothing new.
    let (_, again) = post(&test_app.app, "/v1/alice/lookup/rematch").await;
    assert_eq!(again["total"], 1);
    assert_eq!(again["matched"], 0);
}

#[tokio::test]
async fn test_route_report_carries_fleet_risk() {
    let base = TimeSec::now().as_i64() - 3600;
    let api = MockGameApi::new()
        .with_fleet_vessel(vessel(1, "MT Sirius"))
        .with_history(VesselId::new(1), vec![trip(base, 450)]);
    let test_app = setup_test_app(api).await;

    post(&test_app.app, "/v1/alice/sync/vessels").await;

    let (status, routes) = get(&test_app.app, "/v1/alice/reports/routes").await;
    assert_eq!(status, StatusCode::OK);
    let routes = routes.as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["origin"], "Rotterdam");
    assert_eq!(routes[0]["destination"], "Hamburg");
    assert_eq!(routes[0]["trips"], 1);
    assert_eq!(routes[0]["hijack_risk"], 2.5);
}
