use shipledger::datasource::ShippingApiClient;
use shipledger::engine::LookupBuilder;
use shipledger::sync::{SyncManager, TransactionSyncer};
use shipledger::{api, config::Config, db::init_db, GameApi, Repository, UserId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let game_api: Arc<dyn GameApi> = Arc::new(ShippingApiClient::new(
        config.shipping_api_url.clone(),
        config.session_cookie.clone(),
    ));
    let builder = Arc::new(LookupBuilder::new(config.tolerances()));
    let tx_syncer = Arc::new(TransactionSyncer::new(game_api.clone(), repo.clone()));
    let sync_manager = Arc::new(SyncManager::new(
        game_api,
        repo.clone(),
        Duration::from_millis(config.vessel_delay_ms),
    ));

    if config.rotation_enabled {
        if let Some(user) = config.rotation_user.clone() {
            let manager = sync_manager.clone();
            let window = Duration::from_secs(config.rotation_window_secs);
            tokio::spawn(manager.run_rotation(UserId::new(user), window));
        }
    }

    // Create router
    let app = api::create_router(api::AppState::new(repo, builder, tx_syncer, sync_manager));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
