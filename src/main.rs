use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dotenv::dotenv;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use rate_gate::config::CacheConfig;
use rate_gate::store::CounterStore;
use rate_gate::{init_logging, CacheClient, CacheStatsReport, PolicyKind, RateGateLayer, RateLimitStore};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let instance_id = Uuid::new_v4();
    info!(%instance_id, "rate gate starting up");

    let config = CacheConfig::from_env();

    // General-purpose cache client. The rate limit store opens its own
    // connection so the two fail independently.
    let cache = match CacheClient::new(config.clone()) {
        Ok(cache) => Arc::new(cache),
        Err(err) => {
            error!(error = %err, "invalid cache configuration");
            std::process::exit(1);
        }
    };
    if let Err(err) = cache.initialize().await {
        warn!(error = %err, "cache backend unavailable, continuing without it");
    }

    let store: Arc<dyn CounterStore> = Arc::new(RateLimitStore::connect(config).await);

    // Routes without a dedicated policy fall under the general quota; the
    // operational /stats endpoint is not rate limited. Every route is
    // charged under exactly one policy.
    let general = Router::new()
        .route("/api/profile", get(profile))
        .layer(RateGateLayer::new(PolicyKind::General, store.clone()));

    let app = Router::new()
        .route(
            "/auth/login",
            post(login).layer(RateGateLayer::new(PolicyKind::Auth, store.clone())),
        )
        .route(
            "/api/tasks",
            post(create_task).layer(RateGateLayer::new(PolicyKind::TaskCreation, store.clone())),
        )
        .route(
            "/api/search",
            get(search).layer(RateGateLayer::new(PolicyKind::Search, store)),
        )
        .route("/stats", get(stats))
        .merge(general)
        .with_state(cache.clone());

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%addr, error = %err, "failed to bind server address");
            std::process::exit(1);
        }
    };

    info!(%addr, "listening");
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        error!(error = %err, "server error");
    }

    cache.close().await;
    info!("shut down cleanly");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}

// Demo handlers; a real deployment delegates to the marketplace services.

async fn login() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "success": true })))
}

async fn create_task() -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({ "success": true })))
}

async fn search() -> Json<Value> {
    Json(json!({ "success": true, "results": [] }))
}

async fn profile() -> Json<Value> {
    Json(json!({ "success": true, "profile": {} }))
}

async fn stats(State(cache): State<Arc<CacheClient>>) -> Json<CacheStatsReport> {
    Json(cache.stats().await)
}
