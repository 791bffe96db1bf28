use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use arcadia_api::middleware::{require_admin, require_auth};
use arcadia_api::{AppState, AppStateInner, auth, catalog, chat, stats, tokens};
use arcadia_db::clock::SystemClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arcadia=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("ARCADIA_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let admin_key = std::env::var("ARCADIA_ADMIN_KEY").unwrap_or_default();
    let admin_user = std::env::var("ARCADIA_ADMIN_USER").ok();
    let db_path = std::env::var("ARCADIA_DB_PATH").unwrap_or_else(|_| "arcadia.db".into());
    let host = std::env::var("ARCADIA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("ARCADIA_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    if admin_key.is_empty() {
        warn!("ARCADIA_ADMIN_KEY not set; admin access requires an admin-role login");
    }

    // Init database (runs migrations before serving)
    let db = arcadia_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        admin_key,
        admin_user,
        clock: Arc::new(SystemClock),
    });

    // Routes
    let public_routes = Router::new()
        .route("/", get(root))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/tokens/redeem", post(tokens::redeem))
        .route("/premium/count", get(tokens::premium_count))
        .route("/premium/{user_id}", get(tokens::premium_status))
        .route("/catalog", get(catalog::list))
        .route("/visits", post(stats::record_visit).get(stats::visit_count))
        .with_state(state.clone());

    let user_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/me/xp", post(auth::add_xp))
        .route("/chat/send", post(chat::send_message))
        .route("/chat/messages", get(chat::get_messages))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/tokens/issue", post(tokens::issue))
        .route("/chat/admin/list", get(chat::admin_list))
        .route("/chat/admin/{chat_id}/messages", get(chat::admin_messages))
        .route("/chat/admin/{chat_id}/send", post(chat::admin_send))
        .route("/admin/catalog", post(catalog::upsert))
        .route("/admin/catalog/delete", post(catalog::delete))
        .route("/admin/catalog/clear", post(catalog::clear))
        .route("/admin/catalog/import", post(catalog::import))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Arcadia server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true, "name": "arcadia" }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
