use axum::{
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use delete_account_api::{config, handlers, middleware};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up SUPABASE_URL and the service key.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting delete-account API in {:?} mode", config.environment);

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("DELETE_ACCOUNT_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("🚀 delete-account API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    Router::new()
        // Liveness
        .route("/health", get(health))
        // The deletion endpoint itself; everything but POST/OPTIONS is 405
        .route(
            "/",
            post(handlers::delete_account)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        // Global middleware
        .layer(axum::middleware::from_fn(middleware::cors::apply_cors))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> axum::response::Json<Value> {
    axum::response::Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
        }
    }))
}
