use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};

use storyhub_backend::api::{self, AppState};
use storyhub_backend::auth::JwtKeys;
use storyhub_backend::config::Config;
use storyhub_backend::continuation::ContinuationService;
use storyhub_backend::db::Database;
use storyhub_backend::generation::GeminiClient;
use storyhub_backend::metrics;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    metrics::register_metrics();

    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");

    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set; story generation requests will fail");
    }
    let generator = GeminiClient::new(
        config.generation_url.clone(),
        config.gemini_api_key.clone(),
        config.generation_timeout,
    )
    .expect("Failed to build generation client");

    let state = AppState {
        db: Arc::new(db),
        continuation: ContinuationService::new(Arc::new(generator)),
        jwt: JwtKeys::new(config.jwt_secret.as_bytes()),
        trending_limit: config.trending_limit,
    };

    let mut app = api::router(state);
    if let Some(dir) = &config.static_dir {
        tracing::info!("Serving frontend from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }
    let app = app.layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!("StoryHub backend listening on {addr}");
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
