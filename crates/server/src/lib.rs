use std::sync::Arc;
use std::time::Duration;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;

use services::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub config: config::Config,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(db: db::Database, config: config::Config) -> Self {
        let limiter = RateLimiter::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
        );
        Self {
            db,
            config,
            limiter: Arc::new(limiter),
        }
    }
}

/// Migrates and seeds the database, returning state ready to serve.
pub async fn bootstrap(db: db::Database, config: config::Config) -> anyhow::Result<AppState> {
    db.run_migrations().await?;
    db::seed::run(&db, &config).await?;
    Ok(AppState::new(db, config))
}

pub fn app(state: AppState) -> Router {
    // Build protected routes (require authentication)
    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .nest("/comments", routes::comments::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Build API router; every API call counts against the client's window
    let api_router = Router::new()
        .nest("/auth", routes::auth::router())
        .merge(protected_routes)
        .fallback(api_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ));

    // Unknown paths outside /api get the client bundle's index.html
    let static_dir = &state.config.static_dir;
    let spa = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_router)
        .fallback_service(spa)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn api_not_found() -> error::AppError {
    error::AppError::NotFound("No such endpoint".to_string())
}
