use anyhow::{anyhow, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tdp::AppContext;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{backup, health};
use crate::websocket;

/// Room for multipart framing on top of the archive itself
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub ctx: AppContext,
}

pub async fn create_app(ctx: AppContext, cors_origin: Option<&str>) -> Result<Router> {
    let body_limit = usize::try_from(ctx.config().max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let state = AppState { ctx };

    let cors = match cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<axum::http::HeaderValue>()
                    .map_err(|e| anyhow!("Invalid CORS origin: {}", e))?,
            )
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any)
            .allow_credentials(false),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any)
            .allow_credentials(false),
    };

    let api = Router::new()
        .route("/backup/export", get(backup::export_archive))
        .route(
            "/backup/restore",
            get(backup::list_restores).post(backup::submit_restore),
        )
        .route("/backup/restore/:task_id", get(backup::get_restore))
        .route("/backup/restore/:task_id/cancel", post(backup::cancel_restore));

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api)
        .route("/ws/restore/:task_id", get(websocket::restore_progress_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}
