use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::browser::PageRenderer;
use crate::extract::{self, ExtractionError};
use crate::limiter::RenderLimiter;
use crate::models::{ErrorResponse, ImagesQuery};

#[derive(Clone)]
pub struct AppState {
    pub renderer: Arc<dyn PageRenderer>,
    pub limiter: Arc<RenderLimiter>,
    pub render_timeout: Duration,
}

impl AppState {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        limiter: RenderLimiter,
        render_timeout: Duration,
    ) -> Self {
        Self {
            renderer,
            limiter: Arc::new(limiter),
            render_timeout,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/images", get(images_endpoint))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn images_endpoint(
    State(state): State<AppState>,
    query: Result<Query<ImagesQuery>, QueryRejection>,
) -> Response {
    // An undecodable query goes down the same path as a missing `url`.
    let url = match query {
        Ok(Query(query)) => query.url.unwrap_or_default(),
        Err(rejection) => {
            tracing::debug!("malformed query string: {}", rejection);
            String::new()
        }
    };

    let result = extract::extract_images(
        Arc::clone(&state.renderer),
        &state.limiter,
        &url,
        state.render_timeout,
    )
    .await;

    match result {
        Ok(images) => {
            tracing::info!(url = %url, count = images.len(), "extracted images");
            (StatusCode::OK, Json(images)).into_response()
        }
        Err(e) => {
            let (status, message) = match &e {
                ExtractionError::InvalidUrl => (StatusCode::BAD_REQUEST, "Invalid URL"),
                ExtractionError::Busy => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Too many concurrent requests",
                ),
                ExtractionError::Render(_) => (StatusCode::BAD_GATEWAY, "Failed to render page"),
                ExtractionError::Extraction(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to extract images",
                ),
                ExtractionError::Timeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "Timed out rendering page")
                }
            };

            if status.is_server_error() {
                tracing::error!(url = %url, "image extraction failed: {}", e);
            } else {
                tracing::debug!(url = %url, "rejected request: {}", e);
            }

            let body = ErrorResponse {
                error: message.to_string(),
            };
            (status, Json(body)).into_response()
        }
    }
}
