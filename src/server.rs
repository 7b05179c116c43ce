use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Request, State, rejection::JsonRejection},
    http::{
        HeaderValue, Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
    },
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
    config::AppConfig,
    error::ServiceError,
    generation::{GenerationRequest, GenerationResponse, ImageRelay, OUTPUTS_ROUTE},
};

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub relay: Arc<ImageRelay>,
}

pub fn build_router(config: Arc<AppConfig>, relay: Arc<ImageRelay>) -> Router {
    let outputs = ServeDir::new(&config.output_dir);
    let body_limit = config.body_limit_bytes;
    let state = AppState { relay, config };

    // Preflight is answered by `preflight`; this only stamps the origin header.
    let cors = CorsLayer::new().allow_origin(Any);

    Router::new()
        .route("/", get(index).fallback(not_found))
        .route("/api/generate", post(generate).fallback(not_found))
        .nest_service(OUTPUTS_ROUTE, outputs)
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(middleware::from_fn(preflight))
        .layer(TraceLayer::new_for_http())
}

/// Answers every `OPTIONS` request, whatever the path, before routing.
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS {
        return next.run(request).await;
    }

    (
        StatusCode::OK,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            ),
            (
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            ),
        ],
    )
        .into_response()
}

async fn index(State(state): State<AppState>) -> Response {
    match tokio::fs::read_to_string(&state.config.index_path).await {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!(path = %state.config.index_path.display(), %err, "failed to read index page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error loading page").into_response()
        }
    }
}

async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<GenerationResponse>, ServiceError> {
    let Json(request) = payload.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ServiceError::PayloadTooLarge(rejection.body_text()),
        _ => ServiceError::InvalidInput(rejection.body_text()),
    })?;
    info!(
        has_reference = request.reference_image.is_some(),
        "processing /api/generate"
    );

    let image = state.relay.generate(request).await?;
    Ok(Json(GenerationResponse::success(image)))
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
