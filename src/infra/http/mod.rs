mod conversions;
mod history;
mod middleware;
mod pages;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::{
    convert::ConversionService,
    error::ErrorReport,
    history::{HistoryError, HistoryService},
};

#[derive(Clone)]
pub struct AppState {
    pub conversions: Arc<ConversionService>,
    pub history: Arc<HistoryService>,
}

impl AppState {
    pub fn new(conversions: Arc<ConversionService>) -> Self {
        let history = conversions.history().clone();
        Self {
            conversions,
            history,
        }
    }
}

/// Build the application router. Requests larger than `body_limit` bytes are
/// rejected before they reach a handler.
pub fn build_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/health", get(health))
        .route(
            "/api/convert",
            get(conversions::convert_query)
                .post(conversions::convert_json)
                .delete(conversions::delete_via_convert),
        )
        .route(
            "/api/reverse",
            get(conversions::reverse_query).post(conversions::reverse_json),
        )
        .route(
            "/api/history",
            get(history::list_history).delete(history::clear_history),
        )
        .route("/api/history/clear", post(history::clear_history_form))
        .route("/api/artifacts/{key}", get(history::get_artifact))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn health(State(state): State<AppState>) -> Response {
    store_health_response(state.history.health().await)
}

fn store_health_response(result: Result<(), HistoryError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::store_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
