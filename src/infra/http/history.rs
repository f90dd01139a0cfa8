//! History log and stored artifact endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Redirect},
};

use crate::application::error::HttpError;
use crate::domain::history::ConversionRecord;

use super::AppState;

pub async fn list_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversionRecord>>, HttpError> {
    Ok(Json(state.history.fetch().await?))
}

pub async fn clear_history(State(state): State<AppState>) -> Result<StatusCode, HttpError> {
    state.history.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Form-friendly clear used by the index page; returns to the page.
pub async fn clear_history_form(State(state): State<AppState>) -> Result<Redirect, HttpError> {
    state.history.clear().await?;
    Ok(Redirect::to("/"))
}

pub async fn get_artifact(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Html<String>, HttpError> {
    match state.history.fetch_artifact(&key).await? {
        Some(body) => Ok(Html(body)),
        None => Err(HttpError::new(
            "infra::http::history::get_artifact",
            StatusCode::NOT_FOUND,
            "Artifact not found",
            format!("no artifact stored under `{key}`"),
        )),
    }
}
