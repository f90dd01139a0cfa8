//! Conversion endpoints: `/api/convert` and `/api/reverse`.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::application::{
    convert::{ConvertOutcome, ConvertRequest},
    error::HttpError,
};

use super::AppState;

const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

#[derive(Debug, Default, Deserialize)]
pub struct ConvertQuery {
    pub markdown: Option<String>,
    pub css: Option<String>,
    pub store: Option<String>,
    pub key: Option<String>,
    pub history: Option<String>,
}

impl From<ConvertQuery> for ConvertRequest {
    fn from(query: ConvertQuery) -> Self {
        Self {
            store: parse_flag(query.store.as_deref()),
            history: parse_flag(query.history.as_deref()),
            markdown: query.markdown,
            css: query.css,
            key: query.key,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertBody {
    pub markdown: Option<String>,
    pub css: Option<String>,
    #[serde(default)]
    pub store: bool,
    #[serde(alias = "key")]
    pub custom_key: Option<String>,
    #[serde(default)]
    pub history: bool,
}

impl From<ConvertBody> for ConvertRequest {
    fn from(body: ConvertBody) -> Self {
        Self {
            markdown: body.markdown,
            css: body.css,
            store: body.store,
            key: body.custom_key,
            history: body.history,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReverseQuery {
    pub html: Option<String>,
}

pub async fn convert_query(
    State(state): State<AppState>,
    Query(query): Query<ConvertQuery>,
) -> Result<Response, HttpError> {
    let outcome = state.conversions.convert(query.into()).await?;
    Ok(outcome_response(outcome))
}

pub async fn convert_json(
    State(state): State<AppState>,
    body: Result<Json<ConvertBody>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(body) = body.map_err(json_rejection_to_http)?;
    let outcome = state.conversions.convert(body.into()).await?;
    Ok(outcome_response(outcome))
}

/// `DELETE /api/convert?history=true` clears the history log.
pub async fn delete_via_convert(
    State(state): State<AppState>,
    Query(query): Query<ConvertQuery>,
) -> Result<StatusCode, HttpError> {
    if !parse_flag(query.history.as_deref()) {
        return Err(HttpError::new(
            "infra::http::conversions::delete_via_convert",
            StatusCode::BAD_REQUEST,
            "Nothing to delete",
            "DELETE /api/convert requires history=true",
        ));
    }

    state.history.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reverse_query(
    State(state): State<AppState>,
    Query(query): Query<ReverseQuery>,
) -> Result<Response, HttpError> {
    let markdown = state.conversions.convert_reverse(query.html).await?;
    Ok(markdown_response(markdown))
}

pub async fn reverse_json(
    State(state): State<AppState>,
    body: Result<Json<ReverseQuery>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(body) = body.map_err(json_rejection_to_http)?;
    let markdown = state.conversions.convert_reverse(body.html).await?;
    Ok(markdown_response(markdown))
}

fn outcome_response(outcome: ConvertOutcome) -> Response {
    match outcome {
        ConvertOutcome::Html(html) => Html(html).into_response(),
        ConvertOutcome::History(records) => Json(records).into_response(),
        ConvertOutcome::Stored(key) => {
            (StatusCode::OK, format!("Stored HTML with key: {key}")).into_response()
        }
    }
}

fn markdown_response(markdown: String) -> Response {
    ([(CONTENT_TYPE, MARKDOWN_CONTENT_TYPE)], markdown).into_response()
}

fn json_rejection_to_http(rejection: JsonRejection) -> HttpError {
    let status = rejection.status();
    let public_message = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "Input too large"
    } else {
        "Invalid request body"
    };
    HttpError::new(
        "infra::http::conversions::json_rejection",
        status,
        public_message,
        rejection.body_text(),
    )
}

/// Query flags compare like the browser form sends them; anything
/// unrecognised is false.
pub(crate) fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|raw| {
        matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        )
    })
}
