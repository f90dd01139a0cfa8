use axum::{extract::State, http::StatusCode, response::Response};
use tracing::warn;

use crate::presentation::views::{HistoryEntryView, IndexTemplate, render_template_response};

use super::AppState;

/// Converter form with the current history underneath. A store outage
/// degrades to an empty list with a notice rather than an error page.
pub(super) async fn index(State(state): State<AppState>) -> Response {
    let (entries, history_unavailable) = match state.history.fetch().await {
        Ok(records) => (
            records.iter().rev().map(HistoryEntryView::from).collect(),
            false,
        ),
        Err(err) => {
            warn!(
                target = "mdkv::http::index",
                error = %err,
                "failed to load history for index page"
            );
            (Vec::new(), true)
        }
    };

    render_template_response(
        IndexTemplate {
            entries,
            history_unavailable,
        },
        StatusCode::OK,
    )
}
