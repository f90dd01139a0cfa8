use crate::application::error::HttpError;
use crate::domain::history::ConversionRecord;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// One history row on the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntryView {
    pub input_preview: String,
    pub output_preview: String,
    pub created_at: String,
}

impl From<&ConversionRecord> for HistoryEntryView {
    fn from(record: &ConversionRecord) -> Self {
        Self {
            input_preview: preview(&record.input),
            output_preview: preview(&record.output),
            created_at: format_timestamp(record.created_at),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub entries: Vec<HistoryEntryView>,
    pub history_unavailable: bool,
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

fn format_timestamp(millis: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previews_truncate_on_char_boundaries() {
        let long = "é".repeat(60);
        let view = HistoryEntryView::from(&ConversionRecord::new(long, "short", 0));

        assert_eq!(view.input_preview.chars().count(), PREVIEW_CHARS + 1);
        assert!(view.input_preview.ends_with('…'));
        assert_eq!(view.output_preview, "short");
    }

    #[test]
    fn timestamps_render_as_rfc3339() {
        let view = HistoryEntryView::from(&ConversionRecord::new("a", "b", 1_700_000_000_000));
        assert_eq!(view.created_at, "2023-11-14T22:13:20Z");
    }

    #[test]
    fn index_lists_entries_and_escapes_them() {
        let html = IndexTemplate {
            entries: vec![HistoryEntryView::from(&ConversionRecord::new(
                "<b>x</b>",
                "<p>x</p>",
                0,
            ))],
            history_unavailable: false,
        }
        .render()
        .expect("render index");

        assert!(!html.contains("<b>x</b>"));
        assert!(!html.contains("<p>x</p>"));
        assert!(html.contains(r#"action="/api/convert""#));
        assert!(html.contains(r#"action="/api/history/clear""#));
        assert!(html.contains(r#"href="/api/history""#));
        assert!(!html.contains("History is unavailable"));
    }

    #[test]
    fn index_shows_notice_when_history_is_unavailable() {
        let html = IndexTemplate {
            entries: Vec::new(),
            history_unavailable: true,
        }
        .render()
        .expect("render index");

        assert!(html.contains("History is unavailable"));
    }
}
