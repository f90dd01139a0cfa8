//! Conversion gateway: render a request and route persistence.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::info;

use crate::application::{
    history::{HistoryError, HistoryService},
    render::{RenderError, RenderService},
};
use crate::domain::history::{ArtifactKey, ConversionRecord};

pub(crate) const METRIC_CONVERSIONS_TOTAL: &str = "mdkv_conversions_total";

pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct ConvertRequest {
    pub markdown: Option<String>,
    pub css: Option<String>,
    pub store: bool,
    pub key: Option<String>,
    pub history: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    /// Wrapped HTML returned directly.
    Html(String),
    /// Request was appended to the history log; carries the updated log.
    History(Vec<ConversionRecord>),
    /// Output was written under the returned key.
    Stored(ArtifactKey),
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("input of {actual} bytes exceeds the {limit} byte limit")]
    TooLarge { limit: usize, actual: usize },
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Storage(#[from] HistoryError),
}

#[derive(Clone)]
pub struct ConversionService {
    renderer: Arc<dyn RenderService>,
    history: Arc<HistoryService>,
    max_input_bytes: usize,
}

impl ConversionService {
    pub fn new(renderer: Arc<dyn RenderService>, history: Arc<HistoryService>) -> Self {
        Self {
            renderer,
            history,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }

    pub fn with_max_input_bytes(mut self, limit: usize) -> Self {
        self.max_input_bytes = limit;
        self
    }

    pub fn history(&self) -> &Arc<HistoryService> {
        &self.history
    }

    /// Render the request and persist it as asked.
    ///
    /// When both `history` and `store` are set, only the history append runs.
    pub async fn convert(&self, request: ConvertRequest) -> Result<ConvertOutcome, ConvertError> {
        let ConvertRequest {
            markdown,
            css,
            store,
            key,
            history,
        } = request;

        let markdown = require_input(markdown, "No markdown provided")?;
        self.check_size(&markdown)?;
        if let Some(css) = css.as_deref() {
            self.check_size(css)?;
        }

        let rendered = self.render_blocking(markdown.clone(), false).await?;
        let html = wrap_output(&rendered, css.as_deref());

        if history {
            let records = self.history.append(markdown, html).await?;
            count_conversion("history");
            info!(
                target = "mdkv::convert",
                entries = records.len(),
                "conversion appended to history"
            );
            return Ok(ConvertOutcome::History(records));
        }

        if store {
            let key = self.history.store_artifact(html, key.as_deref()).await?;
            count_conversion("store");
            info!(target = "mdkv::convert", key = %key, "conversion stored");
            return Ok(ConvertOutcome::Stored(key));
        }

        count_conversion("inline");
        Ok(ConvertOutcome::Html(html))
    }

    /// Convert HTML back to Markdown. Nothing is persisted.
    pub async fn convert_reverse(&self, html: Option<String>) -> Result<String, ConvertError> {
        let html = require_input(html, "No html provided")?;
        self.check_size(&html)?;

        let markdown = self.render_blocking(html, true).await?;
        count_conversion("reverse");
        Ok(markdown)
    }

    fn check_size(&self, input: &str) -> Result<(), ConvertError> {
        if input.len() > self.max_input_bytes {
            return Err(ConvertError::TooLarge {
                limit: self.max_input_bytes,
                actual: input.len(),
            });
        }
        Ok(())
    }

    async fn render_blocking(&self, source: String, reverse: bool) -> Result<String, ConvertError> {
        let renderer = Arc::clone(&self.renderer);
        let output = tokio::task::spawn_blocking(move || {
            if reverse {
                renderer.render_reverse(&source)
            } else {
                renderer.render(&source)
            }
        })
        .await
        .map_err(|err| RenderError::Aborted {
            message: err.to_string(),
        })??;
        Ok(output)
    }
}

fn require_input(value: Option<String>, message: &'static str) -> Result<String, ConvertError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConvertError::InvalidRequest(message)),
    }
}

fn count_conversion(mode: &'static str) {
    counter!(METRIC_CONVERSIONS_TOTAL, "mode" => mode).increment(1);
}

/// Wrap rendered HTML in the `markdown-body` container, preceded by a
/// `<style>` block when a non-empty stylesheet is supplied.
pub fn wrap_output(html: &str, css: Option<&str>) -> String {
    match css.filter(|css| !css.is_empty()) {
        Some(css) => format!(
            "<style>{}</style>\n<div class=\"markdown-body\">{html}</div>",
            neutralize_style_close(css)
        ),
        None => format!("<div class=\"markdown-body\">{html}</div>"),
    }
}

/// Drop every case-insensitive `</style` so the stylesheet cannot end its
/// block early, including sequences that only form once an inner match is
/// removed. Single pass: a match can only appear at the end of the output.
fn neutralize_style_close(css: &str) -> String {
    const NEEDLE: &[u8] = b"</style";

    let mut output = String::with_capacity(css.len());
    for ch in css.chars() {
        output.push(ch);
        let Some(start) = output.len().checked_sub(NEEDLE.len()) else {
            continue;
        };
        if output.as_bytes()[start..].eq_ignore_ascii_case(NEEDLE) {
            output.truncate(start);
        }
    }
    output
}
