use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("markdown rendering failed: {message}")]
    Markdown { message: String },
    #[error("render task aborted: {message}")]
    Aborted { message: String },
}

/// Markdown/HTML conversion capability. Implementations must be pure: the
/// same input yields the same output or error.
pub trait RenderService: Send + Sync {
    /// Markdown to sanitised HTML.
    fn render(&self, markdown: &str) -> Result<String, RenderError>;

    /// HTML back to Markdown.
    fn render_reverse(&self, html: &str) -> Result<String, RenderError>;
}
