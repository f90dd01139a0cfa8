use comrak::{Arena, format_html, options::Options, parse_document};
use tracing::debug;

use super::sanitize::{build_sanitizer, default_options};
use super::types::{RenderError, RenderService};

/// Comrak-based Markdown renderer with Ammonia sanitisation, plus
/// `fast_html2md` for the reverse direction.
pub struct ComrakRenderService {
    options: Options<'static>,
    sanitizer: ammonia::Builder<'static>,
}

impl ComrakRenderService {
    pub fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: build_sanitizer(),
        }
    }
}

impl Default for ComrakRenderService {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderService for ComrakRenderService {
    fn render(&self, markdown: &str) -> Result<String, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;

        let sanitized = self.sanitizer.clean(&html).to_string();
        debug!(
            target = "mdkv::render",
            input_bytes = markdown.len(),
            output_bytes = sanitized.len(),
            "rendered markdown"
        );
        Ok(sanitized)
    }

    fn render_reverse(&self, html: &str) -> Result<String, RenderError> {
        let markdown = html2md::rewrite_html(html, false);
        debug!(
            target = "mdkv::render",
            input_bytes = html.len(),
            output_bytes = markdown.len(),
            "converted html to markdown"
        );
        Ok(markdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_heading() {
        let html = ComrakRenderService::new().render("# Hi").expect("render");
        assert_eq!(html.trim(), "<h1>Hi</h1>");
    }

    #[test]
    fn renders_gfm_table_and_strikethrough() {
        let html = ComrakRenderService::new()
            .render("| a | b |\n|---|---|\n| 1 | ~~2~~ |\n")
            .expect("render");

        assert!(html.contains("<table>"));
        assert!(html.contains("<del>2</del>"));
    }

    #[test]
    fn inline_script_is_removed() {
        let html = ComrakRenderService::new()
            .render("hello <script>alert(1)</script>")
            .expect("render");

        assert!(html.contains("hello"));
        assert!(!html.contains("script"));
    }

    #[test]
    fn empty_markdown_renders_empty() {
        let html = ComrakRenderService::new().render("").expect("render");
        assert!(html.trim().is_empty());
    }

    #[test]
    fn reverse_converts_heading_and_emphasis() {
        let markdown = ComrakRenderService::new()
            .render_reverse("<h1>Title</h1><p>some <strong>bold</strong> text</p>")
            .expect("reverse");

        assert!(markdown.contains("Title"));
        assert!(markdown.contains("**bold**"));
    }
}
