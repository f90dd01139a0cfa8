//! Rendering capability: Markdown to HTML and back.
//!
//! The pipeline is pure; persistence of results happens in the caller.

mod markdown;
mod sanitize;
mod types;

pub use markdown::ComrakRenderService;
pub use types::{RenderError, RenderService};
