mod config;

use std::sync::Arc;

use ammonia::clean_text;
use comrak::{markdown_to_html, options::Options};
use once_cell::sync::Lazy;

use crate::application::render::types::BodyRenderer;
use crate::domain::types::TextFormat;

use config::{build_sanitizer, default_options};

/// Comrak-based renderer with Ammonia sanitisation.
pub struct ComrakBodyRenderer {
    options: Options<'static>,
    sanitizer: ammonia::Builder<'static>,
}

impl ComrakBodyRenderer {
    fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: build_sanitizer(),
        }
    }

    fn sanitize(&self, html: &str) -> String {
        self.sanitizer.clean(html).to_string()
    }
}

static RENDER_SERVICE: Lazy<Arc<ComrakBodyRenderer>> =
    Lazy::new(|| Arc::new(ComrakBodyRenderer::new()));

/// Access the shared renderer instance, initialised on first use.
pub fn render_service() -> Arc<ComrakBodyRenderer> {
    Arc::clone(&RENDER_SERVICE)
}

impl Default for ComrakBodyRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyRenderer for ComrakBodyRenderer {
    fn render(&self, raw: &str, format: TextFormat) -> String {
        match format {
            TextFormat::Html => self.sanitize(raw),
            TextFormat::Markdown => self.sanitize(&markdown_to_html(raw, &self.options)),
            TextFormat::Text => format!("<pre class=\"text-body\">{}</pre>", clean_text(raw)),
        }
    }
}
