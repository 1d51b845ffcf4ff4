use crate::domain::types::TextFormat;

/// Turns a stored body into HTML suitable for embedding in a page.
pub trait BodyRenderer: Send + Sync {
    fn render(&self, raw: &str, format: TextFormat) -> String;
}
