//! Body rendering pipeline.
//!
//! Rendering is pure and infallible: raw stored content goes in, sanitised HTML
//! comes out. Callers decide what to cache.

mod service;
mod types;

pub use service::{ComrakBodyRenderer, render_service};
pub use types::BodyRenderer;
