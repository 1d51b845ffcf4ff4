//! In-process caches in front of the content store.
//!
//! - [`ArticlesCache`]: the public article list plus a content-addressed client
//!   payload, rebuilt whenever the store reports a new collection version.
//! - [`BodyCache`]: up to [`BODY_CACHE_CAPACITY`] rendered bodies, replaced
//!   round-robin once full.
//!
//! Both are constructed once at startup and shared via `Arc` with the HTTP
//! layer. Neither ever returns an error; store failures degrade into stale or
//! placeholder output.

mod articles;
mod bodies;
mod payload;
mod ring;

pub use articles::{ArticleContext, ArticlesCache, ArticlesPayload};
pub use bodies::{BODY_CACHE_CAPACITY, BodyCache, fetch_error_placeholder};
pub use payload::{ClientArticleView, articles_js_url, digest_from_file_name, frame_payload};
