//! Bounded cache of rendered article bodies.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::application::render::BodyRenderer;
use crate::application::repos::BodiesRepo;
use crate::domain::types::TextFormat;

use super::ring::SlotRing;

const SOURCE: &str = "quire::cache::bodies";

/// Number of rendered bodies kept in memory.
pub const BODY_CACHE_CAPACITY: usize = 64;

pub(crate) const METRIC_HIT_TOTAL: &str = "quire_body_cache_hit_total";
pub(crate) const METRIC_MISS_TOTAL: &str = "quire_body_cache_miss_total";
pub(crate) const METRIC_EVICT_TOTAL: &str = "quire_body_cache_evict_total";
pub(crate) const METRIC_FETCH_ERROR_TOTAL: &str = "quire_body_cache_fetch_error_total";

struct BodyCacheEntry {
    body_id: String,
    html: Arc<str>,
}

/// Placeholder cached in place of a body the store could not produce.
pub fn fetch_error_placeholder(body_id: &str) -> String {
    format!("Error: failed to fetch a message with bodyId {body_id:?}")
}

/// Rendered bodies keyed by body id, replaced round-robin once full.
///
/// A miss fetches and renders while holding the lock, so two concurrent
/// requests for the same id never render it twice. Fetch failures are cached as
/// a visible placeholder and are not retried until the slot is overwritten.
pub struct BodyCache {
    bodies: Arc<dyn BodiesRepo>,
    renderer: Arc<dyn BodyRenderer>,
    entries: Mutex<SlotRing<BodyCacheEntry>>,
}

impl BodyCache {
    pub fn new(bodies: Arc<dyn BodiesRepo>, renderer: Arc<dyn BodyRenderer>) -> Self {
        Self {
            bodies,
            renderer,
            entries: Mutex::new(SlotRing::new(BODY_CACHE_CAPACITY)),
        }
    }

    /// Rendered HTML for `body_id`. `format` only matters on a miss; a cached
    /// entry is returned as-is regardless of the requested format.
    pub async fn html(&self, body_id: &str, format: TextFormat) -> Arc<str> {
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.find(|entry| entry.body_id == body_id) {
            counter!(METRIC_HIT_TOTAL).increment(1);
            return Arc::clone(&entry.html);
        }
        counter!(METRIC_MISS_TOTAL).increment(1);

        let html: Arc<str> = match self.bodies.text_body(body_id).await {
            Ok(raw) => self.renderer.render(&raw, format).into(),
            Err(err) => {
                counter!(METRIC_FETCH_ERROR_TOTAL).increment(1);
                warn!(
                    target = SOURCE,
                    body_id,
                    error = %err,
                    "failed to fetch article body; caching placeholder"
                );
                fetch_error_placeholder(body_id).into()
            }
        };

        let evicted = entries.insert(BodyCacheEntry {
            body_id: body_id.to_string(),
            html: Arc::clone(&html),
        });
        if let Some(evicted) = evicted {
            counter!(METRIC_EVICT_TOTAL).increment(1);
            debug!(
                target = SOURCE,
                evicted = %evicted.body_id,
                inserted = body_id,
                "evicted rendered body"
            );
        }

        html
    }

    /// Number of populated slots.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
