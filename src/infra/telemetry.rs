use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the caches emit. Safe to call more
/// than once; only the first call has an effect.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "quire_articles_cache_rebuild_total",
            Unit::Count,
            "Total number of article cache rebuilds after a version change."
        );
        describe_histogram!(
            "quire_articles_cache_rebuild_ms",
            Unit::Milliseconds,
            "Article cache rebuild latency in milliseconds."
        );
        describe_counter!(
            "quire_articles_cache_serialize_error_total",
            Unit::Count,
            "Articles left out of the client payload because they failed to serialise."
        );
        describe_counter!(
            "quire_articles_cache_store_error_total",
            Unit::Count,
            "Article store failures absorbed by serving the previous build."
        );
        describe_counter!(
            "quire_body_cache_hit_total",
            Unit::Count,
            "Total number of rendered-body cache hits."
        );
        describe_counter!(
            "quire_body_cache_miss_total",
            Unit::Count,
            "Total number of rendered-body cache misses."
        );
        describe_counter!(
            "quire_body_cache_evict_total",
            Unit::Count,
            "Total number of rendered bodies overwritten by round-robin replacement."
        );
        describe_counter!(
            "quire_body_cache_fetch_error_total",
            Unit::Count,
            "Body fetch failures cached as placeholders."
        );
    });
}
