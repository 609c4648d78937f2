use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "mediateca_cache_hits_total",
            Unit::Count,
            "Total number of listing cache hits."
        );
        describe_counter!(
            "mediateca_cache_misses_total",
            Unit::Count,
            "Total number of listing cache misses, expired entries included."
        );
        describe_counter!(
            "mediateca_dispatch_total",
            Unit::Count,
            "Total number of dispatched requests."
        );
        describe_counter!(
            "mediateca_dispatch_failures_total",
            Unit::Count,
            "Total number of dispatched requests that ended in an error."
        );
        describe_histogram!(
            "mediateca_dispatch_duration_ms",
            Unit::Milliseconds,
            "Dispatch latency in milliseconds."
        );
        describe_counter!(
            "mediateca_bus_publish_total",
            Unit::Count,
            "Total number of update messages handed to the bus."
        );
        describe_counter!(
            "mediateca_counter_updates_total",
            Unit::Count,
            "Total number of view and download counter movements."
        );
        describe_counter!(
            "mediateca_file_lookup_failures_total",
            Unit::Count,
            "Total number of failed file bundle lookups."
        );
        describe_gauge!(
            "mediateca_cache_entries",
            Unit::Count,
            "Entries currently held by the listing cache."
        );
    });
}
