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

/// Dependencies that log per connection; always capped at `warn`.
const QUIET_TARGETS: &[&str] = &["hyper=warn", "memcache=warn"];

/// Install the process-wide subscriber and register metric descriptions.
///
/// `RUST_LOG` directives are layered over the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = build_filter(logging)?;
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("subscriber already installed: {err}")))
}

fn build_filter(logging: &LoggingSettings) -> Result<EnvFilter, InfraError> {
    let mut filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    for directive in QUIET_TARGETS {
        let directive = directive
            .parse()
            .map_err(|err| InfraError::telemetry(format!("bad directive `{directive}`: {err}")))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "tessera_route_resolve_total",
            Unit::Count,
            "Route resolutions by resolver mode and outcome."
        );
        describe_counter!(
            "tessera_page_cache_hit_total",
            Unit::Count,
            "Total number of GET requests served from the page cache."
        );
        describe_counter!(
            "tessera_page_cache_miss_total",
            Unit::Count,
            "Total number of cacheable GET requests that missed the page cache."
        );
        describe_counter!(
            "tessera_page_cache_store_total",
            Unit::Count,
            "Page store writes by outcome."
        );
        describe_counter!(
            "tessera_page_cache_evict_total",
            Unit::Count,
            "Total number of cached pages removed by invalidation."
        );
        describe_histogram!(
            "tessera_invalidate_ms",
            Unit::Milliseconds,
            "Invalidation latency in milliseconds, store round trip included."
        );
    });
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::*;

    #[test]
    fn filter_keeps_configured_level_and_quiets_dependencies() {
        let filter = build_filter(&LoggingSettings {
            level: LevelFilter::DEBUG,
            format: LogFormat::Compact,
        })
        .expect("filter builds");

        let rendered = filter.to_string();
        assert!(rendered.contains("hyper=warn"), "{rendered}");
        assert!(rendered.contains("memcache=warn"), "{rendered}");
    }
}
