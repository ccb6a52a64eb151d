//! Logging initialization
//!
//! `RUST_LOG` always wins; otherwise the filter from `config.toml` (or the
//! `--log-filter` flag) applies, and "info" when neither is set.
//!
//! ```rust,no_run
//! use hotwire_chat::utils::init_logging;
//!
//! init_logging(Some("hotwire_chat::module=debug,info"));
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const DEFAULT_FILTER: &str = "info";

/// Pick the filter: `RUST_LOG`, then `filter`, then the default
fn build_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or(DEFAULT_FILTER))
}

/// Human-readable logs on stderr
///
/// ANSI colors are off when `NO_COLOR` is set.
pub fn init_logging(filter: Option<&str>) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(build_filter(filter))
        .init();
}

/// JSON lines for log aggregation
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(build_filter(filter))
        .init();
}

/// Initialize from the `[logging]` table, with an optional CLI override
///
/// `json_format` without the `json-logging` feature falls back to plain
/// output.
pub fn init_logging_from_config(config: Option<&LoggingConfig>, override_filter: Option<&str>) {
    let filter = override_filter.or_else(|| config.and_then(|c| c.filter.as_deref()));

    if config.is_some_and(|c| c.json_format) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
            return;
        }
    }
    init_logging(filter);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_falls_back_to_default() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert_eq!(build_filter(None).to_string(), DEFAULT_FILTER);
        assert_eq!(build_filter(Some("debug")).to_string(), "debug");
    }
}
