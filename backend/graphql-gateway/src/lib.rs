//! LearningPulse gateway library
//! Re-exports modules for the binary and integration tests

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod rest_api;
pub mod schema;
pub mod services;

use tracing_subscriber::prelude::*;

/// Install the global tracing subscriber
///
/// JSON output by default; `LOG_FORMAT=pretty` switches to human-readable lines.
pub fn init_tracing() {
    let pretty = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("pretty"))
        .unwrap_or(false);

    let json_layer = (!pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .with_target(true)
    });
    let pretty_layer = pretty.then(|| tracing_subscriber::fmt::layer().pretty());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,learningpulse_gateway=debug".into()),
        )
        .with(json_layer)
        .with(pretty_layer)
        .init();
}
