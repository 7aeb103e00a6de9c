//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Set to any value to emit JSON log lines
pub const LOG_JSON_ENV: &str = "TRIARB_LOG_JSON";

/// Install the global subscriber; `RUST_LOG` filters, default `info`
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if std::env::var_os(LOG_JSON_ENV).is_some() {
        builder.json().init();
    } else {
        builder.init();
    }
}
