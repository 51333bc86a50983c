use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;

/// Initialize the global tracing subscriber. Call once at process boot.
///
/// `RUST_LOG` drives the filter (default `info`); `LOG_FORMAT=json` switches
/// to structured JSON lines, otherwise a human-readable format is used.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}
