//! Subscriber setup for `tracing`.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogConfig, LogFormat, LogTimeFormat};

/// Event timestamps in the configured format.
#[derive(Debug, Clone, Copy)]
pub struct LogClock(pub LogTimeFormat);

impl FormatTime for LogClock {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = Utc::now();
        match self.0 {
            LogTimeFormat::Unix => write!(w, "{}", now.timestamp()),
            LogTimeFormat::UnixMs => write!(w, "{}", now.timestamp_millis()),
            LogTimeFormat::UnixMicro => write!(w, "{}", now.timestamp_micros()),
            LogTimeFormat::Rfc3339 => {
                write!(w, "{}", now.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            LogTimeFormat::Rfc3339Nano => {
                write!(w, "{}", now.to_rfc3339_opts(SecondsFormat::Nanos, true))
            }
        }
    }
}

/// Maps a configured level name onto a filter directive.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "fatal" | "panic" => "error",
        _ => "info",
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `LOG_LEVEL`.
pub fn init(config: &LogConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&config.level)));
    let timer = LogClock(config.time_format);
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_timer(timer)
                    .with_current_span(false),
            )
            .try_init(),
        LogFormat::Console => registry
            .with(tracing_subscriber::fmt::layer().with_timer(timer))
            .try_init(),
    }
}
