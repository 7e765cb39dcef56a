//! Structured logging setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines on stderr
    #[default]
    Text,
    /// One JSON object per line on stdout, with thread, file and line
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Directive string, e.g. "info" or "info,sessions=debug"
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Log span open and close, useful around warehouse writes
    #[serde(default)]
    pub span_events: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
            span_events: false,
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `RUST_LOG` sets the filter; `LOG_JSON` (`1`, `true` or `json`)
    /// switches to JSON lines.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(filter) = std::env::var("RUST_LOG") {
            config.filter = filter;
        }
        if let Ok(json) = std::env::var("LOG_JSON") {
            config.format = LogFormat::parse(&json);
        }
        config
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, span_events: bool) -> Self {
        self.span_events = span_events;
        self
    }
}

/// Installs the global subscriber. Returns false if one was already set,
/// which lets tests call it freely.
pub fn init_tracing(config: TracingConfig) -> bool {
    let env_filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(default_filter()));
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(span_events)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .is_ok(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_span_events(span_events)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::info!(filter = %config.filter, format = ?config.format, "Tracing initialized");
    }
    installed
}

pub fn init_tracing_from_env() -> bool {
    init_tracing(TracingConfig::from_env())
}
