//! Logging setup
//!
//! Library code only emits `tracing` events. The extension entry point calls
//! [`init`] once so those events go somewhere when the engine loads the
//! library; embedding applications can install their own subscriber instead.

use once_cell::sync::OnceCell;
use std::io;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Show span events (enter/exit)
    pub show_spans: bool,
    /// Include thread ids and line numbers
    pub verbose_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            show_spans: false,
            verbose_location: cfg!(debug_assertions),
        }
    }
}

/// Parse a level name, case-insensitive
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // GDLINK_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("GDLINK_LOG_LEVEL") {
            config.level = parse_level(&level).unwrap_or(Level::INFO);
        }

        // GDLINK_LOG_SPANS: show span events
        config.show_spans = std::env::var("GDLINK_LOG_SPANS").is_ok();

        config
    }

    /// Errors only
    pub fn quiet() -> Self {
        Self {
            level: Level::ERROR,
            show_spans: false,
            verbose_location: false,
        }
    }

    /// Everything, with spans
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            show_spans: true,
            verbose_location: true,
        }
    }

    /// Override the level when a name is given and valid
    pub fn with_level_name(mut self, name: Option<&str>) -> Self {
        if let Some(level) = name.and_then(parse_level) {
            self.level = level;
        }
        self
    }
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
///
/// Only the first call has an effect. An already installed global
/// subscriber is left in place.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let level = config.level.as_str().to_lowercase();
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "gdlink_core={level},gdlink_classdb={level},gdlink_classes={level}"
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let installed = tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_span_events(span_events)
                    .with_target(true)
                    .with_thread_ids(config.verbose_location)
                    .with_line_number(config.verbose_location),
            )
            .try_init();

        if installed.is_err() {
            tracing::debug!("Global subscriber already set, keeping it");
        }
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}
