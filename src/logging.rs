//! Logging setup
//!
//! Diagnostics are written to stderr so that stdout only carries monitor
//! output. The level comes from the `[logging]` section or the command line
//! and can be refined with `RUST_LOG`.

use crate::config::LoggingConfig;
use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Log format type
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LogFormat {
    /// Plain text format (default)
    #[default]
    Text,
    /// JSON structured format
    Json,
}

impl LogFormat {
    /// Parse log format from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Log configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Text,
        }
    }
}

impl LogConfig {
    /// Parse log level from string
    pub fn parse_level(s: &str) -> Option<Level> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }

    /// Build from the configuration file, `level` overrides the file value.
    ///
    /// Unknown values fall back to the defaults with a warning on stderr,
    /// since the subscriber is not installed yet.
    pub fn from_config(logging: &LoggingConfig, level: Option<&str>) -> Self {
        let level_name = level.unwrap_or(&logging.level);
        let level = Self::parse_level(level_name).unwrap_or_else(|| {
            eprintln!("Warning: Invalid log level '{}', using 'info'", level_name);
            Level::INFO
        });
        let format = LogFormat::parse(&logging.format).unwrap_or_else(|| {
            eprintln!(
                "Warning: Invalid log format '{}', using 'text'",
                logging.format
            );
            LogFormat::Text
        });
        Self { level, format }
    }
}

/// Install the global tracing subscriber
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.level).into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
