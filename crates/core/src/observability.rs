//! Structured logging initialisation
//!
//! Installs a `tracing-subscriber` registry filtered by `EnvFilter`. The filter
//! comes from `LogConfig::level`, which binaries usually populate from `RUST_LOG`.
//! Events are written to stderr so stdout stays free for command output.

use crate::error::ObservabilityError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// Human readable, multi-line output
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(ObservabilityError::InvalidFilter {
                filter: other.to_string(),
                message: "log format must be 'json' or 'pretty'".to_string(),
            }),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive, e.g. `info` or `pinsage=debug,warn`
    pub level: String,
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
            service_name: "pinsage".to_string(),
        }
    }
}

impl LogConfig {
    /// Config from `RUST_LOG` and `PINSAGE_LOG_FORMAT`, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let level = std::env::var("RUST_LOG").unwrap_or(defaults.level);
        let format = std::env::var("PINSAGE_LOG_FORMAT")
            .ok()
            .and_then(|f| f.parse().ok())
            .unwrap_or(defaults.format);

        Self {
            format,
            level,
            service_name: defaults.service_name,
        }
    }

    fn env_filter(&self) -> Result<EnvFilter, ObservabilityError> {
        EnvFilter::try_new(&self.level).map_err(|e| ObservabilityError::InvalidFilter {
            filter: self.level.clone(),
            message: e.to_string(),
        })
    }
}

/// Initialize the global tracing subscriber
///
/// Must be called once at process startup, before any pipeline stage runs.
///
/// # Errors
///
/// Returns error if the filter directive is invalid or a global subscriber
/// has already been installed.
pub fn init_logging(config: &LogConfig) -> Result<(), ObservabilityError> {
    let env_filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .map_err(|e| ObservabilityError::SubscriberInit(e.to_string()))?;

    tracing::info!(
        service_name = %config.service_name,
        level = %config.level,
        "Logging initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LogConfig {
            level: "pinsage=bogus".to_string(),
            ..LogConfig::default()
        };
        assert!(matches!(
            config.env_filter(),
            Err(ObservabilityError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig::default();
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
