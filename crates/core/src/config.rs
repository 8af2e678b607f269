//! Shared configuration loader
//!
//! Configuration is layered, lowest precedence first:
//!
//! 1. `Default` values of the target struct (via `#[serde(default)]`)
//! 2. An optional config file (`config/<name>.{toml,yaml,json}`)
//! 3. Environment variables with the service prefix, e.g. `PINSAGE_EMBEDDING_DIM`
//!
//! Nested keys use a double underscore: `PINSAGE_SIMULATION__N_USERS=50`.
//! List keys registered by the caller are split on commas: `PINSAGE_K_VALUES=1,5,10`.
//!
//! # Example
//!
//! ```no_run
//! use pinsage_core::config::{load_dotenv, load_layered};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! #[serde(default)]
//! struct Settings {
//!     seed: u64,
//! }
//!
//! load_dotenv();
//! let settings: Settings = load_layered("config/example", "EXAMPLE", &[]).unwrap();
//! ```

use crate::error::ConfigError;
use serde::de::DeserializeOwned;

/// Configuration loader trait
///
/// Implemented by the top-level configuration of each binary or pipeline.
pub trait ConfigLoader: Sized {
    /// Load configuration from the layered sources.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::Load` if a source cannot be read or a value
    /// cannot be deserialized into the target type.
    fn load() -> Result<Self, ConfigError>;

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::Invalid` naming the offending key.
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Build a `T` from an optional config file and prefixed environment variables.
///
/// `list_keys` names the (lowercase, dotted) keys whose environment value is a
/// comma separated list.
pub fn load_layered<T>(file: &str, prefix: &str, list_keys: &[&str]) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let mut environment = config::Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true);

    if !list_keys.is_empty() {
        environment = environment.list_separator(",");
        for key in list_keys {
            environment = environment.with_list_parse_key(key);
        }
    }

    let settings = config::Config::builder()
        .add_source(config::File::with_name(file).required(false))
        .add_source(environment)
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Load .env file if present
///
/// Does not return an error if the .env file is not found.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "Failed to load .env file");
        }
    }
}
