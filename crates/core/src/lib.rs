//! # PinSage Core
//!
//! Shared building blocks for the PinSage hierarchical recommender workspace.
//!
//! ## Modules
//!
//! - `config`: Layered configuration loading (file + environment) and validation
//! - `error`: Configuration and observability error types
//! - `observability`: Structured logging initialisation

pub mod config;
pub mod error;
pub mod observability;

pub use config::{load_dotenv, load_layered, ConfigLoader};
pub use error::{ConfigError, ObservabilityError};
pub use observability::{init_logging, LogConfig, LogFormat};
