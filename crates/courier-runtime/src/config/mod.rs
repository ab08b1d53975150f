//! Configuration for the Courier runtime.
//!
//! Settings are layered with figment: built-in defaults, then config files,
//! then `COURIER_*` environment variables, then programmatic overrides.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config};
pub use schema::{
    CourierConfig, DispatcherConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
