//! Courier Runtime - worker pool and lifecycle for the Courier dispatcher.
//!
//! This crate provides:
//! - The dispatcher itself (`UpdateDispatcher`, `DispatcherBuilder`)
//! - The update queue handed to transports (`UpdateSender`)
//! - Layered configuration (`CourierConfig`, `ConfigLoader`)
//! - Logging setup
//!
//! ```ignore
//! use courier_runtime::UpdateDispatcher;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let dispatcher = UpdateDispatcher::builder()
//!         .parsers(parsers())
//!         .build(client)?;
//!
//!     dispatcher.add_handler(on_message().handler(echo), 0).await?;
//!
//!     // Run until Ctrl+C
//!     dispatcher.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! Each update is taken off the queue by exactly one worker. Handlers for a
//! single update run in group order; different updates run concurrently
//! across workers, so ordering between updates is not guaranteed once more
//! than one worker is configured.

mod barrier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
mod queue;
mod worker;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, CourierConfig, DispatcherConfig, LoggingConfig,
    Profile,
};
pub use dispatcher::{DispatcherBuilder, MutationHandle, UpdateDispatcher};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use queue::UpdateSender;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
