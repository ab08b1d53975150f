//! Runtime error types.

use courier_framework::RegistryError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the dispatcher lifecycle and the update queue.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The dispatcher that owns the queue has been dropped.
    #[error("Update queue is closed")]
    QueueClosed,

    /// A worker task ended abnormally; carries the first failing index.
    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A registry mutation failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
