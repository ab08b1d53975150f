//! Error types raised by parsers, filters and handlers.
//!
//! Every [`HandlerError`] carries an explicit [`ErrorKind`] tag. Scoped error
//! handlers declare the kinds they react to, so routing is a plain tag
//! comparison rather than a type inspection.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use thiserror::Error;

/// Boxed source error.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Error Kind
// =============================================================================

/// Classification tag carried by every [`HandlerError`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request sent to the API was malformed.
    BadRequest,
    /// The session is not authorized for the call.
    Unauthorized,
    /// The call is not allowed for this account or chat.
    Forbidden,
    /// A referenced object does not exist.
    NotFound,
    /// The API asked the client to slow down.
    Flood,
    /// The connection failed or was interrupted.
    Network,
    /// An operation did not complete in time.
    Timeout,
    /// A raw update or payload could not be decoded.
    Parse,
    /// Unexpected internal failure.
    Internal,
    /// User code panicked.
    Panic,
    /// Application-defined kind.
    Custom(Cow<'static, str>),
}

impl ErrorKind {
    /// Creates an application-defined kind.
    pub fn custom(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Custom(name.into())
    }

    /// Returns the name used in log output.
    pub fn as_str(&self) -> &str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Flood => "flood",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Parse => "parse",
            Self::Internal => "internal",
            Self::Panic => "panic",
            Self::Custom(name) => name.as_ref(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Handler Error
// =============================================================================

/// An error raised while parsing or handling an update.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct HandlerError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl HandlerError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches an underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Creates a [`ErrorKind::BadRequest`] error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// Creates a [`ErrorKind::Forbidden`] error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// Creates a [`ErrorKind::NotFound`] error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates a [`ErrorKind::Flood`] error.
    pub fn flood(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Flood, message)
    }

    /// Creates a [`ErrorKind::Parse`] error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    /// Creates a [`ErrorKind::Internal`] error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Creates an error of an application-defined kind.
    pub fn custom(kind: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::custom(kind), message)
    }

    /// Converts a panic payload into a [`ErrorKind::Panic`] error.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        Self::new(ErrorKind::Panic, message)
    }

    /// Returns the kind tag.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if this error carries the given kind.
    pub fn is(&self, kind: &ErrorKind) -> bool {
        &self.kind == kind
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::Forbidden,
            _ => ErrorKind::Network,
        };
        Self::new(kind, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err.to_string()).with_source(err)
    }
}

/// Result type for parsers, filters and handlers.
pub type HandlerResult<T = ()> = Result<T, HandlerError>;

/// Runs user code, turning a panic into a [`ErrorKind::Panic`] error.
///
/// The future is constructed lazily inside the guard, so a panic while
/// building it is caught as well.
pub async fn guarded<F, Fut, T>(f: F) -> HandlerResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = HandlerResult<T>>,
{
    AssertUnwindSafe(async move { f().await })
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(HandlerError::from_panic(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = HandlerError::custom("quota", "daily quota exceeded");
        assert_eq!(err.to_string(), "quota: daily quota exceeded");
        assert!(err.is(&ErrorKind::custom("quota")));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        let err = HandlerError::from(io);
        assert_eq!(err.kind(), &ErrorKind::Timeout);
        assert!(std::error::Error::source(&err).is_some());
    }

    async fn explode() -> HandlerResult<()> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_guarded_catches_panic() {
        let result = guarded(explode).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Panic);
        assert_eq!(err.message(), "boom");
    }

    #[tokio::test]
    async fn test_guarded_passes_through() {
        let result = guarded(|| async { Ok::<_, HandlerError>(5) }).await;
        assert_eq!(result.unwrap(), 5);
    }
}
