//! Error handlers.
//!
//! An [`ErrorHandler`] with a non-empty kind list is *scoped*: it receives
//! errors whose [`ErrorKind`] is in that list. One with no kinds is the
//! *global* handler; a dispatcher holds at most one.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use courier_core::{ErrorKind, HandlerError, HandlerResult, UpdateContext};

use crate::callback::{Callback, IntoPropagation};

type ErrorArgs = (Arc<UpdateContext>, Arc<HandlerError>);

struct ErrorHandlerInner {
    kinds: Vec<ErrorKind>,
    callback: Callback<ErrorArgs>,
    name: Option<String>,
}

/// A callback invoked when a handler fails.
#[derive(Clone)]
pub struct ErrorHandler {
    inner: Arc<ErrorHandlerInner>,
}

impl ErrorHandler {
    /// Returns `true` for the global (unscoped) handler.
    pub fn is_global(&self) -> bool {
        self.inner.kinds.is_empty()
    }

    /// Returns `true` if this scoped handler reacts to `kind`.
    ///
    /// Always `false` for the global handler.
    pub fn handles(&self, kind: &ErrorKind) -> bool {
        self.inner.kinds.contains(kind)
    }

    pub fn kinds(&self) -> &[ErrorKind] {
        &self.inner.kinds
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Runs the callback for one failed update.
    ///
    /// Any propagation value the callback returns is ignored.
    pub async fn invoke(
        &self,
        ctx: Arc<UpdateContext>,
        error: Arc<HandlerError>,
    ) -> HandlerResult<()> {
        self.inner.callback.call((ctx, error)).await.map(|_| ())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for ErrorHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ErrorHandler {}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("kinds", &self.inner.kinds)
            .field("name", &self.inner.name)
            .finish()
    }
}

/// Builds an [`ErrorHandler`].
///
/// ```rust,ignore
/// let on_flood = on_error([ErrorKind::Flood])
///     .handler(|_ctx, err| async move {
///         tracing::warn!("slowing down: {err}");
///     });
/// ```
#[must_use = "a builder does nothing until a callback is attached"]
pub struct ErrorHandlerBuilder {
    kinds: Vec<ErrorKind>,
    name: Option<String>,
}

impl ErrorHandlerBuilder {
    /// Starts a builder; an empty `kinds` produces the global handler.
    pub fn new(kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        let mut unique = Vec::new();
        for kind in kinds {
            if !unique.contains(&kind) {
                unique.push(kind);
            }
        }
        Self {
            kinds: unique,
            name: None,
        }
    }

    /// Sets a name for this handler (useful for debugging).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn handler<F, Fut, R>(self, f: F) -> ErrorHandler
    where
        F: Fn(Arc<UpdateContext>, Arc<HandlerError>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoPropagation,
    {
        self.finish(Callback::from_async(move |(ctx, err): ErrorArgs| f(ctx, err)))
    }

    /// Finishes with a blocking callback, run on tokio's blocking pool.
    pub fn blocking<F, R>(self, f: F) -> ErrorHandler
    where
        F: Fn(Arc<UpdateContext>, Arc<HandlerError>) -> R + Send + Sync + 'static,
        R: IntoPropagation,
    {
        self.finish(Callback::from_blocking(move |(ctx, err): ErrorArgs| f(ctx, err)))
    }

    fn finish(self, callback: Callback<ErrorArgs>) -> ErrorHandler {
        ErrorHandler {
            inner: Arc::new(ErrorHandlerInner {
                kinds: self.kinds,
                callback,
                name: self.name,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_and_global() {
        let scoped = ErrorHandlerBuilder::new([
            ErrorKind::Flood,
            ErrorKind::Flood,
            ErrorKind::Timeout,
        ])
        .handler(|_, _| async {});
        let global = ErrorHandlerBuilder::new([]).name("fallback").handler(|_, _| async {});

        assert!(!scoped.is_global());
        assert_eq!(scoped.kinds(), &[ErrorKind::Flood, ErrorKind::Timeout]);
        assert!(scoped.handles(&ErrorKind::Timeout));
        assert!(!scoped.handles(&ErrorKind::Parse));

        assert!(global.is_global());
        assert!(!global.handles(&ErrorKind::Parse));
        assert_eq!(global.name(), Some("fallback"));
    }

    #[test]
    fn test_identity() {
        let a = ErrorHandlerBuilder::new([ErrorKind::Network]).blocking(|_, _| ());
        let b = ErrorHandlerBuilder::new([ErrorKind::Network]).blocking(|_, _| ());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
