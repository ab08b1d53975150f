//! Update handlers and their builders.
//!
//! An [`UpdateHandler`] subscribes to exactly one [`EventCategory`]. It owns a
//! list of filters, all of which must accept an update before the callback
//! runs, and a callback that may be async or blocking.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_framework::{HandlerBuilder, Propagation};
//!
//! let handler = HandlerBuilder::new(EventCategory::NewMessage)
//!     .name("greeter")
//!     .filter(|ctx| ctx.entities().user(42).is_some())
//!     .handler(|ctx| async move {
//!         println!("hello from {}", ctx.raw().name());
//!         Propagation::Continue
//!     });
//! ```
//!
//! Handlers are cheap to clone. Two clones are the same handler: registry
//! removal compares by identity, never by content.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use courier_core::{EventCategory, HandlerResult, UpdateContext};

use crate::callback::{BoxFuture, Callback, Filter, IntoPropagation, Propagation};
use crate::error_handler::ErrorHandler;

// ============================================================================
// UpdateHandler
// ============================================================================

struct UpdateHandlerInner {
    category: EventCategory,
    filters: Vec<Filter>,
    callback: Callback<Arc<UpdateContext>>,
    name: Option<String>,
}

/// A handler bound to one event category.
#[derive(Clone)]
pub struct UpdateHandler {
    inner: Arc<UpdateHandlerInner>,
}

impl UpdateHandler {
    /// Returns the category this handler serves.
    pub fn category(&self) -> EventCategory {
        self.inner.category
    }

    /// Returns the diagnostic name, if one was set.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Returns `true` for catch-all raw handlers.
    pub fn is_raw(&self) -> bool {
        self.inner.category.is_raw()
    }

    /// Returns `true` if the callback runs on the blocking pool.
    pub fn is_blocking(&self) -> bool {
        self.inner.callback.is_blocking()
    }

    /// Evaluates every filter in order; the first rejection short-circuits.
    ///
    /// A handler without filters matches everything of its category.
    pub async fn matches(&self, ctx: &Arc<UpdateContext>) -> HandlerResult<bool> {
        for filter in &self.inner.filters {
            if !filter.check(ctx).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Runs the callback and returns its propagation decision.
    pub async fn invoke(&self, ctx: Arc<UpdateContext>) -> HandlerResult<Propagation> {
        self.inner.callback.call(ctx).await
    }

    /// Returns `true` if both handles point at the same handler.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for UpdateHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for UpdateHandler {}

impl fmt::Debug for UpdateHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateHandler")
            .field("category", &self.inner.category)
            .field("name", &self.inner.name)
            .field("filters", &self.inner.filters.len())
            .field("blocking", &self.is_blocking())
            .finish()
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Builds an [`UpdateHandler`] for a parsed event category.
///
/// Usually obtained through one of the `on_*` functions in
/// [`builders`](crate::builders).
#[must_use = "a builder does nothing until a callback is attached"]
pub struct HandlerBuilder {
    category: EventCategory,
    filters: Vec<Filter>,
    name: Option<String>,
}

impl HandlerBuilder {
    /// Starts a builder for `category`.
    pub fn new(category: EventCategory) -> Self {
        Self {
            category,
            filters: Vec::new(),
            name: None,
        }
    }

    /// Sets a name for this handler (useful for debugging).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a synchronous filter.
    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&UpdateContext) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Filter::Sync(Arc::new(f)));
        self
    }

    /// Adds an async, fallible filter.
    ///
    /// A filter error is logged by the dispatcher and counts as a non-match.
    pub fn filter_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<UpdateContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<bool>> + Send + 'static,
    {
        self.filters.push(Filter::Async(Arc::new(
            move |ctx| -> BoxFuture<'static, HandlerResult<bool>> { Box::pin(f(ctx)) },
        )));
        self
    }

    /// Finishes the builder with an async callback.
    pub fn handler<F, Fut, R>(self, f: F) -> UpdateHandler
    where
        F: Fn(Arc<UpdateContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoPropagation,
    {
        self.finish(Callback::from_async(f))
    }

    /// Finishes the builder with a blocking callback, run on tokio's blocking
    /// pool.
    pub fn blocking<F, R>(self, f: F) -> UpdateHandler
    where
        F: Fn(Arc<UpdateContext>) -> R + Send + Sync + 'static,
        R: IntoPropagation,
    {
        self.finish(Callback::from_blocking(f))
    }

    fn finish(self, callback: Callback<Arc<UpdateContext>>) -> UpdateHandler {
        UpdateHandler {
            inner: Arc::new(UpdateHandlerInner {
                category: self.category,
                filters: self.filters,
                callback,
                name: self.name,
            }),
        }
    }
}

/// Builds a catch-all raw handler.
///
/// Raw handlers receive every update, including ones that were also delivered
/// to a category handler, and read the raw event and entity maps from the
/// context. This builder attaches no filters; for a filtered raw handler use
/// `HandlerBuilder::new(EventCategory::Raw)`, whose filters run on every update.
#[must_use = "a builder does nothing until a callback is attached"]
#[derive(Default)]
pub struct RawHandlerBuilder {
    name: Option<String>,
}

impl RawHandlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a name for this handler (useful for debugging).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn handler<F, Fut, R>(self, f: F) -> UpdateHandler
    where
        F: Fn(Arc<UpdateContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoPropagation,
    {
        self.into_builder().handler(f)
    }

    pub fn blocking<F, R>(self, f: F) -> UpdateHandler
    where
        F: Fn(Arc<UpdateContext>) -> R + Send + Sync + 'static,
        R: IntoPropagation,
    {
        self.into_builder().blocking(f)
    }

    fn into_builder(self) -> HandlerBuilder {
        HandlerBuilder {
            category: EventCategory::Raw,
            filters: Vec::new(),
            name: self.name,
        }
    }
}

// ============================================================================
// Handler
// ============================================================================

/// Anything that can be stored in a handler group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handler {
    Update(UpdateHandler),
    Error(ErrorHandler),
}

impl Handler {
    /// Returns the diagnostic name, if one was set.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Update(handler) => handler.name(),
            Self::Error(handler) => handler.name(),
        }
    }

    pub fn as_update(&self) -> Option<&UpdateHandler> {
        match self {
            Self::Update(handler) => Some(handler),
            Self::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorHandler> {
        match self {
            Self::Error(handler) => Some(handler),
            Self::Update(_) => None,
        }
    }
}

impl From<UpdateHandler> for Handler {
    fn from(handler: UpdateHandler) -> Self {
        Self::Update(handler)
    }
}

impl From<ErrorHandler> for Handler {
    fn from(handler: ErrorHandler) -> Self {
        Self::Error(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::message_context as context;
    use courier_core::{HandlerError, RawEventKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_filters_are_anded() {
        let handler = HandlerBuilder::new(EventCategory::NewMessage)
            .filter(|ctx| ctx.entities().user(1).is_some())
            .filter_async(|ctx| async move { Ok(ctx.raw().kind() == RawEventKind::NewMessage) })
            .handler(|_| async {});

        assert!(handler.matches(&context(&[1])).await.unwrap());
        assert!(!handler.matches(&context(&[2])).await.unwrap());
    }

    #[tokio::test]
    async fn test_filter_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = HandlerBuilder::new(EventCategory::NewMessage)
            .filter(|_| false)
            .filter(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            })
            .handler(|_| async {});

        assert!(!handler.matches(&context(&[])).await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_filter_error_surfaces() {
        let handler = HandlerBuilder::new(EventCategory::NewMessage)
            .filter_async(|_| async { Err(HandlerError::internal("lookup failed")) })
            .handler(|_| async {});

        assert!(handler.matches(&context(&[])).await.is_err());
    }

    #[tokio::test]
    async fn test_invoke_returns_propagation() {
        let handler = HandlerBuilder::new(EventCategory::NewMessage)
            .name("stopper")
            .handler(|_| async { Propagation::Stop });

        assert_eq!(handler.name(), Some("stopper"));
        assert_eq!(
            handler.invoke(context(&[])).await.unwrap(),
            Propagation::Stop
        );
    }

    #[test]
    fn test_identity() {
        let a = HandlerBuilder::new(EventCategory::Poll).handler(|_| async {});
        let b = HandlerBuilder::new(EventCategory::Poll).handler(|_| async {});

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(Handler::from(a.clone()), Handler::from(a));
    }

    #[test]
    fn test_raw_builder() {
        let handler = RawHandlerBuilder::new().name("audit").blocking(|_| ());
        assert!(handler.is_raw());
        assert!(handler.is_blocking());
        assert_eq!(handler.category(), EventCategory::Raw);
    }
}
