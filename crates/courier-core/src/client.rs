//! The client handle passed through the dispatch pipeline.
//!
//! The dispatcher never talks to the network itself. Parsers and handlers
//! receive the owning client so they can resolve missing entities or call API
//! methods; the core only needs to carry it around.

use std::any::Any;
use std::sync::Arc;

/// An API client that owns a dispatcher.
///
/// Implementations are usually thin wrappers around a network session. The
/// `as_any` hook allows handlers to recover the concrete client type via
/// [`downcast_client`].
pub trait Client: Any + Send + Sync {
    /// Returns a short identifier used in log output.
    fn name(&self) -> &str;

    /// Converts the client into an `Arc<dyn Any>` for downcasting.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A shared, type-erased client.
pub type BoxedClient = Arc<dyn Client>;

/// Attempts to recover the concrete client type behind a [`BoxedClient`].
///
/// ```rust,ignore
/// let session: Arc<MySession> = downcast_client(ctx.client()).unwrap();
/// ```
pub fn downcast_client<C: Client>(client: &BoxedClient) -> Option<Arc<C>> {
    Arc::clone(client).as_any().downcast::<C>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct First;
    struct Second;

    impl Client for First {
        fn name(&self) -> &str {
            "first"
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    impl Client for Second {
        fn name(&self) -> &str {
            "second"
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    #[test]
    fn test_downcast_client() {
        let client: BoxedClient = Arc::new(First);
        assert!(downcast_client::<First>(&client).is_some());
        assert!(downcast_client::<Second>(&client).is_none());
        assert_eq!(client.name(), "first");
    }
}
