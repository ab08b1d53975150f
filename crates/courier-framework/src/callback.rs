//! Type-erased callbacks and filter predicates.
//!
//! User code comes in two flavours: async closures, which run on the calling
//! worker, and blocking closures, which are moved onto tokio's blocking pool.
//! Either way the caller awaits completion, and a panic inside user code is
//! turned into a [`ErrorKind::Panic`](courier_core::ErrorKind::Panic) error.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use courier_core::{HandlerError, HandlerResult, UpdateContext, guarded};

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ============================================================================
// Propagation
// ============================================================================

/// What the dispatcher should do after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// The update was handled; move on to the next group.
    #[default]
    Handled,
    /// Keep scanning the current group for another matching handler.
    Continue,
    /// Stop dispatching this update to any further group.
    Stop,
}

/// Types that handlers may return.
///
/// Implemented for `()`, [`Propagation`] and any `Result` whose `Ok` side is
/// itself convertible and whose error converts into [`HandlerError`].
pub trait IntoPropagation: Send + 'static {
    /// Converts the handler output into a propagation decision.
    fn into_propagation(self) -> HandlerResult<Propagation>;
}

impl IntoPropagation for () {
    fn into_propagation(self) -> HandlerResult<Propagation> {
        Ok(Propagation::Handled)
    }
}

impl IntoPropagation for Propagation {
    fn into_propagation(self) -> HandlerResult<Propagation> {
        Ok(self)
    }
}

impl<T, E> IntoPropagation for Result<T, E>
where
    T: IntoPropagation,
    E: Into<HandlerError> + Send + 'static,
{
    fn into_propagation(self) -> HandlerResult<Propagation> {
        self.map_err(Into::into)
            .and_then(IntoPropagation::into_propagation)
    }
}

// ============================================================================
// Callback
// ============================================================================

type AsyncFn<A> = Arc<dyn Fn(A) -> BoxFuture<'static, HandlerResult<Propagation>> + Send + Sync>;
type BlockingFn<A> = Arc<dyn Fn(A) -> HandlerResult<Propagation> + Send + Sync>;

/// A user callback taking `A`.
pub(crate) enum Callback<A> {
    Async(AsyncFn<A>),
    Blocking(BlockingFn<A>),
}

impl<A> Clone for Callback<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Async(f) => Self::Async(Arc::clone(f)),
            Self::Blocking(f) => Self::Blocking(Arc::clone(f)),
        }
    }
}

impl<A: Send + 'static> Callback<A> {
    pub(crate) fn from_async<F, Fut, R>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoPropagation,
    {
        Self::Async(Arc::new(move |args| -> BoxFuture<'static, HandlerResult<Propagation>> {
            let fut = f(args);
            Box::pin(async move { fut.await.into_propagation() })
        }))
    }

    pub(crate) fn from_blocking<F, R>(f: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
        R: IntoPropagation,
    {
        Self::Blocking(Arc::new(move |args| f(args).into_propagation()))
    }

    pub(crate) fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocking(_))
    }

    /// Invokes the callback and waits for it to finish.
    pub(crate) async fn call(&self, args: A) -> HandlerResult<Propagation> {
        match self {
            Self::Async(f) => {
                let f = Arc::clone(f);
                guarded(move || f(args)).await
            }
            Self::Blocking(f) => {
                let f = Arc::clone(f);
                match tokio::task::spawn_blocking(move || f(args)).await {
                    Ok(result) => result,
                    Err(err) if err.is_panic() => Err(HandlerError::from_panic(err.into_panic())),
                    Err(err) => Err(HandlerError::internal(format!(
                        "blocking callback did not complete: {err}"
                    ))),
                }
            }
        }
    }
}

// ============================================================================
// Filter
// ============================================================================

type SyncPredicate = Arc<dyn Fn(&UpdateContext) -> bool + Send + Sync>;
type AsyncPredicate =
    Arc<dyn Fn(Arc<UpdateContext>) -> BoxFuture<'static, HandlerResult<bool>> + Send + Sync>;

/// A predicate deciding whether a handler wants an update.
#[derive(Clone)]
pub(crate) enum Filter {
    Sync(SyncPredicate),
    Async(AsyncPredicate),
}

impl Filter {
    pub(crate) async fn check(&self, ctx: &Arc<UpdateContext>) -> HandlerResult<bool> {
        match self {
            Self::Sync(f) => std::panic::catch_unwind(AssertUnwindSafe(|| f(ctx.as_ref())))
                .map_err(HandlerError::from_panic),
            Self::Async(f) => {
                let f = Arc::clone(f);
                let ctx = Arc::clone(ctx);
                guarded(move || f(ctx)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ErrorKind;

    #[test]
    fn test_into_propagation() {
        assert_eq!(().into_propagation().unwrap(), Propagation::Handled);
        assert_eq!(
            Propagation::Stop.into_propagation().unwrap(),
            Propagation::Stop
        );

        let ok: Result<Propagation, HandlerError> = Ok(Propagation::Continue);
        assert_eq!(ok.into_propagation().unwrap(), Propagation::Continue);

        let err: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert_eq!(
            err.into_propagation().unwrap_err().kind(),
            &ErrorKind::Timeout
        );
    }

    #[tokio::test]
    async fn test_async_callback_panic_is_contained() {
        let callback: Callback<u32> = Callback::from_async(|n: u32| async move {
            if n > 1 {
                panic!("too large: {n}");
            }
        });

        assert_eq!(callback.call(1).await.unwrap(), Propagation::Handled);
        let err = callback.call(2).await.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Panic);
        assert_eq!(err.message(), "too large: 2");
    }

    #[tokio::test]
    async fn test_blocking_callback_runs_off_worker() {
        let callback: Callback<u32> = Callback::from_blocking(|n: u32| {
            std::thread::sleep(std::time::Duration::from_millis(5));
            if n == 0 {
                Err(HandlerError::bad_request("zero"))
            } else {
                Ok(Propagation::Stop)
            }
        });

        assert!(callback.is_blocking());
        assert_eq!(callback.call(3).await.unwrap(), Propagation::Stop);
        assert_eq!(
            callback.call(0).await.unwrap_err().kind(),
            &ErrorKind::BadRequest
        );
    }

    #[tokio::test]
    async fn test_blocking_callback_panic_is_contained() {
        let callback: Callback<()> =
            Callback::from_blocking(|()| -> HandlerResult { panic!("sync boom") });
        let err = callback.call(()).await.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Panic);
    }
}
