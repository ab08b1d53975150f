//! Error routing.
//!
//! When a handler fails, every scoped error handler whose kinds include the
//! error's [`ErrorKind`](courier_core::ErrorKind) runs, in registration order.
//! The global handler then runs according to [`GlobalErrorPolicy`]. An error
//! nobody handled is logged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use courier_core::{HandlerError, HandlerResult, UpdateContext};

use crate::registry::HandlerRegistry;

/// When the global error handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GlobalErrorPolicy {
    /// Whenever one is registered, after any scoped handlers.
    #[default]
    Always,
    /// Only when no scoped handler matched the error.
    FallbackOnly,
}

/// Delivers handler errors to registered error handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorRouter {
    policy: GlobalErrorPolicy,
}

impl ErrorRouter {
    pub fn new(policy: GlobalErrorPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> GlobalErrorPolicy {
        self.policy
    }

    /// Routes `err` raised while handling `ctx`.
    ///
    /// Returns `Ok(true)` if at least one error handler ran. An error raised by
    /// an error handler is returned as-is and not routed again.
    pub async fn route(
        &self,
        registry: &HandlerRegistry,
        ctx: &Arc<UpdateContext>,
        err: HandlerError,
    ) -> HandlerResult<bool> {
        let err = Arc::new(err);
        let mut scoped_matched = false;

        for handler in registry
            .scoped_error_handlers()
            .iter()
            .filter(|handler| handler.handles(err.kind()))
        {
            scoped_matched = true;
            debug!(
                error_kind = %err.kind(),
                handler = handler.name().unwrap_or("<unnamed>"),
                "Routing error to scoped handler"
            );
            handler.invoke(Arc::clone(ctx), Arc::clone(&err)).await?;
        }

        let run_global = match self.policy {
            GlobalErrorPolicy::Always => true,
            GlobalErrorPolicy::FallbackOnly => !scoped_matched,
        };
        let mut global_ran = false;
        if run_global && let Some(global) = registry.global_error_handler() {
            debug!(error_kind = %err.kind(), "Routing error to global handler");
            global.invoke(Arc::clone(ctx), Arc::clone(&err)).await?;
            global_ran = true;
        }

        let handled = scoped_matched || global_ran;
        if !handled {
            error!(
                error_kind = %err.kind(),
                category = %ctx.category(),
                update = ctx.raw().name(),
                "Unhandled error in handler: {err}"
            );
        }
        Ok(handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::on_error;
    use crate::test_support::message_context;
    use courier_core::ErrorKind;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn recorder(
        log: &Log,
        kinds: impl IntoIterator<Item = ErrorKind>,
        label: &'static str,
    ) -> crate::ErrorHandler {
        let log = Arc::clone(log);
        on_error(kinds).handler(move |_, _| {
            let log = Arc::clone(&log);
            async move { log.lock().push(label) }
        })
    }

    fn registry(log: &Log) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.add_error_handler(recorder(log, [ErrorKind::Flood], "flood"));
        registry.add_error_handler(recorder(log, [ErrorKind::Timeout], "timeout"));
        registry.add_error_handler(recorder(log, [ErrorKind::Flood, ErrorKind::Network], "net"));
        registry.add_error_handler(recorder(log, [], "global"));
        registry
    }

    #[tokio::test]
    async fn test_scoped_then_global() {
        let log = Log::default();
        let registry = registry(&log);
        let router = ErrorRouter::default();

        let handled = router
            .route(&registry, &message_context(&[]), HandlerError::flood("wait 3s"))
            .await
            .unwrap();

        assert!(handled);
        assert_eq!(*log.lock(), vec!["flood", "net", "global"]);
    }

    #[tokio::test]
    async fn test_fallback_only_policy() {
        let log = Log::default();
        let registry = registry(&log);
        let router = ErrorRouter::new(GlobalErrorPolicy::FallbackOnly);
        let ctx = message_context(&[]);

        router
            .route(&registry, &ctx, HandlerError::new(ErrorKind::Timeout, "slow"))
            .await
            .unwrap();
        router
            .route(&registry, &ctx, HandlerError::parse("bad payload"))
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["timeout", "global"]);
    }

    #[tokio::test]
    async fn test_unhandled() {
        let router = ErrorRouter::default();
        let handled = router
            .route(
                &HandlerRegistry::new(),
                &message_context(&[]),
                HandlerError::internal("boom"),
            )
            .await
            .unwrap();
        assert!(!handled);
    }

    #[tokio::test]
    async fn test_failing_error_handler_stops_routing() {
        let log = Log::default();
        let mut registry = HandlerRegistry::new();
        registry.add_error_handler(
            on_error([ErrorKind::Parse])
                .handler(|_, _| async { Err::<(), _>(HandlerError::internal("nested")) }),
        );
        registry.add_error_handler(recorder(&log, [], "global"));

        let err = ErrorRouter::default()
            .route(&registry, &message_context(&[]), HandlerError::parse("bad"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::Internal);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_policy_serde() {
        let policy: GlobalErrorPolicy = serde_json::from_str("\"fallback-only\"").unwrap();
        assert_eq!(policy, GlobalErrorPolicy::FallbackOnly);
        assert_eq!(
            serde_json::to_string(&GlobalErrorPolicy::Always).unwrap(),
            "\"always\""
        );
    }
}
