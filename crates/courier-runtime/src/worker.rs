//! The dispatch loop run by each worker.
//!
//! A worker repeatedly takes one update off the shared queue, classifies and
//! parses it, then walks the handler groups while holding its own exclusion
//! lock. The lock is what registry mutations wait on, so the registry a worker
//! sees is fixed for the whole walk.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, debug_span, error, trace, warn};

use courier_core::{
    BoxedClient, EntityMaps, HandlerResult, RawEvent, UpdateContext, guarded,
};
use courier_framework::{
    Classification, ErrorRouter, EventClassifier, Handler, HandlerRegistry, Propagation,
};

use crate::queue::{Packet, SharedReceiver};

tokio::task_local! {
    /// Index of the worker whose dispatch is running on the current task.
    static DISPATCHING: usize;
}

/// Returns the worker index if called from inside a dispatch.
pub(crate) fn current_worker() -> Option<usize> {
    DISPATCHING.try_with(|worker| *worker).ok()
}

/// State shared by every worker of one dispatcher.
pub(crate) struct WorkerShared {
    pub(crate) client: BoxedClient,
    pub(crate) classifier: EventClassifier,
    pub(crate) router: ErrorRouter,
    pub(crate) registry: RwLock<Arc<HandlerRegistry>>,
    pub(crate) receiver: SharedReceiver,
}

impl WorkerShared {
    pub(crate) fn snapshot(&self) -> Arc<HandlerRegistry> {
        Arc::clone(&self.registry.read())
    }
}

/// Runs until a shutdown sentinel arrives or the queue closes.
pub(crate) async fn run(index: usize, lock: Arc<Mutex<()>>, shared: Arc<WorkerShared>) {
    debug!(worker = index, "Worker started");

    loop {
        let packet = shared.receiver.lock().await.recv().await;
        let (raw, entities) = match packet {
            Some(Packet::Update { raw, entities }) => (raw, entities),
            Some(Packet::Shutdown) => break,
            None => {
                warn!(worker = index, "Update queue closed unexpectedly");
                break;
            }
        };

        let span = debug_span!("dispatch", worker = index, update = %raw.name());
        let dispatch = shared.dispatch(&lock, Arc::new(raw), entities);
        DISPATCHING.scope(index, dispatch.instrument(span)).await;
    }

    debug!(worker = index, "Worker stopped");
}

impl WorkerShared {
    async fn dispatch(&self, lock: &Mutex<()>, raw: Arc<RawEvent>, entities: Arc<EntityMaps>) {
        let Classification { category, parser } = self.classifier.classify(&raw);

        let parsed = match parser {
            Some(parser) => {
                let parsed = guarded(|| {
                    parser.parse(
                        Arc::clone(&self.client),
                        Arc::clone(&raw),
                        Arc::clone(&entities),
                    )
                })
                .await;
                match parsed {
                    Ok(parsed) => Some(parsed),
                    Err(err) => {
                        warn!(
                            category = %category,
                            error_kind = %err.kind(),
                            "Dropping update that failed to parse: {err}"
                        );
                        return;
                    }
                }
            }
            None => None,
        };

        let ctx = Arc::new(UpdateContext::new(
            Arc::clone(&self.client),
            raw,
            entities,
            category,
            parsed,
        ));

        let _guard = lock.lock().await;
        let registry = self.snapshot();

        if let Err(err) = self.deliver(&registry, &ctx).await {
            error!(
                category = %category,
                error_kind = %err.kind(),
                "Error handler failed: {err}"
            );
        }
    }

    /// Walks the groups in order, invoking at most one handler per group
    /// unless a handler asks to continue.
    async fn deliver(
        &self,
        registry: &HandlerRegistry,
        ctx: &Arc<UpdateContext>,
    ) -> HandlerResult<()> {
        'groups: for (group, handlers) in registry.groups() {
            for handler in handlers {
                let Handler::Update(handler) = handler else {
                    continue;
                };
                let name = handler.name().unwrap_or("<unnamed>");

                // raw handlers see every update, their filters still apply
                if handler.category() != ctx.category() && !handler.is_raw() {
                    continue;
                }
                let selected = match handler.matches(ctx).await {
                    Ok(matched) => matched,
                    Err(err) => {
                        warn!(
                            group,
                            handler = name,
                            error_kind = %err.kind(),
                            "Filter failed, treating as no match: {err}"
                        );
                        false
                    }
                };
                if !selected {
                    continue;
                }

                trace!(group, handler = name, "Invoking handler");
                match handler.invoke(Arc::clone(ctx)).await {
                    Ok(Propagation::Continue) => continue,
                    Ok(Propagation::Stop) => {
                        trace!(group, handler = name, "Propagation stopped");
                        break 'groups;
                    }
                    Ok(Propagation::Handled) => break,
                    Err(err) => {
                        debug!(
                            group,
                            handler = name,
                            error_kind = %err.kind(),
                            "Handler failed: {err}"
                        );
                        self.router.route(registry, ctx, err).await?;
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
